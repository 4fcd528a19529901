use crate::resolve::{resolve_post_media, MediaResolution, ResolveContext};
use crate::sources::{Post, PostLister, Source};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanLimits {
    pub target_per_source: usize,
    pub max_posts_per_source: usize,
    pub safety_limit: usize,
}

/// Progress record emitted for every saved file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedMedia {
    pub index: usize,
    pub target: usize,
    pub post_url: String,
    pub filename: String,
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub source: Source,
    pub saved: usize,
    /// Posts actually run through the pipeline. The goal is checked before
    /// the next post is pulled and the safety limit before a pulled post is
    /// counted, so at either stop this is one lower than a loop that counts
    /// each post first and then checks would report.
    pub posts_checked: usize,
    pub safety_limit_hit: bool,
    pub listing_error: Option<String>,
}

impl ScanSummary {
    fn new(source: Source) -> Self {
        Self {
            source,
            saved: 0,
            posts_checked: 0,
            safety_limit_hit: false,
            listing_error: None,
        }
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: saved {} media items (scanned {} posts)",
            self.source.label(),
            self.saved,
            self.posts_checked
        )?;
        if self.safety_limit_hit {
            write!(f, ", stopped at safety limit")?;
        }
        if let Some(err) = &self.listing_error {
            write!(f, ", listing failed: {err}")?;
        }
        Ok(())
    }
}

/// Walks one source's posts until enough media is saved.
///
/// Stops when `target_per_source` files are saved, when the listing runs
/// out, or when another post is available but `safety_limit` posts have
/// already been examined. `posts_checked` counts examined posts only. The
/// goal check runs before pulling, so a satisfied source never fetches
/// another listing page.
pub fn scan_source<I, F>(
    ctx: &ResolveContext<'_>,
    source: &Source,
    posts: I,
    limits: ScanLimits,
    mut on_saved: F,
) -> ScanSummary
where
    I: IntoIterator<Item = Result<Post>>,
    F: FnMut(&SavedMedia),
{
    let mut summary = ScanSummary::new(source.clone());
    let prefix = source.file_prefix();
    let mut posts = posts.into_iter().take(limits.max_posts_per_source);

    info!(
        source = %source.label(),
        target = limits.target_per_source,
        max_posts = limits.max_posts_per_source,
        "scanning source"
    );

    loop {
        if summary.saved >= limits.target_per_source {
            break;
        }

        let Some(item) = posts.next() else {
            break;
        };
        let post = match item {
            Ok(post) => post,
            Err(err) => {
                warn!(source = %source.label(), error = %err, "listing failed mid-scan");
                summary.listing_error = Some(err.to_string());
                break;
            }
        };

        if summary.posts_checked >= limits.safety_limit {
            summary.safety_limit_hit = true;
            info!(
                source = %source.label(),
                safety_limit = limits.safety_limit,
                "reached safety limit of posts checked"
            );
            break;
        }
        summary.posts_checked += 1;

        let is_direct = ctx.formats.is_direct_url(&post.url);
        match resolve_post_media(ctx, &post, &prefix, is_direct) {
            MediaResolution::Saved { path, bytes, .. } => {
                summary.saved += 1;
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default();
                let record = SavedMedia {
                    index: summary.saved,
                    target: limits.target_per_source,
                    post_url: post.url,
                    filename,
                    path,
                    bytes,
                };
                info!(
                    source = %source.label(),
                    progress = %format!("{}/{}", record.index, record.target),
                    file = %record.filename,
                    bytes = record.bytes,
                    "saved media"
                );
                on_saved(&record);
            }
            MediaResolution::Skipped(reason) => {
                info!(
                    source = %source.label(),
                    post_id = %post.id,
                    direct = is_direct,
                    reason = %reason,
                    "skipped post"
                );
            }
        }
    }

    info!(
        source = %source.label(),
        saved = summary.saved,
        posts_checked = summary.posts_checked,
        safety_limit_hit = summary.safety_limit_hit,
        "source complete"
    );
    summary
}

/// Scans every source in order. A source whose listing cannot be opened
/// is recorded and skipped; the rest still run.
pub fn run_sources<L, F>(
    lister: &L,
    ctx: &ResolveContext<'_>,
    sources: &[Source],
    limits: ScanLimits,
    mut on_saved: F,
) -> Vec<ScanSummary>
where
    L: PostLister + ?Sized,
    F: FnMut(&Source, &SavedMedia),
{
    let mut summaries = Vec::with_capacity(sources.len());
    for source in sources {
        let summary = match lister.list_posts(source, limits.max_posts_per_source) {
            Ok(posts) => {
                scan_source(ctx, source, posts, limits, |saved| on_saved(source, saved))
            }
            Err(err) => {
                warn!(
                    source = %source.label(),
                    error = %err,
                    "could not list posts; skipping source"
                );
                let mut summary = ScanSummary::new(source.clone());
                summary.listing_error = Some(err.to_string());
                summary
            }
        };
        summaries.push(summary);
    }
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::SupportedFormats;
    use crate::http::HttpAgents;
    use crate::reddit::Credentials;
    use crate::resolve::ExistingFilePolicy;
    use crate::EngineError;
    use std::cell::Cell;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn creds() -> Credentials {
        Credentials::new("cid", "secret", "test-agent/1.0", "alice", "pw").expect("creds")
    }

    fn posts(base: &str, route: &str, count: usize) -> Vec<Result<Post>> {
        (0..count)
            .map(|i| {
                Ok(Post {
                    id: format!("p{i}"),
                    url: format!("{base}/{route}/{i}.jpg"),
                    title: format!("post {i}"),
                })
            })
            .collect()
    }

    fn limits(target: usize, max_posts: usize, safety: usize) -> ScanLimits {
        ScanLimits {
            target_per_source: target,
            max_posts_per_source: max_posts,
            safety_limit: safety,
        }
    }

    #[test]
    fn stops_once_target_is_met() {
        let mut server = mockito::Server::new();
        let _media = server
            .mock("GET", mockito::Matcher::Regex(r"^/ok/\d+\.jpg$".to_string()))
            .with_status(200)
            .with_body(b"bytes".to_vec())
            .create();

        let dir = tempfile::tempdir().expect("tempdir");
        let http = HttpAgents::default();
        let credentials = creds();
        let formats = SupportedFormats::default();
        let ctx = ResolveContext {
            http: &http,
            credentials: &credentials,
            destination_dir: dir.path(),
            formats: &formats,
            existing_files: ExistingFilePolicy::Overwrite,
        };

        let mut records: Vec<SavedMedia> = Vec::new();
        let summary = scan_source(
            &ctx,
            &Source::forum("pics"),
            posts(&server.url(), "ok", 3),
            limits(3, 100, 100),
            |saved| records.push(saved.clone()),
        );

        assert_eq!(summary.saved, 3);
        assert_eq!(summary.posts_checked, 3);
        assert!(!summary.safety_limit_hit);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].index, 1);
        assert_eq!(records[2].target, 3);
        assert_eq!(records[1].filename, "pics-p1.jpg");
        assert!(dir.path().join("pics-p2.jpg").exists());
    }

    #[test]
    fn goal_met_source_pulls_no_further_posts() {
        let mut server = mockito::Server::new();
        let _media = server
            .mock("GET", mockito::Matcher::Regex(r"^/ok/\d+\.jpg$".to_string()))
            .with_status(200)
            .with_body(b"bytes".to_vec())
            .create();

        let dir = tempfile::tempdir().expect("tempdir");
        let http = HttpAgents::default();
        let credentials = creds();
        let formats = SupportedFormats::default();
        let ctx = ResolveContext {
            http: &http,
            credentials: &credentials,
            destination_dir: dir.path(),
            formats: &formats,
            existing_files: ExistingFilePolicy::Overwrite,
        };

        let pulled = Cell::new(0_usize);
        let stream = posts(&server.url(), "ok", 10)
            .into_iter()
            .inspect(|_| pulled.set(pulled.get() + 1));
        let summary =
            scan_source(&ctx, &Source::forum("pics"), stream, limits(2, 100, 100), |_| {});

        assert_eq!(summary.saved, 2);
        assert_eq!(summary.posts_checked, 2);
        assert_eq!(pulled.get(), 2);
    }

    #[test]
    fn stops_exactly_at_safety_limit_without_successes() {
        let mut server = mockito::Server::new();
        let media = server
            .mock("GET", mockito::Matcher::Regex(r"^/gone/\d+\.jpg$".to_string()))
            .with_status(404)
            .expect(4)
            .create();

        let dir = tempfile::tempdir().expect("tempdir");
        let http = HttpAgents::default();
        let credentials = creds();
        let formats = SupportedFormats::default();
        let ctx = ResolveContext {
            http: &http,
            credentials: &credentials,
            destination_dir: dir.path(),
            formats: &formats,
            existing_files: ExistingFilePolicy::Overwrite,
        };

        let summary = scan_source(
            &ctx,
            &Source::forum("sparse"),
            posts(&server.url(), "gone", 10),
            limits(3, 100, 4),
            |_| panic!("nothing should be saved"),
        );

        assert_eq!(summary.saved, 0);
        assert_eq!(summary.posts_checked, 4);
        assert!(summary.safety_limit_hit);
        assert!(summary.to_string().contains("safety limit"));
        media.assert();
    }

    #[test]
    fn skip_reasons_are_visible_at_info_level() {
        let mut server = mockito::Server::new();
        let _media = server.mock("GET", "/gone/0.jpg").with_status(404).create();

        let dir = tempfile::tempdir().expect("tempdir");
        let http = HttpAgents::default();
        let credentials = creds();
        let formats = SupportedFormats::default();
        let ctx = ResolveContext {
            http: &http,
            credentials: &credentials,
            destination_dir: dir.path(),
            formats: &formats,
            existing_files: ExistingFilePolicy::Overwrite,
        };

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .finish();
        let summary = tracing::subscriber::with_default(subscriber, || {
            scan_source(
                &ctx,
                &Source::forum("pics"),
                posts(&server.url(), "gone", 1),
                limits(1, 100, 100),
                |_| {},
            )
        });

        assert_eq!(summary.saved, 0);
        let output = String::from_utf8(logs.0.lock().expect("log buffer").clone()).expect("utf8");
        assert!(output.contains("skipped post"), "{output}");
        assert!(output.contains("server returned status 404"), "{output}");
    }

    #[test]
    fn exhausted_listing_is_not_a_safety_stop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let http = HttpAgents::default();
        let credentials = creds();
        let formats = SupportedFormats::new(["png"]);
        let ctx = ResolveContext {
            http: &http,
            credentials: &credentials,
            destination_dir: dir.path(),
            formats: &formats,
            existing_files: ExistingFilePolicy::Overwrite,
        };

        // Nothing matches the png allow-list, so every post goes through the
        // page locator against an unreachable host and is skipped.
        let summary = scan_source(
            &ctx,
            &Source::user("someone"),
            posts("http://127.0.0.1:1", "x", 2),
            limits(5, 100, 2),
            |_| {},
        );
        assert_eq!(summary.posts_checked, 2);
        assert!(!summary.safety_limit_hit);
        assert_eq!(summary.saved, 0);
    }

    #[test]
    fn listing_error_mid_scan_is_recorded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let http = HttpAgents::default();
        let credentials = creds();
        let formats = SupportedFormats::new(["png"]);
        let ctx = ResolveContext {
            http: &http,
            credentials: &credentials,
            destination_dir: dir.path(),
            formats: &formats,
            existing_files: ExistingFilePolicy::Overwrite,
        };

        let mut stream = posts("http://127.0.0.1:1", "x", 1);
        stream.push(Err(EngineError::Http("status=503".to_string())));
        stream.extend(posts("http://127.0.0.1:1", "y", 3));

        let summary =
            scan_source(&ctx, &Source::forum("pics"), stream, limits(5, 100, 100), |_| {});
        assert_eq!(summary.posts_checked, 1);
        assert!(summary
            .listing_error
            .as_deref()
            .is_some_and(|e| e.contains("503")));
    }

    #[test]
    fn zero_success_summary_still_renders() {
        let summary = ScanSummary::new(Source::forum("empty"));
        assert_eq!(
            summary.to_string(),
            "r/empty: saved 0 media items (scanned 0 posts)"
        );
    }
}
