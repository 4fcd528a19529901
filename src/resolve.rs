use crate::download::{self, DownloadFailure, MediaRequestHeaders};
use crate::formats::{self, SupportedFormats};
use crate::http::{redact_url_for_log, HttpAgents};
use crate::locator;
use crate::reddit::Credentials;
use crate::sources::Post;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What to do when the destination file is already on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingFilePolicy {
    #[default]
    Overwrite,
    Skip,
}

/// Everything the pipeline needs that stays fixed for a whole run.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub http: &'a HttpAgents,
    pub credentials: &'a Credentials,
    pub destination_dir: &'a Path,
    pub formats: &'a SupportedFormats,
    pub existing_files: ExistingFilePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoMediaFound,
    UnsupportedExtension(String),
    AlreadyExists(PathBuf),
    Download(DownloadFailure),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoMediaFound => write!(f, "no media found on linked page"),
            SkipReason::UnsupportedExtension(ext) => write!(f, "unsupported media type: {ext}"),
            SkipReason::AlreadyExists(path) => {
                write!(f, "already downloaded: {}", path.display())
            }
            SkipReason::Download(failure) => write!(f, "{failure}"),
        }
    }
}

/// Outcome of running one post through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaResolution {
    Saved {
        extension: String,
        path: PathBuf,
        bytes: u64,
    },
    Skipped(SkipReason),
}

impl MediaResolution {
    pub fn succeeded(&self) -> bool {
        matches!(self, MediaResolution::Saved { .. })
    }

    pub fn extension(&self) -> Option<&str> {
        match self {
            MediaResolution::Saved { extension, .. } => Some(extension.as_str()),
            MediaResolution::Skipped(_) => None,
        }
    }
}

pub fn destination_filename(file_prefix: &str, post_id: &str, extension: &str) -> String {
    format!("{file_prefix}-{post_id}.{extension}")
}

/// Resolves, fetches and stores the media behind one post.
///
/// Indirect posts go through the page-metadata locator first; the located
/// URL (not the post URL) then drives extension resolution, the allow-list
/// check and the `Accept` header. Nothing here retries or raises: every
/// failure comes back as [`MediaResolution::Skipped`].
pub fn resolve_post_media(
    ctx: &ResolveContext<'_>,
    post: &Post,
    file_prefix: &str,
    is_direct: bool,
) -> MediaResolution {
    let mut candidate_url = post.url.clone();
    let mut extension: Option<String> = None;

    if !is_direct {
        let located =
            locator::locate_media(ctx.http, &candidate_url, ctx.credentials.user_agent());
        let Some(located) = located else {
            return MediaResolution::Skipped(SkipReason::NoMediaFound);
        };
        candidate_url = located.url;
        extension = located.extension_hint;
    }

    let extension = extension.unwrap_or_else(|| formats::resolve_extension(&candidate_url));

    if !ctx.formats.allows(&extension) {
        return MediaResolution::Skipped(SkipReason::UnsupportedExtension(extension));
    }

    let path = ctx
        .destination_dir
        .join(destination_filename(file_prefix, &post.id, &extension));
    if ctx.existing_files == ExistingFilePolicy::Skip && path.exists() {
        return MediaResolution::Skipped(SkipReason::AlreadyExists(path));
    }

    let headers = MediaRequestHeaders {
        user_agent: ctx.credentials.user_agent(),
        accept: formats::accept_header(&extension, &candidate_url),
    };
    debug!(
        post_id = %post.id,
        url = %redact_url_for_log(&candidate_url),
        extension = %extension,
        accept = headers.accept,
        "fetching media"
    );

    match download::download_media(ctx.http, &candidate_url, headers, &path) {
        Ok(bytes) => MediaResolution::Saved {
            extension,
            path,
            bytes,
        },
        Err(failure) => MediaResolution::Skipped(SkipReason::Download(failure)),
    }
}
