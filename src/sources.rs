use crate::Result;
use csv::{ReaderBuilder, Trim};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

/// A post as listed by the platform. Only read by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Forum,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub kind: SourceKind,
}

impl Source {
    pub fn forum(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Forum,
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::User,
        }
    }

    /// Filename prefix for media saved from this source. Users get a `u_`
    /// prefix so a user and a forum sharing a name never share files.
    pub fn file_prefix(&self) -> String {
        match self.kind {
            SourceKind::Forum => self.name.clone(),
            SourceKind::User => format!("u_{}", self.name),
        }
    }

    /// Display form (`r/name` or `u/name`).
    pub fn label(&self) -> String {
        match self.kind {
            SourceKind::Forum => format!("r/{}", self.name),
            SourceKind::User => format!("u/{}", self.name),
        }
    }
}

/// Lazy, finite stream of posts. Errors mid-stream end the listing.
pub type PostStream<'a> = Box<dyn Iterator<Item = Result<Post>> + 'a>;

/// Post listing capability of the platform client.
pub trait PostLister {
    fn list_new_posts(&self, forum: &str, limit: usize) -> Result<PostStream<'_>>;

    fn list_user_posts(&self, username: &str, limit: usize) -> Result<PostStream<'_>>;

    fn list_posts(&self, source: &Source, limit: usize) -> Result<PostStream<'_>> {
        match source.kind {
            SourceKind::Forum => self.list_new_posts(&source.name, limit),
            SourceKind::User => self.list_user_posts(&source.name, limit),
        }
    }
}

pub fn load_forum_list(path: &Path) -> Result<Vec<Source>> {
    Ok(read_source_names(path)?
        .into_iter()
        .map(Source::forum)
        .collect())
}

pub fn load_user_list(path: &Path) -> Result<Vec<Source>> {
    Ok(read_source_names(path)?
        .into_iter()
        .map(Source::user)
        .collect())
}

/// One name per line, first comma-separated field only. Blank lines and
/// `#` comments are skipped, duplicates keep their first position.
fn read_source_names(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        warn!(path = %path.display(), "source list not found; nothing to scan");
        return Ok(Vec::new());
    }

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_path(path)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut names: Vec<String> = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let Some(raw) = record.get(0) else {
            continue;
        };
        let Some(name) = normalize_source_name(raw) else {
            if !raw.trim().is_empty() {
                warn!(entry = raw, path = %path.display(), "skipping invalid source name");
            }
            continue;
        };
        if seen.insert(name.to_ascii_lowercase()) {
            names.push(name);
        }
    }
    Ok(names)
}

fn normalize_source_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('/');
    let stripped = ["r/", "u/", "user/"]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);
    static SOURCE_NAME_RE: OnceLock<Regex> = OnceLock::new();
    let name_re = SOURCE_NAME_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("source name regex"));
    if name_re.is_match(stripped) {
        Some(stripped.to_string())
    } else {
        None
    }
}
