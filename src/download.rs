use crate::http::{self, HttpAgents, MAX_MEDIA_BYTES};
use std::fmt;
use std::io::Write;
use std::path::Path;

/// Why a media fetch or write did not produce a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadFailure {
    Network(String),
    Status(u16),
    EmptyBody,
    Write(String),
}

impl fmt::Display for DownloadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadFailure::Network(err) => write!(f, "network error: {err}"),
            DownloadFailure::Status(code) => write!(f, "server returned status {code}"),
            DownloadFailure::EmptyBody => write!(f, "response body was empty"),
            DownloadFailure::Write(err) => write!(f, "write failed: {err}"),
        }
    }
}

pub type DownloadResult<T> = std::result::Result<T, DownloadFailure>;

/// Headers sent with every media request.
#[derive(Debug, Clone, Copy)]
pub struct MediaRequestHeaders<'a> {
    pub user_agent: &'a str,
    pub accept: &'a str,
}

/// GETs `url` with the media timeout and returns the full body.
pub fn fetch_media(
    http: &HttpAgents,
    url: &str,
    headers: MediaRequestHeaders<'_>,
) -> DownloadResult<Vec<u8>> {
    fetch_media_capped(http, url, headers, MAX_MEDIA_BYTES)
}

/// A body over `max_bytes` is a failure, never a truncated file.
pub(crate) fn fetch_media_capped(
    http: &HttpAgents,
    url: &str,
    headers: MediaRequestHeaders<'_>,
    max_bytes: u64,
) -> DownloadResult<Vec<u8>> {
    let mut response = http::call_get(
        http.media(),
        url,
        &[("User-Agent", headers.user_agent), ("Accept", headers.accept)],
    )
    .map_err(|err| DownloadFailure::Network(err.to_string()))?;

    if !http::is_success(&response) {
        return Err(DownloadFailure::Status(response.status().as_u16()));
    }

    let data = http::read_body_within(&mut response, max_bytes)
        .map_err(|err| DownloadFailure::Network(err.to_string()))?;
    if data.is_empty() {
        return Err(DownloadFailure::EmptyBody);
    }
    Ok(data)
}

/// Writes `content` to `path`, replacing any existing file. The parent
/// directory must already exist. Empty content is refused and nothing is
/// written.
pub fn save_media_file(content: &[u8], path: &Path) -> DownloadResult<()> {
    if content.is_empty() {
        return Err(DownloadFailure::EmptyBody);
    }
    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(content)?;
        file.flush()
    };
    write().map_err(|err| DownloadFailure::Write(err.to_string()))
}

/// Fetch then persist. Returns the number of bytes written.
pub fn download_media(
    http: &HttpAgents,
    url: &str,
    headers: MediaRequestHeaders<'_>,
    destination: &Path,
) -> DownloadResult<u64> {
    let data = fetch_media(http, url, headers)?;
    save_media_file(&data, destination)?;
    Ok(data.len() as u64)
}
