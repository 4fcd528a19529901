use serde::{Deserialize, Serialize};
use std::io::Read;
use std::time::Duration;

pub const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MEDIA_TIMEOUT_SECS: u64 = 30;
pub const MAX_PAGE_BYTES: u64 = 5 * 1024 * 1024;
pub const MAX_MEDIA_BYTES: u64 = 1024 * 1024 * 1024;

pub type HttpResponse = ureq::http::Response<ureq::Body>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpTimeouts {
    pub page_secs: u64,
    pub media_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            page_secs: DEFAULT_PAGE_TIMEOUT_SECS,
            media_secs: DEFAULT_MEDIA_TIMEOUT_SECS,
        }
    }
}

/// Blocking agents for the two kinds of fetches the pipeline makes. Status
/// codes are never turned into errors; callers inspect them.
#[derive(Clone)]
pub struct HttpAgents {
    page: ureq::Agent,
    media: ureq::Agent,
}

impl HttpAgents {
    pub fn new(timeouts: HttpTimeouts) -> Self {
        Self {
            page: build_agent(timeouts.page_secs),
            media: build_agent(timeouts.media_secs),
        }
    }

    pub fn page(&self) -> &ureq::Agent {
        &self.page
    }

    pub fn media(&self) -> &ureq::Agent {
        &self.media
    }
}

impl std::fmt::Debug for HttpAgents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAgents").finish_non_exhaustive()
    }
}

impl Default for HttpAgents {
    fn default() -> Self {
        Self::new(HttpTimeouts::default())
    }
}

pub(crate) fn build_agent(timeout_secs: u64) -> ureq::Agent {
    let mut config = ureq::Agent::config_builder();
    config = config
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(timeout_secs.max(1))));
    config.build().into()
}

pub(crate) fn call_get(
    agent: &ureq::Agent,
    url: &str,
    headers: &[(&str, &str)],
) -> std::result::Result<HttpResponse, ureq::Error> {
    let mut request = agent.get(url);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request.call()
}

pub(crate) fn is_success(response: &HttpResponse) -> bool {
    response.status().is_success()
}

/// Reads at most `limit` bytes and silently drops the rest.
pub(crate) fn read_body_limited(
    response: &mut HttpResponse,
    limit: u64,
) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    response
        .body_mut()
        .as_reader()
        .take(limit)
        .read_to_end(&mut buf)?;
    Ok(buf)
}

/// Reads the whole body, failing instead of truncating when it is larger
/// than `limit`.
pub(crate) fn read_body_within(
    response: &mut HttpResponse,
    limit: u64,
) -> std::io::Result<Vec<u8>> {
    let buf = read_body_limited(response, limit.saturating_add(1))?;
    if buf.len() as u64 > limit {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("body exceeds limit of {limit} bytes"),
        ));
    }
    Ok(buf)
}

/// Scheme and host only, so tokens in paths or queries never reach the logs.
pub fn redact_url_for_log(value: &str) -> String {
    match url::Url::parse(value) {
        Ok(uri) => {
            let scheme = uri.scheme();
            let authority = uri.host_str().unwrap_or("unknown-host");
            format!("{scheme}://{authority}/...")
        }
        Err(_) => "[invalid-url]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_keeps_scheme_and_host_only() {
        assert_eq!(
            redact_url_for_log("https://i.example.com/abc.jpg?token=secret"),
            "https://i.example.com/..."
        );
        assert_eq!(redact_url_for_log("nope"), "[invalid-url]");
    }

    #[test]
    fn non_success_status_is_returned_not_raised() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/gone").with_status(410).create();

        let agents = HttpAgents::default();
        let response =
            call_get(agents.page(), &format!("{}/gone", server.url()), &[]).expect("response");
        assert_eq!(response.status().as_u16(), 410);
        assert!(!is_success(&response));
    }

    #[test]
    fn strict_read_rejects_oversized_body() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/blob")
            .with_status(200)
            .with_body(b"0123456789A".to_vec())
            .create();
        let agents = HttpAgents::default();
        let url = format!("{}/blob", server.url());

        let mut response = call_get(agents.media(), &url, &[]).expect("response");
        let err = read_body_within(&mut response, 10).expect_err("too large");
        assert!(err.to_string().contains("exceeds limit"));

        let mut response = call_get(agents.media(), &url, &[]).expect("response");
        assert_eq!(read_body_within(&mut response, 11).expect("fits").len(), 11);

        let mut response = call_get(agents.page(), &url, &[]).expect("response");
        assert_eq!(read_body_limited(&mut response, 4).expect("truncated"), b"0123");
    }
}
