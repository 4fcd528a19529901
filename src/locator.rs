use crate::http::{self, HttpAgents, MAX_PAGE_BYTES};
use scraper::{Html, Selector};
use std::collections::HashMap;
use tracing::debug;
use url::Url;

const OG_VIDEO: &str = "og:video";
const OG_IMAGE: &str = "og:image";
const VIDEO_EXTENSION_HINT: &str = "mp4";

/// A media URL found in a page's metadata.
///
/// `extension_hint` is only set for video tags; image tags leave it empty so
/// the caller resolves the extension from `url` itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedMedia {
    pub url: String,
    pub extension_hint: Option<String>,
}

/// Fetches `page_url` and looks for `og:video`, then `og:image`.
///
/// Every failure (network, non-2xx, unreadable body, nothing found) comes
/// back as `None`.
pub fn locate_media(http: &HttpAgents, page_url: &str, user_agent: &str) -> Option<LocatedMedia> {
    let mut response = match http::call_get(http.page(), page_url, &[("User-Agent", user_agent)]) {
        Ok(resp) => resp,
        Err(err) => {
            debug!(
                url = %http::redact_url_for_log(page_url),
                error = %err,
                "page fetch failed"
            );
            return None;
        }
    };

    if !http::is_success(&response) {
        debug!(
            url = %http::redact_url_for_log(page_url),
            status = response.status().as_u16(),
            "page fetch returned non-success status"
        );
        return None;
    }

    let body = match http::read_body_limited(&mut response, MAX_PAGE_BYTES) {
        Ok(body) => body,
        Err(err) => {
            debug!(
                url = %http::redact_url_for_log(page_url),
                error = %err,
                "page body read failed"
            );
            return None;
        }
    };

    let html = String::from_utf8_lossy(&body);
    extract_og_media(&html, page_url)
}

/// Metadata extraction on an already fetched page.
pub fn extract_og_media(html: &str, page_url: &str) -> Option<LocatedMedia> {
    let document = Html::parse_document(html);

    if let Some(url) = meta_content(&document, OG_VIDEO, page_url) {
        return Some(LocatedMedia {
            url,
            extension_hint: Some(VIDEO_EXTENSION_HINT.to_string()),
        });
    }

    meta_content(&document, OG_IMAGE, page_url).map(|url| LocatedMedia {
        url,
        extension_hint: None,
    })
}

fn meta_content(document: &Html, property: &str, page_url: &str) -> Option<String> {
    let attrs = find_meta_tag(document, property)?;
    let content = attrs.get("content")?.trim();
    if content.is_empty() {
        return None;
    }
    Some(absolutize(content, page_url))
}

/// Attributes of the first `<meta property="...">` tag, if there is one.
pub fn find_meta_tag(document: &Html, property: &str) -> Option<HashMap<String, String>> {
    let selector = Selector::parse(&format!(r#"meta[property="{property}"]"#)).ok()?;
    let tag = document.select(&selector).next()?;
    Some(
        tag.value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
    )
}

fn absolutize(content: &str, page_url: &str) -> String {
    if Url::parse(content).is_ok() {
        return content.to_string();
    }
    Url::parse(page_url)
        .and_then(|base| base.join(content))
        .map(|joined| joined.to_string())
        .unwrap_or_else(|_| content.to_string())
}
