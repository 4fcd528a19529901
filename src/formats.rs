use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_EXTENSION: &str = "jpg";

pub const DEFAULT_FORMATS: &[&str] = &["jpg", "jpeg", "png", "gif", "mp4", "webm"];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif"];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "avi", "mov", "mkv", "flv", "wmv", "m4v"];

const EXTENSION_ALIASES: &[(&str, &str)] = &[("jpeg", "jpg"), ("tiff", "tif")];

pub const VIDEO_ACCEPT: &str = "video/*, */*";
pub const GIF_ACCEPT: &str = "image/gif, image/*";
pub const IMAGE_ACCEPT: &str = "image/*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupportedExtensions {
    pub image: Vec<&'static str>,
    pub video: Vec<&'static str>,
    pub all: Vec<&'static str>,
}

/// Every extension the resolver can return, grouped by kind and sorted.
pub fn supported_extensions() -> SupportedExtensions {
    let mut image = IMAGE_EXTENSIONS.to_vec();
    let mut video = VIDEO_EXTENSIONS.to_vec();
    image.sort_unstable();
    video.sort_unstable();
    let mut all: Vec<&'static str> = image.iter().chain(video.iter()).copied().collect();
    all.sort_unstable();
    SupportedExtensions { image, video, all }
}

/// Lower-cases, trims, drops a leading dot and applies the alias table.
pub fn normalize_extension(raw: &str) -> String {
    let lowered = raw.trim().trim_start_matches('.').to_ascii_lowercase();
    EXTENSION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(lowered)
}

pub fn is_supported_extension(extension: &str) -> bool {
    media_kind(extension).is_some()
}

pub fn media_kind(extension: &str) -> Option<MediaKind> {
    let normalized = normalize_extension(extension);
    if normalized.is_empty() {
        return None;
    }
    if IMAGE_EXTENSIONS.contains(&normalized.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&normalized.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Resolves the file extension to save `url` under.
///
/// Query strings and fragments are ignored. Unknown, missing or empty
/// extensions fall back to [`DEFAULT_EXTENSION`]. Strings that do not parse
/// as absolute URLs go through a plain string split instead.
pub fn resolve_extension(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return DEFAULT_EXTENSION.to_string();
    }

    let filename = match Url::parse(trimmed) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string)),
        Err(_) => fallback_filename(trimmed),
    };

    filename
        .map(|name| extension_from_filename(&name))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn fallback_filename(url: &str) -> Option<String> {
    let without_suffix = url.split(['?', '#']).next().unwrap_or("");
    without_suffix.rsplit('/').next().map(str::to_string)
}

fn extension_from_filename(name: &str) -> String {
    if name.is_empty() || name == "." || name == ".." {
        return DEFAULT_EXTENSION.to_string();
    }

    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() < 2 {
        return DEFAULT_EXTENSION.to_string();
    }

    let raw = parts[parts.len() - 1].trim();
    if raw.is_empty() {
        return DEFAULT_EXTENSION.to_string();
    }

    let normalized = normalize_extension(raw);
    if is_supported_extension(&normalized) {
        normalized
    } else {
        DEFAULT_EXTENSION.to_string()
    }
}

/// Picks the `Accept` header for a media request. A `.mp4`/`.webm` marker
/// in the URL forces the video value even when the extension says image.
pub fn accept_header(extension: &str, url: &str) -> &'static str {
    let url_lower = url.to_ascii_lowercase();
    let extension = extension.to_ascii_lowercase();

    if extension == "mp4"
        || extension == "webm"
        || url_lower.contains(".mp4")
        || url_lower.contains(".webm")
    {
        VIDEO_ACCEPT
    } else if extension == "gif" || url_lower.contains(".gif") {
        GIF_ACCEPT
    } else {
        IMAGE_ACCEPT
    }
}

/// Configured media format allow-list.
///
/// Entries are kept lower-cased without a leading dot. An empty list means
/// "no filtering": every extension is allowed and the full supported table
/// is used to spot direct links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedFormats {
    entries: Vec<String>,
}

impl SupportedFormats {
    pub fn new<I, S>(formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<String> = Vec::new();
        for format in formats {
            let cleaned = format
                .as_ref()
                .trim()
                .trim_start_matches('.')
                .to_ascii_lowercase();
            if cleaned.is_empty() || entries.contains(&cleaned) {
                continue;
            }
            entries.push(cleaned);
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Both sides go through the alias table before comparing, so a list
    /// holding only `jpeg` still admits the resolved `jpg` (and `tiff`
    /// admits `tif`). A literal membership check would reject those.
    pub fn allows(&self, extension: &str) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        let wanted = normalize_extension(extension);
        self.entries
            .iter()
            .any(|entry| normalize_extension(entry) == wanted)
    }

    /// True when the URL already names a media file, i.e. it contains
    /// `.{format}` for one of the configured formats.
    pub fn is_direct_url(&self, url: &str) -> bool {
        let url_lower = url.to_ascii_lowercase();
        if self.entries.is_empty() {
            return IMAGE_EXTENSIONS
                .iter()
                .chain(VIDEO_EXTENSIONS.iter())
                .any(|ext| url_lower.contains(&format!(".{ext}")));
        }
        self.entries
            .iter()
            .any(|entry| url_lower.contains(&format!(".{entry}")))
    }
}

impl Default for SupportedFormats {
    fn default() -> Self {
        Self::new(DEFAULT_FORMATS.iter().copied())
    }
}
