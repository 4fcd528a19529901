use crate::formats::{SupportedFormats, DEFAULT_FORMATS};
use crate::http::{HttpTimeouts, DEFAULT_MEDIA_TIMEOUT_SECS, DEFAULT_PAGE_TIMEOUT_SECS};
use crate::paths::AppPaths;
use crate::resolve::ExistingFilePolicy;
use crate::scanner::ScanLimits;
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TARGET_PER_SOURCE: usize = 10;
pub const DEFAULT_MAX_POSTS_PER_SOURCE: usize = 100;
pub const DEFAULT_SAFETY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Successful downloads wanted per source.
    pub target_per_source: usize,
    /// Posts requested from the listing per source.
    pub max_posts_per_source: usize,
    /// Hard ceiling on posts examined per source.
    pub safety_limit: usize,
    /// Allow-list of media extensions. Empty disables filtering.
    pub supported_formats: Vec<String>,
    pub existing_files: ExistingFilePolicy,
    pub page_timeout_secs: u64,
    pub media_timeout_secs: u64,
    /// Overrides `data/downloads` under the base dir.
    pub download_dir: Option<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            target_per_source: DEFAULT_TARGET_PER_SOURCE,
            max_posts_per_source: DEFAULT_MAX_POSTS_PER_SOURCE,
            safety_limit: DEFAULT_SAFETY_LIMIT,
            supported_formats: DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect(),
            existing_files: ExistingFilePolicy::Overwrite,
            page_timeout_secs: DEFAULT_PAGE_TIMEOUT_SECS,
            media_timeout_secs: DEFAULT_MEDIA_TIMEOUT_SECS,
            download_dir: None,
        }
    }
}

impl ScrapeConfig {
    pub fn limits(&self) -> ScanLimits {
        ScanLimits {
            target_per_source: self.target_per_source,
            max_posts_per_source: self.max_posts_per_source,
            safety_limit: self.safety_limit,
        }
    }

    pub fn formats(&self) -> SupportedFormats {
        SupportedFormats::new(&self.supported_formats)
    }

    pub fn timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            page_secs: self.page_timeout_secs,
            media_secs: self.media_timeout_secs,
        }
    }
}

pub fn load_scrape_config(paths: &AppPaths) -> Result<ScrapeConfig> {
    let path = paths.scrape_config_path();
    if !path.exists() {
        return Ok(ScrapeConfig::default());
    }
    let bytes = std::fs::read(&path)?;
    let parsed: ScrapeConfig = serde_json::from_slice(&bytes).map_err(|e| EngineError::Config {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    Ok(parsed)
}

pub fn save_scrape_config(paths: &AppPaths, config: &ScrapeConfig) -> Result<()> {
    let path = paths.scrape_config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::new(dir.path().to_path_buf());
        let config = load_scrape_config(&paths).expect("load");
        assert_eq!(config, ScrapeConfig::default());
        assert_eq!(config.target_per_source, 10);
        assert_eq!(config.max_posts_per_source, 100);
        assert_eq!(config.safety_limit, 100);
        assert_eq!(config.existing_files, ExistingFilePolicy::Overwrite);
        assert!(config.formats().allows("webm"));
    }

    #[test]
    fn saved_config_round_trips_and_partial_files_fill_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::new(dir.path().to_path_buf());

        let mut config = ScrapeConfig::default();
        config.target_per_source = 3;
        config.existing_files = ExistingFilePolicy::Skip;
        save_scrape_config(&paths, &config).expect("save");
        assert_eq!(load_scrape_config(&paths).expect("load"), config);

        std::fs::write(
            paths.scrape_config_path(),
            r#"{"safety_limit": 25, "existing_files": "skip"}"#,
        )
        .expect("write");
        let partial = load_scrape_config(&paths).expect("load");
        assert_eq!(partial.safety_limit, 25);
        assert_eq!(partial.existing_files, ExistingFilePolicy::Skip);
        assert_eq!(partial.target_per_source, DEFAULT_TARGET_PER_SOURCE);
    }

    #[test]
    fn invalid_config_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::new(dir.path().to_path_buf());
        std::fs::create_dir_all(paths.config_dir()).expect("dir");
        std::fs::write(paths.scrape_config_path(), "{ not json").expect("write");

        let err = load_scrape_config(&paths).expect_err("invalid");
        assert!(err.to_string().contains("scrape.json"), "{err}");
    }
}
