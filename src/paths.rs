use std::path::PathBuf;

use crate::config::ScrapeConfig;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_dir: PathBuf,
}

impl AppPaths {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn config_dir(&self) -> PathBuf {
        self.base_dir.join("config")
    }

    pub fn scrape_config_path(&self) -> PathBuf {
        self.config_dir().join("scrape.json")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn forum_list_path(&self) -> PathBuf {
        self.data_dir().join("subreddits.csv")
    }

    pub fn user_list_path(&self) -> PathBuf {
        self.data_dir().join("users.csv")
    }

    pub fn default_download_dir(&self) -> PathBuf {
        self.data_dir().join("downloads")
    }

    /// Download directory after applying the config override, if any.
    pub fn effective_download_dir(&self, config: &ScrapeConfig) -> PathBuf {
        match config.download_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => self.default_download_dir(),
        }
    }

    pub fn ensure_dirs(&self, config: &ScrapeConfig) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.effective_download_dir(config))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_dir_override_wins_over_default() {
        let paths = AppPaths::new(PathBuf::from("/srv/scrape"));
        let mut config = ScrapeConfig::default();
        assert_eq!(
            paths.effective_download_dir(&config),
            PathBuf::from("/srv/scrape/data/downloads")
        );

        config.download_dir = Some("  ".to_string());
        assert_eq!(
            paths.effective_download_dir(&config),
            paths.default_download_dir()
        );

        config.download_dir = Some("/mnt/media".to_string());
        assert_eq!(
            paths.effective_download_dir(&config),
            PathBuf::from("/mnt/media")
        );
    }

    #[test]
    fn ensure_dirs_creates_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::new(dir.path().to_path_buf());
        paths.ensure_dirs(&ScrapeConfig::default()).expect("dirs");
        assert!(paths.config_dir().is_dir());
        assert!(paths.default_download_dir().is_dir());
    }
}
