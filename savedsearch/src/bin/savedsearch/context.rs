use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use savedsearch::{
    AppConfig, ConnectionManager, SavedSearchRepo, SolrGroupBackend,
    config::{CONFIG_DIR, CONFIG_FILE},
};

/// Connection overrides taken from the command line or the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub solr_url: Option<String>,
    pub redis_url: Option<String>,
}

/// Resolved configuration for one CLI invocation
pub struct CliContext {
    /// Config file that was loaded, if any
    pub config_path: Option<PathBuf>,
    pub config: AppConfig,
}

impl CliContext {
    /// Load `--config`, or `.savedsearch/config.toml` from the current directory
    /// or an ancestor, then apply overrides
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let config_path = match &overrides.config {
            Some(path) => Some(path.clone()),
            None => {
                let current_dir = std::env::current_dir().context("Failed to get current directory")?;
                Self::find_config(&current_dir)
            }
        };

        let mut config = match &config_path {
            Some(path) => AppConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
            None => AppConfig::default(),
        };

        if let Some(url) = &overrides.solr_url {
            config.solr.url = url.clone();
        }
        if let Some(url) = &overrides.redis_url {
            config.redis.url = url.clone();
        }

        Ok(Self { config_path, config })
    }

    /// Walk up from `start` looking for `.savedsearch/config.toml`
    pub fn find_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_DIR).join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    pub fn backend(&self) -> Result<SolrGroupBackend> {
        let registry = self.config.solr.registry()?;
        if registry.is_empty() {
            log::warn!("no document types registered, every hit will be dropped");
        }
        Ok(SolrGroupBackend::new(self.config.solr.clone(), registry)?)
    }

    pub fn repo(&self) -> SavedSearchRepo {
        SavedSearchRepo::new(self.config.redis.prefix.clone())
    }

    pub async fn redis(&self) -> Result<ConnectionManager> {
        let url = self.config.redis.resolved_url()?;
        let client = redis::Client::open(url.as_str()).context("Invalid Redis URL")?;
        ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_config_in_ancestors() {
        let root = tempfile::tempdir().unwrap();
        let config_dir = root.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join(CONFIG_FILE), "[solr]\nurl = \"http://localhost:8983/solr/jobs\"\n").unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = CliContext::find_config(&nested).unwrap();
        assert_eq!(found, config_dir.join(CONFIG_FILE));
    }

    #[test]
    fn overrides_win_over_file() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("config.toml");
        std::fs::write(&path, "[solr]\nurl = \"http://file/solr\"\n[redis]\nprefix = \"test\"\n").unwrap();

        let ctx = CliContext::load(&Overrides {
            config: Some(path.clone()),
            solr_url: Some("http://flag/solr".into()),
            redis_url: None,
        })
        .unwrap();
        assert_eq!(ctx.config_path, Some(path));
        assert_eq!(ctx.config.solr.url, "http://flag/solr");
        assert_eq!(ctx.config.redis.prefix, "test");
        assert_eq!(ctx.repo().prefix(), "test");
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let result = CliContext::load(&Overrides {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..Overrides::default()
        });
        assert!(result.is_err());
    }
}
