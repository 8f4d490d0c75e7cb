//! Configuration stored in `.savedsearch/config.toml`.
//!
//! ```toml
//! [solr]
//! url = "${SOLR_URL}"
//! timeout_secs = 10
//! silently_fail = true
//! document_types = ["seo.joblisting"]
//!
//! [redis]
//! url = "redis://127.0.0.1:6379"
//! prefix = "savedsearch"
//! ```
//!
//! A value written as `${NAME}` is read from the environment variable `NAME`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    errors::{Result, SearchError},
    registry::{DocumentType, DocumentTypeRegistry},
    validators::{is_valid_http_url, is_valid_redis_url},
};

pub const CONFIG_DIR: &str = ".savedsearch";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub solr: SolrSettings,
    #[serde(default)]
    pub redis: RedisSettings,
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| SearchError::Config {
            message: format!("failed to parse config: {err}"),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| SearchError::Config {
            message: format!("failed to read {}: {err}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| SearchError::Config {
            message: format!("failed to serialize config: {err}"),
        })
    }
}

/// Connection and behaviour settings for the grouped Solr backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolrSettings {
    #[serde(default = "default_solr_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Log backend failures and return an empty result instead of failing. Off unless set.
    #[serde(default)]
    pub silently_fail: bool,
    #[serde(default)]
    pub include_spelling: bool,
    /// Narrow every search to the registered document types.
    #[serde(default = "default_true")]
    pub limit_to_registered_models: bool,
    #[serde(default = "default_highlight_fragsize")]
    pub highlight_fragsize: u32,
    /// Document type discriminator, `app_label.model_name`.
    #[serde(default = "default_type_field")]
    pub type_field: String,
    /// Primary key of the source record.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Solr unique key, used to look up highlighting.
    #[serde(default = "default_unique_key")]
    pub unique_key: String,
    /// Extra `app_label.model_name` types accepted besides the statically registered ones.
    #[serde(default)]
    pub document_types: Vec<String>,
}

impl Default for SolrSettings {
    fn default() -> Self {
        Self {
            url: default_solr_url(),
            timeout_secs: default_timeout_secs(),
            silently_fail: false,
            include_spelling: false,
            limit_to_registered_models: true,
            highlight_fragsize: default_highlight_fragsize(),
            type_field: default_type_field(),
            id_field: default_id_field(),
            unique_key: default_unique_key(),
            document_types: Vec::new(),
        }
    }
}

impl SolrSettings {
    /// Settings pointing at `url`, everything else default.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// The core URL with environment variables expanded and validated.
    pub fn resolved_url(&self) -> Result<String> {
        let url = expand_env(&self.url)?;
        if !is_valid_http_url(&url) {
            return Err(SearchError::Config {
                message: format!("invalid Solr URL: {url}"),
            });
        }
        Ok(url.trim_end_matches('/').to_string())
    }

    /// Statically registered types plus the configured `document_types`.
    pub fn registry(&self) -> Result<DocumentTypeRegistry> {
        let mut registry = DocumentTypeRegistry::from_inventory();
        for content_type in &self.document_types {
            let doc_type = DocumentType::parse(content_type).ok_or_else(|| SearchError::Config {
                message: format!("invalid document type '{content_type}', expected app_label.model_name"),
            })?;
            registry.register(doc_type);
        }
        Ok(registry)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            prefix: default_redis_prefix(),
        }
    }
}

impl RedisSettings {
    pub fn resolved_url(&self) -> Result<String> {
        let url = expand_env(&self.url)?;
        if !is_valid_redis_url(&url) {
            return Err(SearchError::Config {
                message: format!("invalid Redis URL: {url}"),
            });
        }
        Ok(url)
    }
}

/// Expand a whole-value `${NAME}` reference from the environment.
pub fn expand_env(value: &str) -> Result<String> {
    match value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(var_name) => std::env::var(var_name).map_err(|_| SearchError::Config {
            message: format!("environment variable {var_name} not set"),
        }),
        None => Ok(value.to_string()),
    }
}

fn default_solr_url() -> String {
    "${SOLR_URL}".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_highlight_fragsize() -> u32 {
    200
}

fn default_type_field() -> String {
    "django_ct".to_string()
}

fn default_id_field() -> String {
    "django_id".to_string()
}

fn default_unique_key() -> String {
    "id".to_string()
}

fn default_redis_url() -> String {
    "${REDIS_URL}".to_string()
}

fn default_redis_prefix() -> String {
    "savedsearch".to_string()
}
