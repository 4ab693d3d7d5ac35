use std::path::PathBuf;

use anyhow::{Context, Result};
use platform_db::DatabaseSettings;
use products_deals::{
    AttachmentPolicy, ScorerConfig,
    attachments::{DEFAULT_EXTENSIONS, DEFAULT_MAX_BYTES},
};

pub const DEFAULT_UPLOAD_DIR: &str = "static/uploads";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub scorer: ScorerConfig,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Build from the process environment. `.env` is loaded by `main` first.
    pub fn load() -> Result<Self> {
        let upload_dir = std::env::var("UPLOAD_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));

        let max_upload_bytes = match std::env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("invalid MAX_UPLOAD_BYTES `{raw}`"))?,
            Err(_) => DEFAULT_MAX_BYTES,
        };

        let allowed_extensions = std::env::var("ALLOWED_EXTENSIONS")
            .map(|raw| split_list(&raw))
            .unwrap_or_else(|_| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect());

        let cors_allowed_origins =
            split_list(&std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default());

        Ok(Self {
            database: DatabaseSettings::from_env(),
            upload_dir,
            max_upload_bytes,
            allowed_extensions,
            scorer: ScorerConfig::from_env(),
            cors_allowed_origins,
        })
    }

    pub fn attachment_policy(&self) -> AttachmentPolicy {
        AttachmentPolicy::new(&self.upload_dir)
            .with_max_bytes(self.max_upload_bytes)
            .with_extensions(&self.allowed_extensions)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}
