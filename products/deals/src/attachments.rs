//! Deal attachments: upload policy and on-disk storage.

use std::path::{Path, PathBuf};

use entity::deal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{DealStore, StoreError, StoreResult};

pub const DEFAULT_MAX_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_EXTENSIONS: [&str; 4] = ["pdf", "docx", "doc", "txt"];

#[derive(Clone, Debug)]
pub struct AttachmentPolicy {
    upload_dir: PathBuf,
    max_bytes: usize,
    allowed_extensions: Vec<String>,
}

impl AttachmentPolicy {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_bytes: DEFAULT_MAX_BYTES,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Replace the allow-list. Entries are compared case-insensitively and a
    /// leading dot is ignored.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    /// Validate an upload and return the sanitised file name to store it under.
    pub fn check(&self, file_name: &str, size: usize) -> StoreResult<String> {
        let name = sanitize_file_name(file_name);
        if name.is_empty() {
            return Err(StoreError::Attachment("file name is empty".into()));
        }
        let extension = Path::new(&name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !self.allowed_extensions.iter().any(|allowed| *allowed == extension) {
            return Err(StoreError::Attachment(format!(
                "`{name}` is not one of: {}",
                self.allowed_extensions.join(", ")
            )));
        }
        if size == 0 {
            return Err(StoreError::Attachment("file is empty".into()));
        }
        if size > self.max_bytes {
            return Err(StoreError::Attachment(format!(
                "file is {size} bytes, limit is {}",
                self.max_bytes
            )));
        }
        Ok(name)
    }
}

/// Keep the last path component and replace anything outside
/// `[A-Za-z0-9._-]` with `_`.
fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

impl DealStore {
    /// Write an attachment under the policy's upload directory and record its
    /// path on the deal. The file is removed again if the deal update fails.
    /// A previous upload in the same directory is deleted once it is replaced.
    #[instrument(skip(self, policy, bytes), fields(size = bytes.len()))]
    pub async fn store_attachment(
        &self,
        policy: &AttachmentPolicy,
        deal_id: i32,
        file_name: &str,
        bytes: &[u8],
    ) -> StoreResult<deal::Model> {
        let name = policy.check(file_name, bytes.len())?;
        let previous = self
            .get_deal(deal_id)
            .await?
            .ok_or_else(|| StoreError::not_found("deal", deal_id))?
            .file_path;

        tokio::fs::create_dir_all(policy.upload_dir()).await?;
        let path = policy
            .upload_dir()
            .join(format!("deal-{deal_id}-{}-{name}", Uuid::new_v4().simple()));
        tokio::fs::write(&path, bytes).await?;

        let stored = path.to_string_lossy().into_owned();
        match self.set_attachment(deal_id, &stored).await {
            Ok(deal) => {
                info!(deal_id, path = %stored, "attachment stored");
                if let Some(old) = previous.map(PathBuf::from) {
                    remove_replaced(policy, &old).await;
                }
                Ok(deal)
            }
            Err(err) => {
                if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                    warn!(error = %cleanup, path = %stored, "failed to remove orphaned attachment");
                }
                Err(err)
            }
        }
    }
}

async fn remove_replaced(policy: &AttachmentPolicy, old: &Path) {
    if !old.starts_with(policy.upload_dir()) {
        return;
    }
    match tokio::fs::remove_file(old).await {
        Ok(()) => info!(path = %old.display(), "replaced attachment removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(error = %err, path = %old.display(), "failed to remove replaced attachment"),
    }
}
