use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::message::{Attachment, MimeClass};
use crate::storage::ObjectStorage;

/// Uploads binary content to the private attachment bucket and issues
/// time-limited retrieval URLs. Validation happens before any network call;
/// retrieval degrades to the stable key when signing fails so a broken
/// presigner never turns into a hard error for the reader.
#[derive(Clone)]
pub struct AttachmentPipeline {
    storage: Arc<dyn ObjectStorage>,
    max_image_bytes: usize,
    max_file_bytes: usize,
    signed_url_ttl: Duration,
    op_timeout: Duration,
}

impl AttachmentPipeline {
    pub fn new(storage: Arc<dyn ObjectStorage>, config: &Config) -> Self {
        Self {
            storage,
            max_image_bytes: config.max_image_bytes,
            max_file_bytes: config.max_file_bytes,
            signed_url_ttl: config.signed_url_ttl,
            op_timeout: config.storage_timeout,
        }
    }

    /// Validate and upload. Keys are namespaced by owner with a
    /// collision-resistant timestamp suffix; the stable key is what gets
    /// persisted on the message, never a URL with an embedded credential.
    pub async fn upload(
        &self,
        owner_id: Uuid,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> AppResult<Attachment> {
        let file_name = file_name.trim();
        if file_name.is_empty() || file_name.len() > 255 {
            return Err(AppError::BadRequest("invalid file name".into()));
        }
        if data.is_empty() {
            return Err(AppError::BadRequest("attachment is empty".into()));
        }

        let mime: mime::Mime = content_type
            .parse()
            .map_err(|_| AppError::UnsupportedContentType(content_type.to_string()))?;
        let mime_class = if mime.type_() == mime::IMAGE {
            MimeClass::Image
        } else {
            MimeClass::File
        };
        let limit = match mime_class {
            MimeClass::Image => self.max_image_bytes,
            MimeClass::File => self.max_file_bytes,
        };
        if data.len() > limit {
            return Err(AppError::PayloadTooLarge {
                size: data.len(),
                limit,
            });
        }

        let size = data.len() as i64;
        let key = format!(
            "attachments/{}/{}-{}",
            owner_id,
            Utc::now().timestamp_millis(),
            Uuid::new_v4()
        );

        match timeout(self.op_timeout, self.storage.put(&key, data, mime.as_ref())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(AppError::Storage(e.to_string())),
            Err(_) => return Err(AppError::Storage("upload timed out".into())),
        }

        Ok(Attachment {
            key,
            name: file_name.to_string(),
            size,
            mime_class,
        })
    }

    /// Exchange the stable key for a short-lived signed URL. On signing
    /// failure or timeout the stable key comes back unchanged and the UI
    /// degrades to a possibly-inaccessible link instead of crashing.
    pub async fn access_url(&self, key: &str) -> String {
        match timeout(self.op_timeout, self.storage.presign_get(key, self.signed_url_ttl)).await {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                warn!(key, error = %e, "presign failed; falling back to stable reference");
                key.to_string()
            }
            Err(_) => {
                warn!(key, "presign timed out; falling back to stable reference");
                key.to_string()
            }
        }
    }

    /// True when the key sits under the given owner's namespace. Used to
    /// authorize signed-URL issuance for not-yet-sent uploads.
    pub fn is_owned_by(key: &str, owner_id: Uuid) -> bool {
        key.starts_with(&format!("attachments/{owner_id}/"))
    }
}
