//! Attachment resolution: file name → metadata, with a deterministic fallback
//! when the store has never seen the file.

use std::sync::Arc;

use base64::Engine;
use tracing::{debug, warn};

use crate::store::AttachmentStore;
use crate::types::{Attachment, AttachmentSource};

const OCTET_STREAM: &str = "application/octet-stream";

pub struct AttachmentResolver {
    store: Arc<dyn AttachmentStore>,
    placeholder_image_url: String,
}

impl AttachmentResolver {
    pub fn new(store: Arc<dyn AttachmentStore>, placeholder_image_url: impl Into<String>) -> Self {
        Self {
            store,
            placeholder_image_url: placeholder_image_url.into(),
        }
    }

    /// Resolve `file_name` to an attachment. Never fails: a miss or a store
    /// error produces a placeholder with an unknown size.
    pub fn resolve(&self, file_name: &str) -> Attachment {
        let mime_type = mime_for(file_name);

        match self.store.lookup_by_name(file_name) {
            Ok(Some(record)) => {
                debug!(file = %file_name, "attachment resolved from store");
                return Attachment {
                    name: record.name,
                    mime_type,
                    url: record.url,
                    size_bytes: record.size_bytes,
                    source: AttachmentSource::Store,
                };
            }
            Ok(None) => debug!(file = %file_name, "attachment not in store, using placeholder"),
            Err(e) => warn!(file = %file_name, error = %e, "attachment lookup failed, using placeholder"),
        }

        let url = if mime_type.starts_with("image/") {
            self.placeholder_image_url.clone()
        } else {
            opaque_data_url(&mime_type, file_name)
        };

        Attachment {
            name: file_name.to_string(),
            mime_type,
            url,
            size_bytes: None,
            source: AttachmentSource::Placeholder,
        }
    }
}

/// MIME type from the file extension; unknown extensions are octet-stream.
pub fn mime_for(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

/// `data:` url whose payload is the file name itself. Stable for a given name
/// and type, and carries no file content.
fn opaque_data_url(mime_type: &str, file_name: &str) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(file_name.as_bytes());
    format!("data:{mime_type};base64,{b64}")
}
