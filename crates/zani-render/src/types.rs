use serde::{Deserialize, Serialize};

/// A previously uploaded file as the attachment store knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub name: String,
    pub url: String,
    pub size_bytes: Option<u64>,
}

/// Where an [`Attachment`]'s url and size came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentSource {
    /// Found in the attachment store.
    Store,
    /// Not found; url is a placeholder and the size is unknown.
    Placeholder,
}

/// File referenced by a message, derived on every render and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub url: String,
    /// `None` when the store has no record of the file.
    pub size_bytes: Option<u64>,
    pub source: AttachmentSource,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Output of the content transformer: escaped markup and extracted files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedContent {
    pub markup: String,
    pub attachments: Vec<Attachment>,
}
