//! Message-content rendering: turns raw chat text into escaped markup plus
//! the list of files the message references.

pub mod draft;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod stages;
pub mod store;
pub mod types;

pub use error::{LookupError, RenderError};
pub use pipeline::{ContentTransformer, Pipeline, Stage};
pub use resolver::AttachmentResolver;
pub use store::{AttachmentStore, MemoryAttachmentStore};
pub use types::{Attachment, AttachmentRecord, AttachmentSource, FormattedContent};
