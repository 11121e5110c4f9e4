//! SQLite persistence for assistant answers and uploaded attachments.

pub mod attachments;
pub mod db;
pub mod error;
pub mod responses;

pub use attachments::SqliteAttachmentStore;
pub use error::StoreError;
pub use responses::SqliteResponseCache;
