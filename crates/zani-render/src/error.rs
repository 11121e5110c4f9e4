use thiserror::Error;

/// Errors raised while building a renderer. Rendering itself never fails.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A configured token produced an invalid pattern.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid render configuration: {0}")]
    Config(String),
}

/// An attachment store could not answer a lookup.
///
/// The resolver treats this exactly like a miss; it is surfaced only in logs.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("attachment store unavailable: {0}")]
    Unavailable(String),
}
