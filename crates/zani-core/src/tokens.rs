//! Reserved lexical tokens shared by the renderer and the mention detector.
//!
//! Both sides must agree on what counts as a mention, otherwise a message
//! could be highlighted as addressing the assistant without being answered
//! (or the reverse).

/// Assistant name used when the config does not override it. Mentioned as `@zani`.
pub const DEFAULT_ASSISTANT_NAME: &str = "zani";

/// Glyph that prefixes an uploaded-file line: `📎 report.pdf`.
pub const DEFAULT_ATTACHMENT_MARKER: &str = "📎";

/// `@name` mention. Group `lead` is the start of input or the single
/// non-name character before the `@`, so `ops@example.com` is not a mention.
/// Group `name` is greedy over name characters: `@zani-bot` captures
/// `zani-bot` and never equals `zani`.
pub const MENTION_PATTERN: &str = r"(?P<lead>^|[^\w-])@(?P<name>[\w-]+)";

/// `#name` channel reference, with the same `lead` and `name` groups.
pub const CHANNEL_PATTERN: &str = r"(?P<lead>^|[^\w-])#(?P<name>[\w-]+)";

/// Markdown image `![alt](url)`. Captures: alt, url.
pub const IMAGE_PATTERN: &str = r"!\[([^\]\n]*)\]\(([^)\s]+)\)";

/// Bare http(s) url. Private-use placeholder characters are excluded so a url
/// never swallows markup emitted by an earlier rendering stage.
pub const URL_PATTERN: &str = r"https?://[^\s\x{E000}\x{E001}]+";

pub const CODE_PATTERN: &str = r"`([^`\n]+)`";
pub const BOLD_PATTERN: &str = r"\*([^*\n]+)\*";
pub const ITALIC_PATTERN: &str = r"_([^_\n]+)_";
