use std::sync::LazyLock;

use regex::Regex;
use zani_core::tokens::MENTION_PATTERN;

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MENTION_PATTERN).expect("mention pattern compiles"));

/// Finds the assistant mention in a message and extracts the question.
///
/// Uses the same mention pattern as the renderer, so a message is answered
/// exactly when it is highlighted as addressing the assistant.
#[derive(Debug, Clone)]
pub struct MentionDetector {
    name: String,
}

impl MentionDetector {
    /// `name` is the assistant's mention name without the `@`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Whether `content` contains the exact assistant token.
    pub fn has_mention(&self, content: &str) -> bool {
        self.token_end(content).is_some()
    }

    /// Return the query addressed to the assistant, if any.
    ///
    /// The query is the rest of the line after the first assistant token,
    /// trimmed, without a leading `,` `:` or `;`. A token with nothing after
    /// it yields `None`.
    pub fn detect(&self, content: &str) -> Option<String> {
        let end = self.token_end(content)?;
        let rest = &content[end..];
        let line = rest.split('\n').next().unwrap_or_default();
        let query = line
            .trim_start()
            .trim_start_matches([',', ':', ';'])
            .trim();

        if query.is_empty() {
            None
        } else {
            Some(query.to_string())
        }
    }

    fn token_end(&self, content: &str) -> Option<usize> {
        MENTION_RE
            .captures_iter(content)
            .find(|caps| &caps["name"] == self.name)
            .and_then(|caps| caps.get(0))
            .map(|m| m.end())
    }
}
