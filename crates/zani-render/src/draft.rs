//! Working state threaded through the rendering stages.
//!
//! A stage that emits markup does not splice it into the text. It stores the
//! markup as a fragment and leaves a placeholder (`\u{E000}<index>\u{E001}`)
//! in its place. Placeholders contain no character any later pattern can
//! match, so markup is opaque to every later stage. Text outside of
//! fragments stays raw until [`Draft::finish`] escapes it.

use regex::{Captures, Regex};

use crate::types::{Attachment, FormattedContent};

const FRAGMENT_OPEN: char = '\u{E000}';
const FRAGMENT_CLOSE: char = '\u{E001}';

/// Markup emitted by earlier stages, addressed by placeholder index.
#[derive(Debug, Default)]
pub struct Fragments {
    items: Vec<String>,
}

impl Fragments {
    /// Store finished markup and return the placeholder that stands for it.
    pub fn insert(&mut self, markup: impl Into<String>) -> String {
        let index = self.items.len();
        self.items.push(markup.into());
        format!("{FRAGMENT_OPEN}{index}{FRAGMENT_CLOSE}")
    }

    fn get(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug)]
pub struct Draft {
    text: String,
    fragments: Fragments,
    attachments: Vec<Attachment>,
}

impl Draft {
    /// Start a draft from raw content. Placeholder characters typed by the
    /// user are replaced so they cannot address a fragment.
    pub fn new(content: &str) -> Self {
        let text = content
            .chars()
            .map(|c| match c {
                FRAGMENT_OPEN | FRAGMENT_CLOSE => char::REPLACEMENT_CHARACTER,
                other => other,
            })
            .collect();
        Self {
            text,
            fragments: Fragments::default(),
            attachments: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: String) {
        self.text = text;
    }

    pub fn fragments(&self) -> &Fragments {
        &self.fragments
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn push_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Replace every match of `re` in the text with what `replace` returns.
    ///
    /// The closure gets the fragment table so it can emit markup; returning
    /// the whole match (`caps[0]`) leaves that occurrence untouched.
    pub fn rewrite<F>(&mut self, re: &Regex, mut replace: F)
    where
        F: FnMut(&Captures<'_>, &mut Fragments) -> String,
    {
        let text = std::mem::take(&mut self.text);
        let fragments = &mut self.fragments;
        self.text = re
            .replace_all(&text, |caps: &Captures<'_>| replace(caps, fragments))
            .into_owned();
    }

    /// Escape the remaining text, expand placeholders, turn newlines into
    /// `<br>`.
    pub fn finish(self) -> FormattedContent {
        let mut markup = String::with_capacity(self.text.len() + 32);
        self.fragments.expand_into(&self.text, usize::MAX, true, &mut markup);

        FormattedContent {
            markup,
            attachments: self.attachments,
        }
    }
}

impl Fragments {
    /// Write `text` to `out`, replacing placeholders with their markup.
    ///
    /// A fragment may itself hold placeholders for fragments created before
    /// it; only indices below `limit` are expanded, which rules out cycles.
    fn expand_into(&self, text: &str, limit: usize, escape: bool, out: &mut String) {
        let mut chars = text.chars();

        while let Some(ch) = chars.next() {
            match ch {
                FRAGMENT_OPEN => {
                    let index: String = chars.by_ref().take_while(|c| *c != FRAGMENT_CLOSE).collect();
                    let Ok(index) = index.parse::<usize>() else {
                        continue;
                    };
                    if index < limit {
                        if let Some(fragment) = self.get(index) {
                            self.expand_into(fragment, index, false, out);
                        }
                    }
                }
                '\r' if escape => {}
                '\n' if escape => out.push_str("<br>"),
                other if escape => push_escaped(out, other),
                other => out.push(other),
            }
        }
    }
}

/// HTML-escape `text` for use in element content or a quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        push_escaped(&mut out, ch);
    }
    out
}

fn push_escaped(out: &mut String, ch: char) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        other => out.push(other),
    }
}
