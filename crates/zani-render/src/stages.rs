//! The individual rewrite stages, in the order the standard pipeline runs them.
//!
//! Every stage only sees text earlier stages left alone: markup they emitted
//! sits behind a placeholder (see [`crate::draft`]).

use std::sync::LazyLock;

use regex::Regex;
use zani_core::tokens::{
    BOLD_PATTERN, CHANNEL_PATTERN, CODE_PATTERN, IMAGE_PATTERN, ITALIC_PATTERN, MENTION_PATTERN,
    URL_PATTERN,
};

use crate::draft::{escape_html, Draft};
use crate::error::RenderError;
use crate::pipeline::Stage;
use crate::resolver::AttachmentResolver;

static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(IMAGE_PATTERN).expect("image pattern compiles"));
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(URL_PATTERN).expect("url pattern compiles"));
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MENTION_PATTERN).expect("mention pattern compiles"));
static CHANNEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CHANNEL_PATTERN).expect("channel pattern compiles"));
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CODE_PATTERN).expect("code pattern compiles"));
static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(BOLD_PATTERN).expect("bold pattern compiles"));
static ITALIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ITALIC_PATTERN).expect("italic pattern compiles"));

// ---------------------------------------------------------------------------
// 1. attachments
// ---------------------------------------------------------------------------

/// Pulls `"<marker> <filename>"` lines out of the text and resolves them.
///
/// The marker must start its line (leading spaces/tabs allowed). The whole
/// line, newline included, is removed, so a file name is never seen by any
/// later stage. Blank lines left at either end of the message are dropped.
pub struct AttachmentStage {
    pattern: Regex,
    resolver: AttachmentResolver,
}

impl AttachmentStage {
    pub fn new(marker: &str, resolver: AttachmentResolver) -> Result<Self, RenderError> {
        if marker.trim().is_empty() {
            return Err(RenderError::Config("attachment marker must not be blank".to_string()));
        }
        let pattern = Regex::new(&format!(
            r"(?m)^[ \t]*{}[ \t]+(\S[^\r\n]*?)[ \t]*(?:\r?\n|\r?\z)",
            regex::escape(marker)
        ))?;
        Ok(Self { pattern, resolver })
    }
}

impl Stage for AttachmentStage {
    fn name(&self) -> &'static str {
        "attachments"
    }

    fn apply(&self, draft: &mut Draft) {
        let mut names = Vec::new();
        draft.rewrite(&self.pattern, |caps, _| {
            names.push(caps[1].to_string());
            String::new()
        });
        if names.is_empty() {
            return;
        }

        for name in names {
            let attachment = self.resolver.resolve(&name);
            draft.push_attachment(attachment);
        }
        let remaining = draft
            .text()
            .trim_start_matches(['\r', '\n'])
            .trim_end()
            .to_string();
        draft.set_text(remaining);
    }
}

// ---------------------------------------------------------------------------
// 2. images
// ---------------------------------------------------------------------------

/// `![alt](url)` → an inline image that opens full size in a new tab.
///
/// Urls with other schemes (`javascript:`, `file:` …) stay literal text.
pub struct ImageStage;

impl Stage for ImageStage {
    fn name(&self) -> &'static str {
        "images"
    }

    fn apply(&self, draft: &mut Draft) {
        draft.rewrite(&IMAGE_RE, |caps, fragments| {
            let url = &caps[2];
            if !is_embeddable_url(url) {
                return caps[0].to_string();
            }
            let url = escape_html(url);
            let alt = escape_html(&caps[1]);
            fragments.insert(format!(
                r#"<a href="{url}" target="_blank" rel="noopener noreferrer" class="message-image-link"><img src="{url}" alt="{alt}" class="message-image" loading="lazy"></a>"#
            ))
        });
    }
}

fn is_embeddable_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("https://")
        || lower.starts_with("http://")
        || lower.starts_with("data:image/")
        || (lower.starts_with('/') && !lower.starts_with("//"))
}

// ---------------------------------------------------------------------------
// 3. links
// ---------------------------------------------------------------------------

/// Bare `http(s)://…` urls → links opening in a new tab.
pub struct LinkStage;

impl Stage for LinkStage {
    fn name(&self) -> &'static str {
        "links"
    }

    fn apply(&self, draft: &mut Draft) {
        draft.rewrite(&URL_RE, |caps, fragments| {
            let url = escape_html(&caps[0]);
            fragments.insert(format!(
                r#"<a href="{url}" target="_blank" rel="noopener noreferrer">{url}</a>"#
            ))
        });
    }
}

// ---------------------------------------------------------------------------
// 4. assistant mention
// ---------------------------------------------------------------------------

/// Highlights the exact assistant mention. Must run before [`MentionStage`].
pub struct AssistantMentionStage {
    name: String,
}

impl AssistantMentionStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Stage for AssistantMentionStage {
    fn name(&self) -> &'static str {
        "assistant-mention"
    }

    fn apply(&self, draft: &mut Draft) {
        draft.rewrite(&MENTION_RE, |caps, fragments| {
            if &caps["name"] != self.name {
                return caps[0].to_string();
            }
            let span = fragments.insert(format!(
                r#"<span class="mention mention-assistant">@{}</span>"#,
                escape_html(&self.name)
            ));
            format!("{}{span}", &caps["lead"])
        });
    }
}

// ---------------------------------------------------------------------------
// 5. mentions and channel references
// ---------------------------------------------------------------------------

/// Ordinary `@user` mentions and `#channel` references.
pub struct MentionStage {
    assistant: String,
}

impl MentionStage {
    pub fn new(assistant: impl Into<String>) -> Self {
        Self {
            assistant: assistant.into(),
        }
    }
}

impl Stage for MentionStage {
    fn name(&self) -> &'static str {
        "mentions"
    }

    fn apply(&self, draft: &mut Draft) {
        draft.rewrite(&MENTION_RE, |caps, fragments| {
            if &caps["name"] == self.assistant {
                return caps[0].to_string();
            }
            let span = fragments.insert(format!(
                r#"<span class="mention">@{}</span>"#,
                escape_html(&caps["name"])
            ));
            format!("{}{span}", &caps["lead"])
        });
        draft.rewrite(&CHANNEL_RE, |caps, fragments| {
            let span = fragments.insert(format!(
                r#"<span class="channel-ref">#{}</span>"#,
                escape_html(&caps["name"])
            ));
            format!("{}{span}", &caps["lead"])
        });
    }
}

// ---------------------------------------------------------------------------
// 6. emphasis
// ---------------------------------------------------------------------------

/// `` `code` ``, then `*bold*`, then `_italic_`.
///
/// Code spans are emitted whole so nothing inside them is emphasised. Bold and
/// italic only emit their tags and leave the inner text in place, so they can
/// wrap markup from earlier stages (`*@alice*`). A span that would cut through
/// another one (`*a _b* c_`) stays literal.
pub struct EmphasisStage;

impl Stage for EmphasisStage {
    fn name(&self) -> &'static str {
        "emphasis"
    }

    fn apply(&self, draft: &mut Draft) {
        draft.rewrite(&CODE_RE, |caps, fragments| {
            fragments.insert(format!("<code>{}</code>", escape_html(&caps[1])))
        });
        // open/close placeholders of every emphasis span emitted so far
        let mut spans: Vec<(String, String)> = Vec::new();
        for (re, tag) in [(&*BOLD_RE, "strong"), (&*ITALIC_RE, "em")] {
            draft.rewrite(re, |caps, fragments| {
                let inner = &caps[1];
                let crosses = spans
                    .iter()
                    .any(|(open, close)| inner.contains(open.as_str()) != inner.contains(close.as_str()));
                if crosses {
                    return caps[0].to_string();
                }
                let open = fragments.insert(format!("<{tag}>"));
                let close = fragments.insert(format!("</{tag}>"));
                let out = format!("{open}{inner}{close}");
                spans.push((open, close));
                out
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::MemoryAttachmentStore;

    fn run(stage: &dyn Stage, input: &str) -> String {
        let mut draft = Draft::new(input);
        stage.apply(&mut draft);
        draft.finish().markup
    }

    fn attachment_stage() -> AttachmentStage {
        let resolver = AttachmentResolver::new(Arc::new(MemoryAttachmentStore::new()), "/ph.svg");
        AttachmentStage::new("📎", resolver).unwrap()
    }

    #[test]
    fn attachment_lines_are_removed_and_resolved() {
        let stage = attachment_stage();
        let mut draft = Draft::new("📎 a.pdf\n  📎 b c.txt  \nhello");
        stage.apply(&mut draft);
        assert_eq!(draft.text(), "hello");
        let names: Vec<_> = draft.attachments().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["a.pdf", "b c.txt"]);
    }

    #[test]
    fn marker_mid_line_is_not_an_attachment() {
        let stage = attachment_stage();
        let mut draft = Draft::new("see 📎 a.pdf");
        stage.apply(&mut draft);
        assert!(draft.attachments().is_empty());
        assert_eq!(draft.text(), "see 📎 a.pdf");
    }

    #[test]
    fn trailing_attachment_line_leaves_no_dangling_break() {
        let stage = attachment_stage();
        let mut draft = Draft::new("hello\n📎 a.pdf");
        stage.apply(&mut draft);
        assert_eq!(draft.text(), "hello");
    }

    #[test]
    fn carriage_return_is_not_part_of_the_name() {
        let stage = attachment_stage();
        let mut draft = Draft::new("📎 a.pdf\r");
        stage.apply(&mut draft);
        assert_eq!(draft.attachments()[0].name, "a.pdf");

        let mut draft = Draft::new("📎 b.pdf \r\nok");
        stage.apply(&mut draft);
        assert_eq!(draft.attachments()[0].name, "b.pdf");
        assert_eq!(draft.text(), "ok");
    }

    #[test]
    fn blank_lines_after_attachments_are_dropped() {
        let stage = attachment_stage();
        let mut draft = Draft::new("📎 x.png\n\n\nhi\n\nthere");
        stage.apply(&mut draft);
        assert_eq!(draft.text(), "hi\n\nthere");
    }

    #[test]
    fn blank_marker_is_rejected() {
        let resolver = AttachmentResolver::new(Arc::new(MemoryAttachmentStore::new()), "/ph.svg");
        assert!(AttachmentStage::new(" ", resolver).is_err());
    }

    #[test]
    fn image_alt_and_url_are_escaped() {
        let out = run(&ImageStage, r#"![x" onerror="alert(1)](https://e.com/a.png)"#);
        assert!(out.contains(r#"alt="x&quot; onerror=&quot;alert(1)""#));
        assert!(!out.contains(r#"" onerror=""#));
    }

    #[test]
    fn image_with_script_url_stays_text() {
        let out = run(&ImageStage, "![a](javascript:alert(1))");
        assert!(!out.contains("<img"));
        assert!(out.contains("javascript:alert"));
    }

    #[test]
    fn links_open_in_new_tab() {
        let out = run(&LinkStage, "go to https://example.com/a_b now");
        assert_eq!(
            out,
            r#"go to <a href="https://example.com/a_b" target="_blank" rel="noopener noreferrer">https://example.com/a_b</a> now"#
        );
    }

    #[test]
    fn assistant_stage_requires_exact_name() {
        let stage = AssistantMentionStage::new("zani");
        assert!(run(&stage, "@zani hi").contains("mention-assistant"));
        assert!(!run(&stage, "@zani-bot hi").contains("mention-assistant"));
        assert!(!run(&stage, "@zanix hi").contains("mention-assistant"));
    }

    #[test]
    fn mention_stage_skips_the_assistant() {
        let out = run(&MentionStage::new("zani"), "@zani and @bob in #general");
        assert!(out.starts_with("@zani and "));
        assert!(out.contains(r#"<span class="mention">@bob</span>"#));
        assert!(out.contains(r#"<span class="channel-ref">#general</span>"#));
    }

    #[test]
    fn email_addresses_stay_plain_text() {
        let out = run(&MentionStage::new("zani"), "mail ops@example.com or dev@zani");
        assert_eq!(out, "mail ops@example.com or dev@zani");
        assert!(!run(&AssistantMentionStage::new("zani"), "dev@zani hi").contains("<span"));
    }

    #[test]
    fn adjacent_mentions_keep_their_separator() {
        let out = run(&MentionStage::new("zani"), "@ann,@bob\n@cy");
        assert_eq!(
            out,
            r#"<span class="mention">@ann</span>,<span class="mention">@bob</span><br><span class="mention">@cy</span>"#
        );
    }

    #[test]
    fn emphasis_is_non_greedy() {
        let out = run(&EmphasisStage, "*a* b *c*");
        assert_eq!(out, "<strong>a</strong> b <strong>c</strong>");
    }

    #[test]
    fn code_contents_are_not_emphasised() {
        let out = run(&EmphasisStage, "`a*b*c` and _d_");
        assert_eq!(out, "<code>a*b*c</code> and <em>d</em>");
    }

    #[test]
    fn crossing_spans_are_not_nested() {
        assert_eq!(run(&EmphasisStage, "*a _b* c_"), "<strong>a _b</strong> c_");
        assert_eq!(
            run(&EmphasisStage, "_x *y* z_"),
            "<em>x <strong>y</strong> z</em>"
        );
    }

    #[test]
    fn unmatched_markers_stay_literal() {
        assert_eq!(run(&EmphasisStage, "2 * 3 = 6"), "2 * 3 = 6");
    }
}
