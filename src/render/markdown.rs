//! Markdown to HTML
//!
//! CommonMark with GFM tables, strikethrough and task lists via
//! `pulldown-cmark`, adjusted to match chat display needs:
//!
//! - single newlines become `<br />`
//! - bare `http(s)://` and `www.` URLs become links
//! - inline code gets the `inline-code` class
//! - fenced and indented code blocks become a container with a language
//!   header, a copy button and highlighted source

use crate::render::escape_html;
use crate::render::highlight::highlight_code;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, TextMergeStream};
use regex::Regex;
use serde::Serialize;

/// Language label for code blocks that declare none
pub const DEFAULT_CODE_LABEL: &str = "text";

/// Raw source of a rendered code block, addressable by its copy button index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    /// Declared language label, shown verbatim in the header
    pub language: String,
    /// Unhighlighted source
    pub code: String,
}

static BARE_URL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)[^\s<>]+").ok());

/// Characters that end a sentence rather than a URL
const URL_TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', '\'', '"'];

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Render Markdown `source` to HTML, appending code blocks to `blocks`
///
/// Copy button indices continue from `blocks.len()`, so one collection can
/// be shared across several calls for the same message.
pub fn markdown_to_html(source: &str, blocks: &mut Vec<CodeBlock>) -> String {
    if source.trim().is_empty() {
        return String::new();
    }

    let parser = TextMergeStream::new(Parser::new_ext(source, markdown_options()));
    let mut events: Vec<Event<'_>> = Vec::new();
    let mut code: Option<(String, String)> = None;
    let mut link_depth = 0usize;

    for event in parser {
        if let Some((_, buffer)) = code.as_mut() {
            match event {
                Event::Text(text) => buffer.push_str(&text),
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((label, buffer)) = code.take() {
                        events.push(Event::Html(code_block_html(label, buffer, blocks).into()));
                    }
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let label = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .unwrap_or(DEFAULT_CODE_LABEL)
                        .to_string(),
                    CodeBlockKind::Indented => DEFAULT_CODE_LABEL.to_string(),
                };
                code = Some((label, String::new()));
            }
            Event::Code(text) => {
                events.push(Event::InlineHtml(
                    format!("<code class=\"inline-code\">{}</code>", escape_html(&text)).into(),
                ));
            }
            Event::SoftBreak => events.push(Event::HardBreak),
            Event::Start(tag @ (Tag::Link { .. } | Tag::Image { .. })) => {
                link_depth += 1;
                events.push(Event::Start(tag));
            }
            Event::End(end @ (TagEnd::Link | TagEnd::Image)) => {
                link_depth = link_depth.saturating_sub(1);
                events.push(Event::End(end));
            }
            Event::Text(text) if link_depth == 0 => autolink(text, &mut events),
            other => events.push(other),
        }
    }

    // Input ended inside an unclosed fence
    if let Some((label, buffer)) = code.take() {
        events.push(Event::Html(code_block_html(label, buffer, blocks).into()));
    }

    let mut out = String::with_capacity(source.len() * 2);
    html::push_html(&mut out, events.into_iter());
    out
}

/// Split a text event around bare URLs, linking each one
fn autolink<'a>(text: CowStr<'a>, events: &mut Vec<Event<'a>>) {
    let Some(pattern) = BARE_URL.as_ref() else {
        events.push(Event::Text(text));
        return;
    };
    if !pattern.is_match(&text) {
        events.push(Event::Text(text));
        return;
    }

    let mut last = 0;
    for m in pattern.find_iter(&text) {
        let url = m.as_str().trim_end_matches(URL_TRAILING);
        if url.is_empty() {
            continue;
        }
        if m.start() > last {
            events.push(Event::Text(text[last..m.start()].to_string().into()));
        }
        let href = if url.to_ascii_lowercase().starts_with("www.") {
            format!("http://{}", url)
        } else {
            url.to_string()
        };
        events.push(Event::InlineHtml(
            format!(
                "<a href=\"{}\">{}</a>",
                escape_html(&href),
                escape_html(url)
            )
            .into(),
        ));
        last = m.start() + url.len();
    }
    if last < text.len() {
        events.push(Event::Text(text[last..].to_string().into()));
    }
}

/// Characters allowed in the `language-*` class
fn class_token(label: &str) -> String {
    let token: String = label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#'))
        .collect();
    if token.is_empty() {
        DEFAULT_CODE_LABEL.to_string()
    } else {
        token
    }
}

fn code_block_html(label: String, mut source: String, blocks: &mut Vec<CodeBlock>) -> String {
    if source.ends_with('\n') {
        source.pop();
    }
    let index = blocks.len();
    let highlighted = highlight_code(&source, &label);

    let html = format!(
        concat!(
            "<div class=\"code-block-container\">",
            "<div class=\"code-block-header\">",
            "<span class=\"code-language\">{label}</span>",
            "<button class=\"copy-code-btn\" data-code-index=\"{index}\">",
            "<span class=\"copy-text\">Copy</span>",
            "</button>",
            "</div>",
            "<pre class=\"code-block\"><code class=\"language-{class}\">{code}</code></pre>",
            "</div>\n"
        ),
        label = escape_html(&label),
        index = index,
        class = class_token(&label),
        code = highlighted,
    );

    blocks.push(CodeBlock {
        language: label,
        code: source,
    });
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &str) -> (String, Vec<CodeBlock>) {
        let mut blocks = Vec::new();
        let html = markdown_to_html(source, &mut blocks);
        (html, blocks)
    }

    #[test]
    fn test_basic_markdown() {
        let (html, _) = render("# Title\n\n**bold** and *em*");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>em</em>"));
    }

    #[test]
    fn test_newline_becomes_line_break() {
        let (html, _) = render("line one\nline two");
        assert!(html.contains("line one<br />"));
    }

    #[test]
    fn test_tables_are_enabled() {
        let (html, _) = render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn test_inline_code_is_escaped_and_classed() {
        let (html, _) = render("use `<T>` here");
        assert!(html.contains("<code class=\"inline-code\">&lt;T&gt;</code>"));
    }

    #[test]
    fn test_fenced_code_block_container() {
        let (html, blocks) = render("```python\nprint('hi')\n```");
        assert!(html.contains("<div class=\"code-block-container\">"));
        assert!(html.contains("<span class=\"code-language\">python</span>"));
        assert!(html.contains("data-code-index=\"0\""));
        assert!(html.contains("<code class=\"language-python\">"));
        assert_eq!(
            blocks,
            vec![CodeBlock {
                language: "python".to_string(),
                code: "print('hi')".to_string()
            }]
        );
    }

    #[test]
    fn test_label_shown_verbatim_for_remapped_language() {
        let (html, blocks) = render("```svelte\n<div>{x}</div>\n```");
        assert!(html.contains("<span class=\"code-language\">svelte</span>"));
        assert_eq!(blocks[0].language, "svelte");
    }

    #[test]
    fn test_indented_and_unlabelled_blocks_use_text() {
        let (_, blocks) = render("    indented code\n\n```\nplain\n```");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].language, "text");
        assert_eq!(blocks[1].language, "text");
        assert_eq!(blocks[1].code, "plain");
    }

    #[test]
    fn test_indices_continue_across_calls() {
        let mut blocks = Vec::new();
        markdown_to_html("```\na\n```", &mut blocks);
        let html = markdown_to_html("```\nb\n```", &mut blocks);
        assert!(html.contains("data-code-index=\"1\""));
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_unclosed_fence_still_renders_container() {
        let (html, blocks) = render("```rust\nfn main() {");
        assert!(html.contains("code-block-container"));
        assert_eq!(blocks[0].code, "fn main() {");
    }

    #[test]
    fn test_bare_urls_are_autolinked() {
        let (html, _) = render("see https://example.com/a?b=1. and www.rust-lang.org");
        assert!(html.contains("<a href=\"https://example.com/a?b=1\">https://example.com/a?b=1</a>."));
        assert!(html.contains("<a href=\"http://www.rust-lang.org\">www.rust-lang.org</a>"));
    }

    #[test]
    fn test_urls_inside_links_and_code_are_not_relinked() {
        let (html, _) = render("[https://a.example](https://a.example) `https://b.example`");
        assert_eq!(html.matches("<a href").count(), 1);
        assert!(html.contains("<code class=\"inline-code\">https://b.example</code>"));
    }

    #[test]
    fn test_empty_source() {
        let (html, blocks) = render("   ");
        assert!(html.is_empty());
        assert!(blocks.is_empty());
    }
}
