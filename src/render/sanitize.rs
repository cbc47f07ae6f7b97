//! Post-render sanitization
//!
//! Runs over the final HTML. Embedded `script`, `iframe`, `object` and
//! `embed` markup is replaced by a visible, escaped placeholder, and every
//! `javascript:` scheme (including whitespace-split and entity-encoded
//! spellings) is rewritten to an inert one.

use crate::render::escape_html;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Elements that must never reach the page as markup
const BLOCKED_TAGS: &[&str] = &["script", "iframe", "object", "embed"];

/// Inert replacement for the `javascript:` scheme
pub const DISABLED_SCHEME: &str = "javascript-disabled:";

struct TagPatterns {
    paired: Regex,
    lone: Regex,
}

static TAG_PATTERNS: Lazy<Vec<TagPatterns>> = Lazy::new(|| {
    BLOCKED_TAGS
        .iter()
        .filter_map(|tag| {
            let paired = Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).ok()?;
            let lone = Regex::new(&format!(r"(?i)</?{tag}\b[^>]*>?")).ok()?;
            Some(TagPatterns { paired, lone })
        })
        .collect()
});

/// One scheme letter, literal or as a decimal/hex character reference
fn scheme_letter(c: char) -> String {
    let lower = c.to_ascii_lowercase() as u32;
    let upper = c.to_ascii_uppercase() as u32;
    format!(
        "(?:{c}|&#0*(?:{lower}|{upper});?|&#x0*(?:{lower:x}|{upper:x});?)"
    )
}

/// Whitespace the browser drops inside a scheme, literal or encoded
const SCHEME_GAP: &str = r"(?:\s|&#0*(?:9|10|13);?|&#x0*(?:9|a|d);?|&tab;|&newline;)*";

const SCHEME_COLON: &str = r"(?::|&#0*58;?|&#x0*3a;?|&colon;)";

static JAVASCRIPT_SCHEME: Lazy<Option<Regex>> = Lazy::new(|| {
    let letters: Vec<String> = "javascript".chars().map(scheme_letter).collect();
    let pattern = format!(
        "(?i){}{}{}",
        letters.join(SCHEME_GAP),
        SCHEME_GAP,
        SCHEME_COLON
    );
    Regex::new(&pattern).ok()
});

fn placeholder(caps: &Captures<'_>) -> String {
    format!(
        "<pre class=\"sanitized-script\">{}</pre>",
        escape_html(&caps[0])
    )
}

/// Neutralize blocked elements and `javascript:` URIs in rendered HTML
///
/// # Examples
///
/// ```
/// use neochat::render::sanitize::sanitize_html;
///
/// let html = sanitize_html("<p>hi</p><script>alert(1)</script>");
/// assert!(!html.contains("<script"));
/// assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
/// ```
pub fn sanitize_html(html: &str) -> String {
    let mut out = html.to_string();

    for patterns in TAG_PATTERNS.iter() {
        if patterns.lone.is_match(&out) {
            out = patterns.paired.replace_all(&out, placeholder).into_owned();
            out = patterns.lone.replace_all(&out, placeholder).into_owned();
        }
    }

    if let Some(scheme) = JAVASCRIPT_SCHEME.as_ref() {
        out = scheme.replace_all(&out, DISABLED_SCHEME).into_owned();
    }

    out
}
