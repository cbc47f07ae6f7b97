//! Code highlighting with syntect
//!
//! Produces class-based HTML (`<span class="...">`) so the page stylesheet
//! decides colors. Unknown languages fall back to first-line detection and
//! then to escaped text.

use crate::error::{NeochatError, TypedResult};
use crate::render::escape_html;
use once_cell::sync::Lazy;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// Global syntax set for language definitions (initialized once)
static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

/// Labels that mean "no language"
const PLAIN_LABELS: &[&str] = &["", "text", "plain", "plaintext", "txt"];

/// Normalize language names to match syntect's syntax definitions
fn normalize_language(lang: &str) -> String {
    match lang.to_lowercase().as_str() {
        "py" => "python".to_string(),
        "js" | "jsx" => "javascript".to_string(),
        "ts" | "tsx" | "typescript" => "javascript".to_string(),
        "rs" => "rust".to_string(),
        "sh" | "shell" | "zsh" => "bash".to_string(),
        "yml" => "yaml".to_string(),
        "md" => "markdown".to_string(),
        "cpp" | "c++" => "c++".to_string(),
        "cs" | "csharp" => "c#".to_string(),
        "rb" => "ruby".to_string(),
        "golang" => "go".to_string(),
        "svelte" | "vue" => "html".to_string(),
        other => other.to_string(),
    }
}

fn find_by_label(normalized: &str) -> Option<&'static SyntaxReference> {
    let set: &'static SyntaxSet = &SYNTAX_SET;
    set.find_syntax_by_extension(normalized)
        .or_else(|| set.find_syntax_by_name(normalized))
        .or_else(|| set.find_syntax_by_token(normalized))
}

/// Pick a syntax for a declared language, detecting one from `code` when the
/// label is missing or unknown
pub fn resolve_syntax(lang: &str, code: &str) -> Option<&'static SyntaxReference> {
    let lang = lang.trim();
    if !PLAIN_LABELS.contains(&lang.to_lowercase().as_str()) {
        if let Some(syntax) = find_by_label(&normalize_language(lang)) {
            return Some(syntax);
        }
        tracing::debug!("Unknown code language '{}', trying detection", lang);
    }

    let set: &'static SyntaxSet = &SYNTAX_SET;
    set.find_syntax_by_first_line(code)
        .filter(|s| s.name != "Plain Text")
}

/// Highlight `code` as `syntax`
///
/// # Errors
///
/// Returns `NeochatError::RenderFailure` if syntect fails to parse a line
pub fn highlight_with(syntax: &SyntaxReference, code: &str) -> TypedResult<String> {
    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, ClassStyle::Spaced);
    for line in LinesWithEndings::from(code) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .map_err(|e| NeochatError::RenderFailure(format!("highlighting failed: {}", e)))?;
    }
    Ok(generator.finalize())
}

/// Highlight `code` for the declared `lang`, degrading to escaped text
///
/// Never fails: unknown languages and highlighter errors both yield the
/// HTML-escaped source.
pub fn highlight_code(code: &str, lang: &str) -> String {
    let Some(syntax) = resolve_syntax(lang, code) else {
        return escape_html(code);
    };

    match highlight_with(syntax, code) {
        Ok(html) => html,
        Err(e) => {
            tracing::debug!("{}; using plain text", e);
            escape_html(code)
        }
    }
}
