//! Think/answer tag segmentation
//!
//! Model output may wrap its reasoning in `<think>...</think>` and its final
//! reply in `<answer>...</answer>`. This scanner splits raw text into
//! segments before any Markdown is parsed. Matching is ASCII
//! case-insensitive. Rules:
//!
//! - `<think>` with a later `</think>` is a complete thinking segment
//! - `<think>` without one runs to the end of input and is in progress
//! - `<answer>...</answer>` contributes its trimmed inner text
//! - `<answer>` without a closing tag stays in the text literally
//! - closing tags with no opener are dropped

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";
const ANSWER_OPEN: &str = "<answer>";
const ANSWER_CLOSE: &str = "</answer>";

/// A piece of model output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Ordinary Markdown source
    Plain(&'a str),
    /// Reasoning; `complete` is false while the closing tag has not arrived
    Think { content: &'a str, complete: bool },
    /// Inner text of an answer wrapper
    Answer(&'a str),
}

impl<'a> Segment<'a> {
    /// Whether this segment is reasoning
    pub fn is_think(&self) -> bool {
        matches!(self, Segment::Think { .. })
    }

    /// Text carried by the segment
    pub fn text(&self) -> &'a str {
        match self {
            Segment::Plain(s) | Segment::Answer(s) => s,
            Segment::Think { content, .. } => content,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    ThinkOpen,
    ThinkClose,
    AnswerOpen,
    AnswerClose,
}

impl Token {
    fn text(&self) -> &'static str {
        match self {
            Token::ThinkOpen => THINK_OPEN,
            Token::ThinkClose => THINK_CLOSE,
            Token::AnswerOpen => ANSWER_OPEN,
            Token::AnswerClose => ANSWER_CLOSE,
        }
    }
}

/// Tag scanner over a lower-cased copy of the input
///
/// ASCII lower-casing keeps byte offsets identical, so positions found in
/// `lower` slice the original input directly.
struct Scanner {
    lower: String,
}

impl Scanner {
    fn new(input: &str) -> Self {
        Self {
            lower: input.to_ascii_lowercase(),
        }
    }

    fn find(&self, needle: &str, from: usize) -> Option<usize> {
        self.lower[from..].find(needle).map(|i| i + from)
    }

    /// Next tag at or after `from`
    fn next_token(&self, from: usize) -> Option<(usize, Token)> {
        [
            Token::ThinkOpen,
            Token::ThinkClose,
            Token::AnswerOpen,
            Token::AnswerClose,
        ]
        .into_iter()
        .filter_map(|t| self.find(t.text(), from).map(|pos| (pos, t)))
        .min_by_key(|(pos, _)| *pos)
    }
}

/// Split `input` into plain, thinking and answer segments
///
/// Empty plain pieces are omitted. Re-parsing a longer prefix of the same
/// stream yields the same leading segments, with at most the last one grown.
///
/// # Examples
///
/// ```
/// use neochat::render::tags::{parse_segments, Segment};
///
/// let segments = parse_segments("<think>hmm</think>Hi");
/// assert_eq!(
///     segments,
///     vec![
///         Segment::Think { content: "hmm", complete: true },
///         Segment::Plain("Hi"),
///     ]
/// );
/// ```
pub fn parse_segments(input: &str) -> Vec<Segment<'_>> {
    let scanner = Scanner::new(input);
    let mut segments = Vec::new();
    let mut pos = 0;
    // Start of pending plain text; may lag `pos` when a literal tag is kept
    let mut plain_start = 0;

    while let Some((at, token)) = scanner.next_token(pos) {
        let after = at + token.text().len();
        match token {
            Token::ThinkOpen => {
                push_plain(&mut segments, input, plain_start, at);
                match scanner.find(THINK_CLOSE, after) {
                    Some(close) => {
                        segments.push(Segment::Think {
                            content: &input[after..close],
                            complete: true,
                        });
                        pos = close + THINK_CLOSE.len();
                        plain_start = pos;
                    }
                    None => {
                        segments.push(Segment::Think {
                            content: &input[after..],
                            complete: false,
                        });
                        return segments;
                    }
                }
            }
            Token::AnswerOpen => match scanner.find(ANSWER_CLOSE, after) {
                Some(close) => {
                    push_plain(&mut segments, input, plain_start, at);
                    segments.push(Segment::Answer(input[after..close].trim()));
                    pos = close + ANSWER_CLOSE.len();
                    plain_start = pos;
                }
                None => {
                    // keep the tag as literal text
                    pos = after;
                }
            },
            Token::ThinkClose | Token::AnswerClose => {
                push_plain(&mut segments, input, plain_start, at);
                pos = after;
                plain_start = pos;
            }
        }
    }

    push_plain(&mut segments, input, plain_start, input.len());
    segments
}

fn push_plain<'a>(segments: &mut Vec<Segment<'a>>, input: &'a str, start: usize, end: usize) {
    if end > start {
        segments.push(Segment::Plain(&input[start..end]));
    }
}

/// Position just past the first `</think>` when it appears before any `<think>`
///
/// Some models omit the opening tag and only close their reasoning.
pub fn leading_orphan_think_end(input: &str) -> Option<usize> {
    let scanner = Scanner::new(input);
    let close = scanner.find(THINK_CLOSE, 0)?;
    match scanner.find(THINK_OPEN, 0) {
        Some(open) if open < close => None,
        _ => Some(close + THINK_CLOSE.len()),
    }
}
