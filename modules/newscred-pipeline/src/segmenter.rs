//! Sentence-aware text segmentation.
//!
//! The remote models accept bounded inputs. [`segment`] packs whole
//! sentences into pieces of at most `max_chars` characters and only cuts
//! inside a sentence when that sentence alone is longer than the limit.

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '?' | '!' | '…')
}

/// Collapse runs of two or more spaces/tabs into a single space.
fn collapse_inline_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run: Option<(char, usize)> = None;
    for c in text.chars() {
        if c == ' ' || c == '\t' {
            run = Some(match run {
                Some((first, n)) => (first, n + 1),
                None => (c, 1),
            });
            continue;
        }
        if let Some((first, n)) = run.take() {
            out.push(if n == 1 { first } else { ' ' });
        }
        out.push(c);
    }
    out
}

/// Split on sentence-terminal punctuation followed by whitespace, or on
/// line breaks. Returned sentences are trimmed and never empty.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let boundary = if c == '\n' || c == '\r' {
            Some((i, i + c.len_utf8()))
        } else if is_terminal(c) && chars.peek().is_some_and(|&(_, n)| n.is_whitespace()) {
            let end = i + c.len_utf8();
            Some((end, end))
        } else {
            None
        };

        if let Some((end, mut next)) = boundary {
            push_trimmed(&mut out, &text[start..end]);
            while let Some(&(j, w)) = chars.peek() {
                if !w.is_whitespace() {
                    break;
                }
                chars.next();
                next = j + w.len_utf8();
            }
            start = next;
        }
    }
    push_trimmed(&mut out, &text[start..]);
    out
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s);
    }
}

/// Byte offset of the `n`th character, or the string length.
fn char_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

struct Buffer {
    text: String,
    chars: usize,
}

impl Buffer {
    fn flush_into(&mut self, parts: &mut Vec<String>) {
        if !self.text.is_empty() {
            parts.push(std::mem::take(&mut self.text));
        }
        self.chars = 0;
    }
}

/// Split `text` into pieces of at most `max_chars` characters along
/// sentence boundaries.
///
/// Short sentences are merged with a single space while they fit. A
/// sentence longer than `max_chars` is cut into consecutive `max_chars`
/// slices regardless of word boundaries. Total and deterministic: every
/// non-whitespace character of the input appears, in order, in the output,
/// and no piece is empty.
pub fn segment(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let normalized = collapse_inline_whitespace(text.trim());

    let mut parts = Vec::new();
    let mut buf = Buffer {
        text: String::new(),
        chars: 0,
    };

    for sentence in split_sentences(&normalized) {
        let mut rest = sentence;
        let mut rest_chars = rest.chars().count();

        if rest_chars > max_chars {
            // Keep output order: whatever is buffered precedes the cut pieces.
            buf.flush_into(&mut parts);
            while rest_chars > max_chars {
                let cut = char_offset(rest, max_chars);
                let piece = rest[..cut].trim();
                if !piece.is_empty() {
                    parts.push(piece.to_string());
                }
                rest = &rest[cut..];
                rest_chars -= max_chars;
            }
            rest = rest.trim();
            rest_chars = rest.chars().count();
        }

        if rest.is_empty() {
            continue;
        }

        if buf.text.is_empty() {
            buf.text.push_str(rest);
            buf.chars = rest_chars;
        } else if buf.chars + 1 + rest_chars <= max_chars {
            buf.text.push(' ');
            buf.text.push_str(rest);
            buf.chars += 1 + rest_chars;
        } else {
            buf.flush_into(&mut parts);
            buf.text.push_str(rest);
            buf.chars = rest_chars;
        }
    }
    buf.flush_into(&mut parts);
    parts
}
