//! Line model for planned edits.
//!
//! A `LineBuffer` splits file text into lines and keeps each line's own
//! terminator, so rendering an edited buffer reproduces the untouched lines
//! byte for byte. Lines introduced by an edit borrow the ending of the line
//! next to them.

const LF: &str = "\n";
const CRLF: &str = "\r\n";

/// File text split into lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
    /// Terminator of each line; only the last may be empty.
    endings: Vec<&'static str>,
}

impl LineBuffer {
    /// Parse text into lines, recording `\r\n`, `\n`, or no terminator per line.
    pub fn parse(text: &str) -> Self {
        let (lines, endings) = text.split_inclusive('\n').map(split_ending).unzip();
        Self { lines, endings }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 1-based line access.
    pub fn line(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .map(String::as_str)
    }

    /// The most common terminator in the buffer, `\n` when there is none or on a tie.
    fn newline(&self) -> &'static str {
        let crlf = self.endings.iter().filter(|e| **e == CRLF).count();
        let lf = self.endings.iter().filter(|e| **e == LF).count();
        if crlf > lf { CRLF } else { LF }
    }

    /// Replace the 1-based inclusive span `start..=end` with `replacement`.
    ///
    /// New lines take the ending of the last replaced line. Callers validate
    /// the range first.
    pub fn splice(&mut self, start: usize, end: usize, replacement: Vec<String>) {
        let replaced = self.endings[end - 1];
        let unterminated = replaced.is_empty();
        let fill = if unterminated {
            self.terminated_near(start - 1, end)
                .unwrap_or_else(|| self.newline())
        } else {
            replaced
        };
        let count = replacement.len();

        self.lines.splice(start - 1..end, replacement);
        self.endings
            .splice(start - 1..end, std::iter::repeat_n(fill, count));

        // The span held the unterminated last line; whatever now ends the
        // buffer stays unterminated.
        if unterminated {
            if let Some(last) = self.endings.last_mut() {
                *last = "";
            }
        }
    }

    /// Insert `new_lines` after 1-based line `after` (0 = before the first line).
    pub fn insert_after(&mut self, after: usize, new_lines: Vec<String>) {
        let fill = self
            .terminated_near(after, after)
            .unwrap_or_else(|| self.newline());
        let count = new_lines.len();
        let appending_to_unterminated =
            after == self.len() && after > 0 && self.endings[after - 1].is_empty();

        self.lines.splice(after..after, new_lines);
        self.endings
            .splice(after..after, std::iter::repeat_n(fill, count));

        if appending_to_unterminated && count > 0 {
            self.endings[after - 1] = fill;
            if let Some(last) = self.endings.last_mut() {
                *last = "";
            }
        }
    }

    /// Ending of the terminated line just before index `before`, else of the
    /// one at index `after`.
    fn terminated_near(&self, before: usize, after: usize) -> Option<&'static str> {
        let prev = before
            .checked_sub(1)
            .and_then(|idx| self.endings.get(idx))
            .copied();
        let next = self.endings.get(after).copied();
        prev.into_iter()
            .chain(next)
            .find(|ending| !ending.is_empty())
    }

    /// Leading whitespace of line `after`, or of the next non-blank line
    /// when that line is blank or `after` is 0.
    pub fn indentation_at(&self, after: usize) -> String {
        let from = after.saturating_sub(1);
        self.lines
            .iter()
            .skip(from)
            .find(|l| !l.trim().is_empty())
            .map(|l| leading_whitespace(l).to_string())
            .unwrap_or_default()
    }

    /// Render back to text, each line followed by its own terminator.
    pub fn render(&self) -> String {
        let size = self
            .lines
            .iter()
            .zip(&self.endings)
            .map(|(l, e)| l.len() + e.len())
            .sum();
        let mut out = String::with_capacity(size);
        for (line, ending) in self.lines.iter().zip(&self.endings) {
            out.push_str(line);
            out.push_str(ending);
        }
        out
    }
}

/// Split caller-supplied content into lines.
///
/// One trailing newline is ignored; an empty string is a single empty line.
/// Only the `\r` of a `\r\n` pair is treated as part of the terminator.
pub fn split_content(content: &str) -> Vec<String> {
    if content.is_empty() {
        return vec![String::new()];
    }
    content
        .split_inclusive('\n')
        .map(|piece| split_ending(piece).0)
        .collect()
}

/// Separate one line's text from its terminator.
fn split_ending(piece: &str) -> (String, &'static str) {
    if let Some(text) = piece.strip_suffix(CRLF) {
        (text.to_string(), CRLF)
    } else if let Some(text) = piece.strip_suffix(LF) {
        (text.to_string(), LF)
    } else {
        (piece.to_string(), "")
    }
}

/// Prefix `indent` onto every non-empty line lacking leading whitespace.
pub fn apply_indentation(lines: Vec<String>, indent: &str) -> Vec<String> {
    if indent.is_empty() {
        return lines;
    }
    lines
        .into_iter()
        .map(|l| {
            if l.is_empty() || l.starts_with(char::is_whitespace) {
                l
            } else {
                format!("{}{}", indent, l)
            }
        })
        .collect()
}

fn leading_whitespace(line: &str) -> &str {
    let end = line
        .find(|c: char| !c.is_whitespace())
        .unwrap_or(line.len());
    &line[..end]
}
