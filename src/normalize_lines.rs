//! Normalize line endings
//!
//! Takes a char iterator and yields the same text with every line ending
//! (`\r`, `\n`, `\r\n`) replaced by the requested line break.

use std::borrow::Cow;
use std::iter::Peekable;

use crate::line_writer::LineBreak;

/// Wraps a char iterator, normalizing line endings on the fly.
pub struct Normalized<I>
where
    I: Iterator<Item = char>,
{
    line_break: LineBreak,
    iter: Peekable<I>,
    pending: usize,
}

impl<I: Iterator<Item = char>> Normalized<I> {
    pub fn new(iter: I, line_break: LineBreak) -> Normalized<I> {
        Normalized {
            iter: iter.peekable(),
            line_break,
            pending: 0,
        }
    }
}

impl<I: Iterator<Item = char>> Iterator for Normalized<I> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        let brk = match self.line_break {
            LineBreak::Lf => "\n",
            LineBreak::Cr => "\r",
            LineBreak::Crlf => "\r\n",
        };

        if self.pending > 0 {
            let c = brk.chars().nth(brk.len() - self.pending);
            self.pending -= 1;
            return c;
        }

        match self.iter.next() {
            Some('\r') => {
                // swallow a directly following \n
                if self.iter.peek() == Some(&'\n') {
                    let _ = self.iter.next();
                }
                self.pending = brk.len() - 1;
                brk.chars().next()
            }
            Some('\n') => {
                self.pending = brk.len() - 1;
                brk.chars().next()
            }
            other => other,
        }
    }
}

/// Normalizes the line endings of `text`.
pub fn normalize_lines(text: &str, line_break: LineBreak) -> Cow<'_, str> {
    let already_normalized = match line_break {
        LineBreak::Lf => !text.contains('\r'),
        LineBreak::Cr => !text.contains('\n'),
        LineBreak::Crlf => {
            let mut ok = true;
            let mut chars = text.chars().peekable();
            while let Some(c) = chars.next() {
                match c {
                    '\r' => {
                        if chars.peek() != Some(&'\n') {
                            ok = false;
                            break;
                        }
                        let _ = chars.next();
                    }
                    '\n' => {
                        ok = false;
                        break;
                    }
                    _ => {}
                }
            }
            ok
        }
    };

    if already_normalized {
        return Cow::Borrowed(text);
    }

    Cow::Owned(String::from_iter(Normalized::new(text.chars(), line_break)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_to_lf() {
        let input = "This is a string \n with \r some \n\r\n random newlines\r\r\n\n";
        assert_eq!(
            &String::from_iter(Normalized::new(input.chars(), LineBreak::Lf)),
            "This is a string \n with \n some \n\n random newlines\n\n\n"
        );
    }

    #[test]
    fn normalize_to_crlf() {
        let input = "a\nb\r\nc\rd";
        assert_eq!(
            normalize_lines(input, LineBreak::Crlf).as_ref(),
            "a\r\nb\r\nc\r\nd"
        );
        assert!(matches!(
            normalize_lines("a\r\nb", LineBreak::Crlf),
            Cow::Borrowed(_)
        ));
    }
}
