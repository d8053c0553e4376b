//! Character cursor used by the scanner.
use std::str::Chars;

/// Sentinel returned when peeking past the end of the source.
///
/// Note that source text can legitimately contain '\0'; the scanner
/// must check [`Cursor::at_end`] before treating it as the end.
pub(crate) const EOF_CHAR: char = '\0';

pub(crate) struct Cursor<'a> {
    chars: Chars<'a>,
    /// Byte offset of the next unconsumed character.
    offset: u32,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars(),
            offset: 0,
        }
    }

    /// Next character, without consuming it.
    #[inline]
    pub(crate) fn peek(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    /// Character one past [`Cursor::peek`], without consuming anything.
    #[inline]
    pub(crate) fn peek2(&self) -> char {
        let mut chars = self.chars.clone();
        chars.next();
        chars.next().unwrap_or(EOF_CHAR)
    }

    /// Consume the next character and advance the byte offset.
    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8() as u32;
        Some(c)
    }

    /// Byte offset of the next unconsumed character.
    #[inline]
    pub(crate) fn offset(&self) -> u32 {
        self.offset
    }

    #[inline]
    pub(crate) fn at_end(&self) -> bool {
        self.chars.as_str().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cursor_walk() {
        let mut cursor = Cursor::new("ab");

        assert_eq!(cursor.peek(), 'a');
        assert_eq!(cursor.peek2(), 'b');
        assert_eq!(cursor.offset(), 0);

        assert_eq!(cursor.bump(), Some('a'));
        assert_eq!(cursor.peek(), 'b');
        assert_eq!(cursor.peek2(), EOF_CHAR);
        assert_eq!(cursor.offset(), 1);

        assert_eq!(cursor.bump(), Some('b'));
        assert!(cursor.at_end());
        assert_eq!(cursor.peek(), EOF_CHAR);
        assert_eq!(cursor.bump(), None);
    }

    #[test]
    fn test_cursor_multibyte_offset() {
        let mut cursor = Cursor::new("é1");

        assert_eq!(cursor.bump(), Some('é'));
        // Offsets are byte positions, not character counts.
        assert_eq!(cursor.offset(), 2);
        assert_eq!(cursor.peek(), '1');
    }
}
