//! Tokens

use std::fmt;

use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub span: Span,
    pub kind: TokenKind,
}

/// The closed set of tokens the scanner can produce.
///
/// Word-like tokens carry their text because the lexer decides their
/// kind from lookahead; the same spelling can be a [`TokenKind::Type`]
/// in one position and a [`TokenKind::Word`] in another.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// The `using` keyword opening a namespace clause.
    Using,
    /// A name in type position.
    Type(SmolStr),
    /// An object identifier, always preceded by `#`.
    Id(SmolStr),
    /// A name directly followed by `:`.
    Property(SmolStr),
    /// Any other bare word, possibly a dotted path.
    Word(SmolStr),
    /// Number literal.
    Number(f64),
    /// String literal with the quotes stripped. No escapes.
    Str(String),
    /// A single significant character, such as `{` or `@`.
    Symbol(char),
}

impl TokenKind {
    #[inline]
    pub fn is_symbol(&self, c: char) -> bool {
        matches!(self, TokenKind::Symbol(s) if *s == c)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Using => write!(f, "'using'"),
            Self::Type(name) => write!(f, "type '{}'", name),
            Self::Id(name) => write!(f, "id '{}'", name),
            Self::Property(name) => write!(f, "property '{}'", name),
            Self::Word(text) => write!(f, "word '{}'", text),
            Self::Number(value) => write!(f, "number '{}'", value),
            Self::Str(_) => write!(f, "string literal"),
            Self::Symbol(c) => write!(f, "'{}'", c),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub index: u32,
    pub size: u32,
}

impl Span {
    pub fn new(index: u32, size: u32) -> Self {
        Self { index, size }
    }

    #[inline]
    pub fn fragment<'a>(&self, text: &'a str) -> &'a str {
        &text[(self.index as usize)..(self.index as usize + self.size as usize)]
    }

    /// Ending index of the span, exclusive.
    #[inline]
    pub fn end(&self) -> u32 {
        self.index + self.size
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_span_fragment() {
        const TEXT: &str = "Window { Width: 1024 }";

        let spans = &[
            Span::new(0, 6),  // Window
            Span::new(7, 1),  // {
            Span::new(9, 5),  // Width
            Span::new(16, 4), // 1024
        ];

        assert_eq!(spans[0].fragment(TEXT), "Window");
        assert_eq!(spans[1].fragment(TEXT), "{");
        assert_eq!(spans[2].fragment(TEXT), "Width");
        assert_eq!(spans[3].fragment(TEXT), "1024");
        assert_eq!(spans[3].end(), 20);
    }

    #[test]
    fn test_kind_matchers() {
        assert!(TokenKind::Symbol('#').is_symbol('#'));
        assert!(!TokenKind::Symbol('#').is_symbol('@'));
        assert!(!TokenKind::Word(SmolStr::new("Maximized")).is_symbol('#'));
    }
}
