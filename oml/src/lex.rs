//! Lexical analysis
use smol_str::SmolStr;

use crate::{
    cursor::{Cursor, EOF_CHAR},
    error::LexError,
    tokens::{Span, Token, TokenKind},
};

/// Scan the whole source text into a token vector.
///
/// The scanner is eager so the parser can pre-scan object ids for
/// forward references. Scanning stops at the first error.
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    if text.trim().is_empty() {
        return Err(LexError::EmptyInput);
    }
    Lexer::new(text).run()
}

struct Lexer<'a> {
    /// Character scanner
    cursor: Cursor<'a>,
    /// Keep a reference to the source so tokens can slice
    /// fragments from it.
    original: &'a str,
    /// Start absolute byte position of the current token
    /// in the source.
    start_pos: u32,
}

impl<'a> Lexer<'a> {
    fn new(source_code: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source_code),
            original: source_code,
            start_pos: 0,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia()?;
            if self.cursor.at_end() {
                break;
            }
            self.start_token();

            match self.cursor.peek() {
                '"' => {
                    let token = self.scan_string()?;
                    tokens.push(token);
                }
                '#' => self.scan_id(&mut tokens)?,
                c if is_digit(c) => {
                    let token = self.scan_number();
                    tokens.push(token);
                }
                c if is_letter(c) => {
                    let token = self.scan_word();
                    tokens.push(token);
                }
                c if is_symbol(c) => {
                    self.cursor.bump();
                    tokens.push(self.make_token(TokenKind::Symbol(c)));
                }
                c => {
                    return Err(LexError::UnexpectedCharacter {
                        ch: c,
                        at: self.cursor.offset(),
                    })
                }
            }
        }

        Ok(tokens)
    }

    /// Erase whitespace and comment lines up to the start of the
    /// next token.
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            while is_whitespace(self.cursor.peek()) {
                self.cursor.bump();
            }

            if self.cursor.peek() == '/' {
                if self.cursor.peek2() != '/' {
                    return Err(LexError::MalformedComment {
                        at: self.cursor.offset(),
                    });
                }
                // Comment runs up to, but not including, the newline.
                while !self.cursor.at_end() && !is_newline(self.cursor.peek()) {
                    self.cursor.bump();
                }
                continue;
            }

            return Ok(());
        }
    }

    /// Primes the lexer to consume the next token.
    fn start_token(&mut self) {
        self.start_pos = self.cursor.offset();
    }

    /// Create a span from the position stored by `start_token` to the
    /// current cursor position.
    fn make_span(&self) -> Span {
        let start = self.start_pos;
        let end = self.cursor.offset();

        debug_assert!(end >= start);
        Span::new(start, end - start)
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token {
            span: self.make_span(),
            kind,
        }
    }

    fn fragment(&self) -> &str {
        self.make_span().fragment(self.original)
    }
}

/// Specialised tokens.
impl<'a> Lexer<'a> {
    /// Scan a string literal. The quotes are not part of the payload
    /// and there are no escape sequences; any character up to the
    /// closing quote is taken verbatim, newlines included.
    fn scan_string(&mut self) -> Result<Token, LexError> {
        debug_assert_eq!(self.cursor.peek(), '"');
        let open = self.cursor.offset();
        self.cursor.bump();

        let content_start = self.cursor.offset();
        while !self.cursor.at_end() && self.cursor.peek() != '"' {
            self.cursor.bump();
        }
        if self.cursor.at_end() {
            return Err(LexError::UnterminatedString { at: open });
        }
        let content_end = self.cursor.offset();
        self.cursor.bump();

        let text = self.original[content_start as usize..content_end as usize].to_string();
        Ok(self.make_token(TokenKind::Str(text)))
    }

    /// Scan `#` into a symbol token plus the id token that must
    /// follow it.
    fn scan_id(&mut self, tokens: &mut Vec<Token>) -> Result<(), LexError> {
        debug_assert_eq!(self.cursor.peek(), '#');
        self.cursor.bump();
        tokens.push(self.make_token(TokenKind::Symbol('#')));

        self.start_token();
        if !is_id_start(self.cursor.peek()) || self.cursor.at_end() {
            return Err(LexError::MalformedId {
                at: self.cursor.offset(),
            });
        }
        self.cursor.bump();
        while is_id_char(self.cursor.peek()) {
            self.cursor.bump();
        }

        let text = SmolStr::new(self.fragment());
        tokens.push(self.make_token(TokenKind::Id(text)));
        Ok(())
    }

    /// Scan a number literal.
    fn scan_number(&mut self) -> Token {
        debug_assert!(is_digit(self.cursor.peek()));
        while is_digit(self.cursor.peek()) {
            self.cursor.bump();
        }
        // Fractional part only when a digit follows the dot. A bare
        // trailing dot is left behind as a symbol.
        if self.cursor.peek() == '.' && is_digit(self.cursor.peek2()) {
            self.cursor.bump();
            while is_digit(self.cursor.peek()) {
                self.cursor.bump();
            }
        }

        // A digits-and-dot fragment always parses.
        let value: f64 = self.fragment().parse().unwrap_or_default();
        self.make_token(TokenKind::Number(value))
    }

    /// Scan a word and classify it from what follows.
    ///
    /// The same spelling can be a type name, a property name, the
    /// `using` keyword or a plain word; only the neighbouring
    /// character decides which.
    fn scan_word(&mut self) -> Token {
        debug_assert!(is_letter(self.cursor.peek()));
        while is_word_char(self.cursor.peek()) {
            self.cursor.bump();
        }

        // The span must cover the word only, not the lookahead
        // characters consumed while classifying it.
        let span = self.make_span();
        let text = SmolStr::new(span.fragment(self.original));
        let kind = self.classify_word(text);
        Token { span, kind }
    }

    fn classify_word(&mut self, text: SmolStr) -> TokenKind {
        match self.cursor.peek() {
            '#' => TokenKind::Type(text),
            ':' => TokenKind::Property(text),
            EOF_CHAR if self.cursor.at_end() => TokenKind::Word(text),
            _ => {
                // A single run of spaces may sit between a type name
                // and its opening bracket. Other whitespace ends the
                // lookahead.
                while self.cursor.peek() == ' ' {
                    self.cursor.bump();
                }
                match self.cursor.peek() {
                    '{' | '[' | '(' => TokenKind::Type(text),
                    _ if text == "using" => TokenKind::Using,
                    _ => TokenKind::Word(text),
                }
            }
        }
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_newline(c: char) -> bool {
    matches!(c, '\r' | '\n')
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_letter(c: char) -> bool {
    c.is_alphabetic()
}

/// Words are letters with embedded dots, which keeps namespace and
/// enum paths in one token.
fn is_word_char(c: char) -> bool {
    is_letter(c) || c == '.'
}

fn is_id_start(c: char) -> bool {
    is_letter(c) || c == '_'
}

fn is_id_char(c: char) -> bool {
    is_id_start(c) || is_digit(c)
}

fn is_symbol(c: char) -> bool {
    matches!(
        c,
        '{' | '}' | '[' | ']' | '(' | ')' | ':' | ';' | '.' | ',' | '@' | '='
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use TokenKind as TK;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text)
            .expect("tokenize failed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(tokenize(""), Err(LexError::EmptyInput));
        assert_eq!(tokenize("  \n\t  "), Err(LexError::EmptyInput));
    }

    #[test]
    fn test_type_with_id() {
        assert_eq!(
            kinds("Window#window1"),
            vec![
                TK::Type("Window".into()),
                TK::Symbol('#'),
                TK::Id("window1".into()),
            ]
        );
    }

    #[test]
    fn test_property_and_number() {
        assert_eq!(
            kinds("Width: 1024"),
            vec![
                TK::Property("Width".into()),
                TK::Symbol(':'),
                TK::Number(1024.0),
            ]
        );
        assert_eq!(
            kinds("Opacity: 0.5"),
            vec![
                TK::Property("Opacity".into()),
                TK::Symbol(':'),
                TK::Number(0.5),
            ]
        );
    }

    #[test]
    fn test_number_trailing_dot_is_symbol() {
        assert_eq!(kinds("1."), vec![TK::Number(1.0), TK::Symbol('.')]);
    }

    #[test]
    fn test_using_clause() {
        assert_eq!(
            kinds("using System.Windows;"),
            vec![
                TK::Using,
                TK::Word("System.Windows".into()),
                TK::Symbol(';'),
            ]
        );
    }

    #[test]
    fn test_word_using_at_end_of_input() {
        // The keyword lookahead only runs when input remains.
        assert_eq!(kinds("using"), vec![TK::Word("using".into())]);
    }

    #[test]
    fn test_type_by_bracket_lookahead() {
        assert_eq!(
            kinds("Window {"),
            vec![TK::Type("Window".into()), TK::Symbol('{')]
        );
        assert_eq!(
            kinds("Uri   (\"a\")"),
            vec![
                TK::Type("Uri".into()),
                TK::Symbol('('),
                TK::Str("a".to_string()),
                TK::Symbol(')'),
            ]
        );
        assert_eq!(
            kinds("TextBox["),
            vec![TK::Type("TextBox".into()), TK::Symbol('[')]
        );
    }

    #[test]
    fn test_bracket_lookahead_skips_spaces_only() {
        // A newline between word and bracket leaves a plain word.
        assert_eq!(
            kinds("Window\n{"),
            vec![TK::Word("Window".into()), TK::Symbol('{')]
        );
    }

    #[test]
    fn test_dotted_word() {
        assert_eq!(
            kinds("WindowState.Maximized,"),
            vec![TK::Word("WindowState.Maximized".into()), TK::Symbol(',')]
        );
    }

    #[test]
    fn test_binding_tokens() {
        assert_eq!(
            kinds("@tb.Text"),
            vec![TK::Symbol('@'), TK::Word("tb.Text".into())]
        );
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(
            kinds("\"hello world\""),
            vec![TK::Str("hello world".to_string())]
        );
        // No escape sequences; backslashes pass through verbatim.
        assert_eq!(
            kinds(r#""a\b""#),
            vec![TK::Str(r"a\b".to_string())]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            tokenize("Title: \"oops"),
            Err(LexError::UnterminatedString { at: 7 })
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("// header\nWindow {"),
            vec![TK::Type("Window".into()), TK::Symbol('{')]
        );
        assert_eq!(
            tokenize("Window { / }"),
            Err(LexError::MalformedComment { at: 9 })
        );
    }

    #[test]
    fn test_malformed_id() {
        assert_eq!(
            tokenize("Window# window1"),
            Err(LexError::MalformedId { at: 7 })
        );
        assert_eq!(tokenize("Grid#1st"), Err(LexError::MalformedId { at: 5 }));
        assert_eq!(tokenize("Grid#"), Err(LexError::MalformedId { at: 5 }));
    }

    #[test]
    fn test_id_with_digits_and_underscore() {
        assert_eq!(
            kinds("Grid#col_2"),
            vec![
                TK::Type("Grid".into()),
                TK::Symbol('#'),
                TK::Id("col_2".into()),
            ]
        );
    }

    #[test]
    fn test_unexpected_character() {
        assert_eq!(
            tokenize("Width: 5 %"),
            Err(LexError::UnexpectedCharacter { ch: '%', at: 9 })
        );
    }

    #[test]
    fn test_spans_slice_source() {
        let text = "Window { Width: 10 }";
        let tokens = tokenize(text).expect("tokenize failed");

        assert_eq!(tokens[0].span.fragment(text), "Window");
        assert_eq!(tokens[2].span.fragment(text), "Width");
        assert_eq!(tokens[4].span.fragment(text), "10");
    }
}
