//! Result and errors.
use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::tokens::TokenKind;

pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// Failure in the scanner. Scanning stops at the first error.
#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    /// Source text was empty or all whitespace.
    EmptyInput,
    /// A single `/` that does not open a `//` comment.
    MalformedComment { at: u32 },
    /// `#` not followed by a letter or underscore.
    MalformedId { at: u32 },
    /// String literal with no closing quote.
    UnterminatedString { at: u32 },
    UnexpectedCharacter { ch: char, at: u32 },
}

impl Display for LexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "source text is empty"),
            Self::MalformedComment { at } => {
                write!(f, "malformed comment at byte {}, expected '//'", at)
            }
            Self::MalformedId { at } => write!(f, "malformed object id at byte {}", at),
            Self::UnterminatedString { at } => {
                write!(f, "unterminated string literal starting at byte {}", at)
            }
            Self::UnexpectedCharacter { ch, at } => {
                write!(f, "unexpected character '{}' at byte {}", ch, at)
            }
        }
    }
}

impl std::error::Error for LexError {}

/// Failure in the parser. Parsing stops at the first error.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Lex(LexError),
    UnexpectedToken {
        expected: &'static str,
        /// `None` when the token stream ended early.
        found: Option<TokenKind>,
        at: u32,
    },
    /// Property assigned twice within one object block.
    DuplicateProperty { name: SmolStr, at: u32 },
    /// An id that was referenced but never declared by an object.
    UndeclaredReference { id: SmolStr },
    MalformedNamespace { at: u32 },
    /// The root object's id is reserved as `this`.
    RootHasExplicitId { at: u32 },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(err) => write!(f, "{}", err),
            Self::UnexpectedToken {
                expected,
                found: Some(found),
                at,
            } => write!(
                f,
                "encountered unexpected token {} at byte {}, expected {}",
                found, at, expected
            ),
            Self::UnexpectedToken {
                expected,
                found: None,
                ..
            } => write!(f, "unexpected end of document, expected {}", expected),
            Self::DuplicateProperty { name, at } => {
                write!(f, "property '{}' assigned more than once at byte {}", name, at)
            }
            Self::UndeclaredReference { id } => {
                write!(f, "reference to undeclared object id '{}'", id)
            }
            Self::MalformedNamespace { at } => {
                write!(f, "malformed namespace in using clause at byte {}", at)
            }
            Self::RootHasExplicitId { at } => write!(
                f,
                "root object at byte {} cannot declare an id, its id is reserved as 'this'",
                at
            ),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError::Lex(err)
    }
}

/// Failure in the semantic analyzer. Analysis stops at the first error.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Namespace with no types in the allowed assemblies.
    UnknownNamespace(SmolStr),
    NoObjects,
    /// Not exactly one object carrying the root id.
    RootCountMismatch { found: usize },
    DuplicateId(SmolStr),
    TypeNotFound(SmolStr),
    /// Simple type name matched in more than one namespace or assembly.
    AmbiguousType(SmolStr),
    ConstructorNotFound { type_name: SmolStr, arity: usize },
    DuplicateProperty { type_name: SmolStr, name: SmolStr },
    PropertyNotFound { type_name: SmolStr, name: SmolStr },
    ValueTypeMismatch { property: SmolStr, expected: SmolStr },
    InvalidEnumMember { type_name: SmolStr, member: SmolStr },
    ArrayTypeMismatch { property: SmolStr, expected: SmolStr },
    /// Constructor arguments form a reference cycle.
    CyclicDependency(SmolStr),
}

impl Display for AnalysisError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNamespace(ns) => write!(f, "no types found in namespace '{}'", ns),
            Self::NoObjects => write!(f, "document contains no objects"),
            Self::RootCountMismatch { found } => {
                write!(f, "expected exactly one root object, found {}", found)
            }
            Self::DuplicateId(id) => write!(f, "duplicate object id '{}'", id),
            Self::TypeNotFound(name) => write!(f, "type not found: '{}'", name),
            Self::AmbiguousType(name) => {
                write!(f, "type name '{}' matches more than one type", name)
            }
            Self::ConstructorNotFound { type_name, arity } => write!(
                f,
                "no matching constructor on type '{}' for {} argument(s)",
                type_name, arity
            ),
            Self::DuplicateProperty { type_name, name } => write!(
                f,
                "property '{}' assigned more than once on '{}'",
                name, type_name
            ),
            Self::PropertyNotFound { type_name, name } => {
                write!(f, "type '{}' has no property '{}'", type_name, name)
            }
            Self::ValueTypeMismatch { property, expected } => write!(
                f,
                "value of property '{}' is not assignable to '{}'",
                property, expected
            ),
            Self::InvalidEnumMember { type_name, member } => {
                write!(f, "'{}' is not a member of enum '{}'", member, type_name)
            }
            Self::ArrayTypeMismatch { property, expected } => write!(
                f,
                "array for property '{}' is not assignable to '{}'",
                property, expected
            ),
            Self::CyclicDependency(id) => {
                write!(f, "cyclic constructor dependency involving object '{}'", id)
            }
        }
    }
}

impl std::error::Error for AnalysisError {}

/// Any failure the one-shot compile entry point can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    Parse(ParseError),
    Analysis(AnalysisError),
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "syntax error: {}", err),
            Self::Analysis(err) => write!(f, "semantic error: {}", err),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::Parse(err)
    }
}

impl From<LexError> for CompileError {
    fn from(err: LexError) -> Self {
        CompileError::Parse(ParseError::Lex(err))
    }
}

impl From<AnalysisError> for CompileError {
    fn from(err: AnalysisError) -> Self {
        CompileError::Analysis(err)
    }
}
