//! Syntactic analysis
use std::collections::BTreeMap;

use smol_str::SmolStr;

use crate::{
    ast::{lower_camel, Binding, BindingMode, ObjectNode, PropertyNode, SyntaxTree, ValueNode, ROOT_ID},
    error::ParseError,
    lex::tokenize,
    registry::{NameSet, TypeRegistry},
    tokens::{Token, TokenKind},
};

/// Parse a whole document into a syntax tree.
///
/// The given namespaces are defaults available without a `using`
/// clause; the registry is only consulted to decide whether a bare
/// word names a type. Objects land in the tree in post order, each
/// nested declaration before the declaration containing it, with the
/// root last.
pub fn parse<R: TypeRegistry>(
    text: &str,
    registry: &R,
    assemblies: &NameSet,
    namespaces: &NameSet,
) -> Result<SyntaxTree, ParseError> {
    let tokens = tokenize(text)?;
    Parser::new(tokens, registry, assemblies, namespaces).run()
}

struct Parser<'a, R> {
    tokens: Vec<Token>,
    pos: usize,
    registry: &'a R,
    assemblies: &'a NameSet,
    /// Caller-supplied namespaces available without a `using` clause.
    default_namespaces: &'a NameSet,
    /// Declared plus default namespaces, fixed after the using
    /// clauses are read.
    lookup_namespaces: NameSet,
    /// Every id seen in the token stream, and whether an object has
    /// declared it. Generated ids are reserved here too.
    ids: BTreeMap<SmolStr, bool>,
    declared_namespaces: NameSet,
    objects: Vec<ObjectNode>,
}

impl<'a, R: TypeRegistry> Parser<'a, R> {
    fn new(
        tokens: Vec<Token>,
        registry: &'a R,
        assemblies: &'a NameSet,
        namespaces: &'a NameSet,
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            registry,
            assemblies,
            default_namespaces: namespaces,
            lookup_namespaces: NameSet::new(),
            ids: BTreeMap::new(),
            declared_namespaces: NameSet::new(),
            objects: Vec::new(),
        }
    }

    fn run(mut self) -> Result<SyntaxTree, ParseError> {
        log::trace!("parsing document of {} tokens", self.tokens.len());

        self.scan_ids();
        self.parse_namespaces()?;
        self.lookup_namespaces = self
            .declared_namespaces
            .iter()
            .chain(self.default_namespaces.iter())
            .cloned()
            .collect();

        self.parse_root()?;

        if self.peek().is_some() {
            return Err(self.unexpected_here("end of document"));
        }
        self.check_ids()?;

        Ok(SyntaxTree {
            namespaces: self.declared_namespaces,
            objects: self.objects,
        })
    }

    // ------------------------------------------------------------------------
    // Token access

    #[inline]
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    #[inline]
    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|token| &token.kind)
    }

    /// Take the current token. Only call after a successful peek.
    fn advance(&mut self) -> Token {
        debug_assert!(self.pos < self.tokens.len());
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        token
    }

    /// Consume the symbol when it is next, otherwise leave the
    /// stream untouched.
    fn match_symbol(&mut self, c: char) -> bool {
        if self.peek().map_or(false, |token| token.kind.is_symbol(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, c: char, expected: &'static str) -> Result<Token, ParseError> {
        if self.peek().map_or(false, |token| token.kind.is_symbol(c)) {
            Ok(self.advance())
        } else {
            Err(self.unexpected_here(expected))
        }
    }

    fn expect_type(&mut self, expected: &'static str) -> Result<SmolStr, ParseError> {
        if let Some(token) = self.peek() {
            if let TokenKind::Type(name) = &token.kind {
                let name = name.clone();
                self.pos += 1;
                return Ok(name);
            }
        }
        Err(self.unexpected_here(expected))
    }

    fn expect_id(&mut self, expected: &'static str) -> Result<SmolStr, ParseError> {
        if let Some(token) = self.peek() {
            if let TokenKind::Id(name) = &token.kind {
                let name = name.clone();
                self.pos += 1;
                return Ok(name);
            }
        }
        Err(self.unexpected_here(expected))
    }

    /// Take a word token along with its position.
    fn expect_word(&mut self, expected: &'static str) -> Result<(SmolStr, u32), ParseError> {
        if let Some(token) = self.peek() {
            if let TokenKind::Word(word) = &token.kind {
                let result = (word.clone(), token.span.index);
                self.pos += 1;
                return Ok(result);
            }
        }
        Err(self.unexpected_here(expected))
    }

    fn at_property(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Property(_)))
    }

    /// Error for the current stream position without consuming it.
    fn unexpected_here(&self, expected: &'static str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::UnexpectedToken {
                expected,
                found: Some(token.kind.clone()),
                at: token.span.index,
            },
            None => ParseError::UnexpectedToken {
                expected,
                found: None,
                at: self.end_offset(),
            },
        }
    }

    fn end_offset(&self) -> u32 {
        self.tokens.last().map(|token| token.span.end()).unwrap_or(0)
    }

    // ------------------------------------------------------------------------
    // Grammar

    /// Record every id in the token stream up front so forward
    /// references and generated ids can be checked against the full
    /// document.
    fn scan_ids(&mut self) {
        for token in &self.tokens {
            if let TokenKind::Id(name) = &token.kind {
                self.ids.entry(name.clone()).or_insert(false);
            }
        }
    }

    fn parse_namespaces(&mut self) -> Result<(), ParseError> {
        while matches!(self.peek_kind(), Some(TokenKind::Using)) {
            let using_at = self.advance().span.index;
            let mut namespace = String::new();
            loop {
                let (kind, at) = match self.peek() {
                    Some(token) => (token.kind.clone(), token.span.index),
                    None => {
                        return Err(ParseError::MalformedNamespace {
                            at: self.end_offset(),
                        })
                    }
                };
                match kind {
                    TokenKind::Word(word) => {
                        namespace.push_str(&word);
                        self.pos += 1;
                    }
                    TokenKind::Symbol('.') => {
                        namespace.push('.');
                        self.pos += 1;
                    }
                    TokenKind::Symbol(';') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(ParseError::MalformedNamespace { at }),
                }
            }
            if namespace.is_empty() {
                return Err(ParseError::MalformedNamespace { at: using_at });
            }
            self.declared_namespaces.insert(SmolStr::new(namespace));
        }
        Ok(())
    }

    fn parse_root(&mut self) -> Result<(), ParseError> {
        let type_name = self.expect_type("a type name")?;
        if let Some(token) = self.peek() {
            if token.kind.is_symbol('#') {
                return Err(ParseError::RootHasExplicitId {
                    at: token.span.index,
                });
            }
        }
        self.parse_object_body(type_name, SmolStr::new(ROOT_ID))?;
        Ok(())
    }

    /// Object declaration after its type name token: optional `#id`,
    /// optional argument list, optional property block. Returns the
    /// declared or generated id.
    fn parse_object(&mut self, type_name: SmolStr) -> Result<SmolStr, ParseError> {
        let id = if self.match_symbol('#') {
            self.expect_id("an object id")?
        } else {
            self.generate_id(&type_name)
        };
        self.parse_object_body(type_name, id)
    }

    fn parse_object_body(
        &mut self,
        type_name: SmolStr,
        id: SmolStr,
    ) -> Result<SmolStr, ParseError> {
        let ctor_args = self.parse_ctor_args()?;
        let properties = self.parse_properties()?;

        self.ids.insert(id.clone(), true);
        // Nested declarations registered themselves while the blocks
        // above were read; the object itself goes after them.
        self.objects.push(ObjectNode {
            type_name,
            id: id.clone(),
            ctor_args,
            properties,
        });
        Ok(id)
    }

    /// Argument list, when present. An empty `()` normalizes to no
    /// list at all.
    fn parse_ctor_args(&mut self) -> Result<Option<Vec<ValueNode>>, ParseError> {
        if !self.match_symbol('(') {
            return Ok(None);
        }
        if self.match_symbol(')') {
            return Ok(None);
        }
        let mut args = Vec::new();
        loop {
            args.push(self.parse_value()?);
            if self.match_symbol(',') {
                // A comma must introduce another argument.
                if self.peek().map_or(true, |token| token.kind.is_symbol(')')) {
                    return Err(self.unexpected_here("a constructor argument"));
                }
                continue;
            }
            self.expect_symbol(')', "')' closing the argument list")?;
            break;
        }
        Ok(Some(args))
    }

    /// Property block, when present. An empty `{}` normalizes to no
    /// block at all.
    fn parse_properties(&mut self) -> Result<Option<Vec<PropertyNode>>, ParseError> {
        if !self.match_symbol('{') {
            return Ok(None);
        }
        if self.match_symbol('}') {
            return Ok(None);
        }
        let mut properties: Vec<PropertyNode> = Vec::new();
        loop {
            let (name, at) = self.expect_property()?;
            if properties.iter().any(|prop| prop.name == name) {
                return Err(ParseError::DuplicateProperty { name, at });
            }
            self.expect_symbol(':', "':' after the property name")?;
            let value = self.parse_value()?;
            properties.push(PropertyNode { name, value });

            if self.match_symbol(',') {
                // A comma must introduce another property.
                if !self.at_property() {
                    return Err(self.unexpected_here("a property name"));
                }
                continue;
            }
            self.expect_symbol('}', "'}' closing the property block")?;
            break;
        }
        Ok(Some(properties))
    }

    fn expect_property(&mut self) -> Result<(SmolStr, u32), ParseError> {
        if let Some(token) = self.peek() {
            if let TokenKind::Property(name) = &token.kind {
                let result = (name.clone(), token.span.index);
                self.pos += 1;
                return Ok(result);
            }
        }
        Err(self.unexpected_here("a property name"))
    }

    fn parse_value(&mut self) -> Result<ValueNode, ParseError> {
        let kind = match self.peek() {
            Some(token) => token.kind.clone(),
            None => return Err(self.unexpected_here("a value")),
        };
        match kind {
            TokenKind::Number(value) => {
                self.pos += 1;
                Ok(ValueNode::Number(value))
            }
            TokenKind::Str(text) => {
                self.pos += 1;
                Ok(ValueNode::Str(text))
            }
            TokenKind::Type(name) => {
                self.pos += 1;
                if self.match_symbol('[') {
                    let items = self.parse_array_items()?;
                    Ok(ValueNode::Array {
                        element_type: Some(name),
                        items,
                    })
                } else {
                    let id = self.parse_object(name.clone())?;
                    Ok(ValueNode::Reference { id, ty: Some(name) })
                }
            }
            TokenKind::Word(word) => {
                self.pos += 1;
                self.parse_word_value(word)
            }
            TokenKind::Symbol('#') => {
                self.pos += 1;
                let id = self.expect_id("an object id")?;
                Ok(ValueNode::Reference { id, ty: None })
            }
            TokenKind::Symbol('@') => {
                self.pos += 1;
                self.parse_binding()
            }
            TokenKind::Symbol('[') => {
                self.pos += 1;
                let items = self.parse_array_items()?;
                Ok(ValueNode::Array {
                    element_type: None,
                    items,
                })
            }
            _ => Err(self.unexpected_here("a value")),
        }
    }

    /// A bare word in value position is an enum member or, when it
    /// names exactly one known type, a parameterless object shorthand.
    fn parse_word_value(&mut self, word: SmolStr) -> Result<ValueNode, ParseError> {
        // A dotted word carries the enum type in front of its last
        // segment.
        if let Some(split) = word.rfind('.') {
            let ty = SmolStr::new(&word[..split]);
            let member = SmolStr::new(&word[split + 1..]);
            return Ok(ValueNode::Enum {
                ty: Some(ty),
                member,
            });
        }
        // A separated dot continues into the member word.
        if self.match_symbol('.') {
            let (member, _) = self.expect_word("an enum member")?;
            return Ok(ValueNode::Enum {
                ty: Some(word),
                member,
            });
        }
        if self.is_known_type(&word) {
            // The shorthand is the bare word alone; an id or bracket
            // after it belongs to the enclosing grammar.
            let id = self.generate_id(&word);
            self.objects.push(ObjectNode {
                type_name: word.clone(),
                id: id.clone(),
                ctor_args: None,
                properties: None,
            });
            return Ok(ValueNode::Reference {
                id,
                ty: Some(word),
            });
        }
        // Left untyped until the analyzer adopts the target
        // property's type.
        Ok(ValueNode::Enum {
            ty: None,
            member: word,
        })
    }

    fn is_known_type(&self, name: &str) -> bool {
        self.registry
            .find_types(name, &self.lookup_namespaces, self.assemblies)
            .len()
            == 1
    }

    fn parse_binding(&mut self) -> Result<ValueNode, ParseError> {
        let kind = match self.peek() {
            Some(token) => token.kind.clone(),
            None => return Err(self.unexpected_here("a binding path or '('")),
        };
        match kind {
            TokenKind::Word(word) => {
                self.pos += 1;
                // A leading segment before the first dot names the
                // source element.
                let binding = match word.find('.') {
                    Some(split) => Binding {
                        element_name: Some(SmolStr::new(&word[..split])),
                        path: SmolStr::new(&word[split + 1..]),
                        mode: BindingMode::default(),
                    },
                    None => Binding {
                        element_name: None,
                        path: word,
                        mode: BindingMode::default(),
                    },
                };
                Ok(ValueNode::Binding(binding))
            }
            TokenKind::Symbol('(') => {
                self.pos += 1;
                self.parse_binding_form()
            }
            _ => Err(self.unexpected_here("a binding path or '('")),
        }
    }

    /// Long binding form `@(Key = Value, ...)`. `ElementName`, `Path`
    /// and `Mode` are recognized, other keys are skipped. `Path` is
    /// mandatory.
    fn parse_binding_form(&mut self) -> Result<ValueNode, ParseError> {
        let mut element_name = None;
        let mut path = None;
        let mut mode = BindingMode::default();

        loop {
            let (key, _) = self.expect_word("a binding key")?;
            self.expect_symbol('=', "'=' after the binding key")?;
            let (text, at) = self.expect_word("a binding value")?;
            match key.as_str() {
                "ElementName" => element_name = Some(text),
                "Path" => path = Some(text),
                "Mode" => {
                    mode = match text.parse::<BindingMode>() {
                        Ok(mode) => mode,
                        Err(()) => {
                            return Err(ParseError::UnexpectedToken {
                                expected: "a binding mode",
                                found: Some(TokenKind::Word(text)),
                                at,
                            })
                        }
                    };
                }
                _ => {}
            }

            if self.match_symbol(',') {
                continue;
            }
            let close = self.expect_symbol(')', "')' closing the binding")?;
            return match path {
                Some(path) => Ok(ValueNode::Binding(Binding {
                    element_name,
                    path,
                    mode,
                })),
                None => Err(ParseError::UnexpectedToken {
                    expected: "a 'Path' entry in the binding",
                    found: Some(close.kind),
                    at: close.span.index,
                }),
            };
        }
    }

    /// Array items after the opening `[`.
    fn parse_array_items(&mut self) -> Result<Vec<ValueNode>, ParseError> {
        let mut items = Vec::new();
        if self.match_symbol(']') {
            return Ok(items);
        }
        loop {
            items.push(self.parse_value()?);
            if self.match_symbol(',') {
                // A comma must introduce another item.
                if self.peek().map_or(true, |token| token.kind.is_symbol(']')) {
                    return Err(self.unexpected_here("an array item"));
                }
                continue;
            }
            self.expect_symbol(']', "']' closing the array")?;
            break;
        }
        Ok(items)
    }

    /// Generate a lower-camel `typeName` + counter id for an
    /// anonymous object. The id is reserved immediately so nested
    /// declarations cannot take it too.
    fn generate_id(&mut self, type_name: &str) -> SmolStr {
        let stem = lower_camel(type_name);
        let mut counter = 1u32;
        loop {
            let candidate = SmolStr::new(format!("{}{}", stem, counter));
            if !self.ids.contains_key(&candidate) {
                self.ids.insert(candidate.clone(), true);
                return candidate;
            }
            counter += 1;
        }
    }

    /// Every referenced id must have been declared by some object.
    fn check_ids(&self) -> Result<(), ParseError> {
        for (id, declared) in &self.ids {
            if !declared {
                return Err(ParseError::UndeclaredReference { id: id.clone() });
            }
        }
        Ok(())
    }
}
