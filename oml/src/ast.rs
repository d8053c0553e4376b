//! Syntax tree for object markup documents.
use std::{collections::BTreeSet, fmt, str::FromStr};

use smol_str::SmolStr;

/// Reserved id carried by the document's root object.
pub const ROOT_ID: &str = "this";

/// Stem for generated object ids: the type name with its first letter
/// lowercased. Callers append a numeric suffix to make it unique.
pub fn lower_camel(type_name: &str) -> String {
    let mut stem = String::with_capacity(type_name.len());
    let mut chars = type_name.chars();
    if let Some(first) = chars.next() {
        stem.extend(first.to_lowercase());
        stem.push_str(chars.as_str());
    }
    stem
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyntaxTree {
    /// Namespaces the document's type names resolve in. After
    /// analysis this also holds the caller-supplied defaults.
    pub namespaces: BTreeSet<SmolStr>,
    /// Flat list of declared objects. After analysis the order is
    /// such that constructor dependencies precede their dependents.
    pub objects: Vec<ObjectNode>,
}

impl SyntaxTree {
    pub fn root(&self) -> Option<&ObjectNode> {
        self.objects.iter().find(|obj| obj.is_root())
    }

    pub fn object(&self, id: &str) -> Option<&ObjectNode> {
        self.objects.iter().find(|obj| obj.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.objects.iter().position(|obj| obj.id == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    /// Simple type name as written in the source.
    pub type_name: SmolStr,
    pub id: SmolStr,
    /// `None` when the declaration carries no argument list, or an
    /// empty `()`.
    pub ctor_args: Option<Vec<ValueNode>>,
    /// `None` when the declaration carries no property block, or an
    /// empty `{}`.
    pub properties: Option<Vec<PropertyNode>>,
}

impl ObjectNode {
    #[inline]
    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyNode {
    pub name: SmolStr,
    pub value: ValueNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    Number(f64),
    Str(String),
    /// Enum member. The type is `None` until either the source names
    /// it (`WindowState.Maximized`) or the analyzer adopts the target
    /// property's declared type.
    Enum {
        ty: Option<SmolStr>,
        member: SmolStr,
    },
    /// Reference to another declared object. The type is a hint
    /// recorded for inline declarations; bare `#id` references leave
    /// it `None` and resolve through the object list.
    Reference {
        id: SmolStr,
        ty: Option<SmolStr>,
    },
    Binding(Binding),
    /// Array literal as written. The analyzer rewrites it into a
    /// [`ValueNode::Collection`] when the target property has a
    /// collection shape.
    Array {
        element_type: Option<SmolStr>,
        items: Vec<ValueNode>,
    },
    /// Collection initialization. Only the analyzer produces this.
    Collection {
        container_type: SmolStr,
        element_type: SmolStr,
        items: Vec<ValueNode>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub element_name: Option<SmolStr>,
    pub path: SmolStr,
    pub mode: BindingMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    Default,
    OneWay,
    TwoWay,
    OneTime,
    OneWayToSource,
}

impl Default for BindingMode {
    fn default() -> Self {
        BindingMode::Default
    }
}

impl FromStr for BindingMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Default" => Ok(Self::Default),
            "OneWay" => Ok(Self::OneWay),
            "TwoWay" => Ok(Self::TwoWay),
            "OneTime" => Ok(Self::OneTime),
            "OneWayToSource" => Ok(Self::OneWayToSource),
            _ => Err(()),
        }
    }
}

impl fmt::Display for BindingMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Default => write!(f, "Default"),
            Self::OneWay => write!(f, "OneWay"),
            Self::TwoWay => write!(f, "TwoWay"),
            Self::OneTime => write!(f, "OneTime"),
            Self::OneWayToSource => write!(f, "OneWayToSource"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_binding_mode_parse() {
        assert_eq!("TwoWay".parse(), Ok(BindingMode::TwoWay));
        assert_eq!("OneWayToSource".parse(), Ok(BindingMode::OneWayToSource));
        assert_eq!("twoway".parse::<BindingMode>(), Err(()));
        assert_eq!(BindingMode::default(), BindingMode::Default);
    }

    #[test]
    fn test_lower_camel() {
        assert_eq!(lower_camel("BitmapImage"), "bitmapImage");
        assert_eq!(lower_camel("Uri"), "uri");
        assert_eq!(lower_camel("window"), "window");
    }

    #[test]
    fn test_root_lookup() {
        let tree = SyntaxTree {
            namespaces: BTreeSet::new(),
            objects: vec![
                ObjectNode {
                    type_name: "TextBox".into(),
                    id: "tb".into(),
                    ctor_args: None,
                    properties: None,
                },
                ObjectNode {
                    type_name: "Window".into(),
                    id: ROOT_ID.into(),
                    ctor_args: None,
                    properties: None,
                },
            ],
        };

        assert!(!tree.objects[0].is_root());
        assert_eq!(tree.root().map(|obj| obj.type_name.as_str()), Some("Window"));
        assert_eq!(tree.index_of("tb"), Some(0));
        assert_eq!(tree.index_of("nope"), None);
    }
}
