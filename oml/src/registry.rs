//! Type registry.
//!
//! The analyzer resolves every type, constructor, property and enum
//! member against a [`TypeRegistry`]. The trait keeps the compiler
//! independent of where type metadata comes from; [`StaticRegistry`]
//! is the bundled implementation, a registration table loaded from a
//! YAML definition file.
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::Path,
};

use serde::Deserialize;
use smol_str::SmolStr;

/// Namespace and assembly name sets used to scope type searches.
pub type NameSet = BTreeSet<SmolStr>;

/// Well-known type names every registry must provide. Literal typing
/// depends on them: numbers are `Double`, strings are `String`, and
/// untyped array elements fall back to `Object`.
const OBJECT: &str = "Object";
const STRING: &str = "String";
const DOUBLE: &str = "Double";

/// Handle to a type inside a registry.
///
/// Handles are only meaningful to the registry that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(u32);

impl TypeId {
    #[inline]
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a type behaves as the target of an array literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionShape {
    NotCollection,
    /// Dictionary-like; the payload is the value type.
    Keyed(TypeId),
    /// List-like with a fixed element type.
    Single(TypeId),
    /// Collection of untyped elements.
    Untyped,
}

pub trait TypeRegistry {
    /// All types with the given simple name inside the allowed
    /// namespaces and assemblies.
    fn find_types(&self, name: &str, namespaces: &NameSet, assemblies: &NameSet) -> Vec<TypeId>;

    /// Every namespace that has at least one type in the allowed
    /// assemblies.
    fn type_namespaces(&self, assemblies: &NameSet) -> NameSet;

    /// Simple name of a type.
    fn type_name(&self, ty: TypeId) -> SmolStr;

    /// Constructor signatures as parameter type vectors. An empty
    /// inner vector is a parameterless constructor.
    fn constructors(&self, ty: TypeId) -> Vec<Vec<TypeId>>;

    /// Settable properties by name, including inherited ones.
    fn properties(&self, ty: TypeId) -> BTreeMap<SmolStr, TypeId>;

    /// Defined member names when the type is an enum, empty otherwise.
    fn enum_members(&self, ty: TypeId) -> BTreeSet<SmolStr>;

    fn collection_shape(&self, ty: TypeId) -> CollectionShape;

    /// Whether a value of type `from` can be assigned to `to`.
    fn is_assignable(&self, from: TypeId, to: TypeId) -> bool;

    fn object_type(&self) -> TypeId;
    fn string_type(&self) -> TypeId;
    fn double_type(&self) -> TypeId;
}

// ----------------------------------------------------------------------------

/// One type definition as it appears in the YAML registry file.
///
/// Type references (`base`, constructor parameters, property types,
/// collection elements) are simple names resolved against the whole
/// definition list.
#[derive(Debug, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub namespace: String,
    pub assembly: String,
    #[serde(default)]
    pub base: Option<String>,
    /// `None` means a single parameterless constructor. An explicit
    /// empty list means the type cannot be constructed.
    #[serde(default)]
    pub constructors: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub properties: Option<BTreeMap<String, String>>,
    /// Enum member names. A type with members is an enum and has no
    /// constructors.
    #[serde(default, rename = "enum")]
    pub enum_members: Option<Vec<String>>,
    #[serde(default)]
    pub collection: Option<CollectionDef>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionDef {
    #[serde(default)]
    pub list: Option<String>,
    #[serde(default)]
    pub keyed: Option<String>,
    #[serde(default)]
    pub untyped: Option<bool>,
}

#[derive(Debug)]
struct TypeEntry {
    name: SmolStr,
    namespace: SmolStr,
    assembly: SmolStr,
    base: Option<TypeId>,
    constructors: Vec<Vec<TypeId>>,
    properties: BTreeMap<SmolStr, TypeId>,
    enum_members: BTreeSet<SmolStr>,
    shape: CollectionShape,
}

/// Immutable type table with a simple-name index.
#[derive(Debug)]
pub struct StaticRegistry {
    types: Vec<TypeEntry>,
    by_name: BTreeMap<SmolStr, Vec<TypeId>>,
    object_id: TypeId,
    string_id: TypeId,
    double_id: TypeId,
}

impl StaticRegistry {
    pub fn from_file(filepath: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let file = std::fs::File::open(filepath.as_ref())?;
        let defs: Vec<TypeDef> = serde_yaml::from_reader(file)?;
        Self::from_defs(defs)
    }

    pub fn from_yaml(text: &str) -> Result<Self, RegistryError> {
        let defs: Vec<TypeDef> = serde_yaml::from_str(text)?;
        Self::from_defs(defs)
    }

    pub fn from_defs(defs: Vec<TypeDef>) -> Result<Self, RegistryError> {
        // First pass hands out handles so definitions can reference
        // each other in any order.
        let mut by_name: BTreeMap<SmolStr, Vec<TypeId>> = BTreeMap::new();
        for (index, def) in defs.iter().enumerate() {
            let id = TypeId::new(index as u32);
            let slot = by_name.entry(SmolStr::new(&def.name)).or_default();
            for other in slot.iter() {
                let existing = &defs[other.index()];
                if existing.namespace == def.namespace && existing.assembly == def.assembly {
                    return Err(RegistryError::DuplicateType {
                        name: SmolStr::new(&def.name),
                        namespace: SmolStr::new(&def.namespace),
                    });
                }
            }
            slot.push(id);
        }

        // Second pass resolves all name references into handles.
        let mut types = Vec::with_capacity(defs.len());
        for def in &defs {
            types.push(Self::build_entry(def, &by_name)?);
        }

        // Base chains must terminate, property and assignability
        // lookups walk them.
        for entry in &types {
            let mut hops = 0;
            let mut current = entry.base;
            while let Some(base) = current {
                hops += 1;
                if hops > types.len() {
                    return Err(RegistryError::BaseCycle {
                        type_name: entry.name.clone(),
                    });
                }
                current = types[base.index()].base;
            }
        }

        let object_id = well_known(&by_name, OBJECT)?;
        let string_id = well_known(&by_name, STRING)?;
        let double_id = well_known(&by_name, DOUBLE)?;

        log::debug!("loaded {} type definitions", types.len());

        Ok(Self {
            types,
            by_name,
            object_id,
            string_id,
            double_id,
        })
    }

    fn build_entry(
        def: &TypeDef,
        by_name: &BTreeMap<SmolStr, Vec<TypeId>>,
    ) -> Result<TypeEntry, RegistryError> {
        let base = match &def.base {
            Some(name) => Some(resolve_name(by_name, name, &def.name)?),
            None => None,
        };

        let constructors = if def.enum_members.is_some() {
            Vec::new()
        } else {
            match &def.constructors {
                None => vec![Vec::new()],
                Some(signatures) => {
                    let mut resolved = Vec::with_capacity(signatures.len());
                    for params in signatures {
                        let mut signature = Vec::with_capacity(params.len());
                        for param in params {
                            signature.push(resolve_name(by_name, param, &def.name)?);
                        }
                        resolved.push(signature);
                    }
                    resolved
                }
            }
        };

        let mut properties = BTreeMap::new();
        if let Some(props) = &def.properties {
            for (prop, type_name) in props {
                properties.insert(
                    SmolStr::new(prop),
                    resolve_name(by_name, type_name, &def.name)?,
                );
            }
        }

        let enum_members = def
            .enum_members
            .iter()
            .flatten()
            .map(SmolStr::new)
            .collect();

        let shape = match &def.collection {
            None => CollectionShape::NotCollection,
            Some(collection) => match (&collection.list, &collection.keyed, collection.untyped) {
                (Some(element), None, None) => {
                    CollectionShape::Single(resolve_name(by_name, element, &def.name)?)
                }
                (None, Some(value), None) => {
                    CollectionShape::Keyed(resolve_name(by_name, value, &def.name)?)
                }
                (None, None, Some(true)) => CollectionShape::Untyped,
                _ => {
                    return Err(RegistryError::InvalidCollection {
                        type_name: SmolStr::new(&def.name),
                    })
                }
            },
        };

        Ok(TypeEntry {
            name: SmolStr::new(&def.name),
            namespace: SmolStr::new(&def.namespace),
            assembly: SmolStr::new(&def.assembly),
            base,
            constructors,
            properties,
            enum_members,
            shape,
        })
    }

    /// Entries are indexed directly; handles must come from this
    /// registry.
    #[inline]
    fn entry(&self, ty: TypeId) -> &TypeEntry {
        &self.types[ty.index()]
    }
}

fn resolve_name(
    by_name: &BTreeMap<SmolStr, Vec<TypeId>>,
    referenced: &str,
    by: &str,
) -> Result<TypeId, RegistryError> {
    match by_name.get(referenced).map(Vec::as_slice) {
        Some([id]) => Ok(*id),
        Some([]) | None => Err(RegistryError::UnknownTypeName {
            referenced: SmolStr::new(referenced),
            by: SmolStr::new(by),
        }),
        Some(_) => Err(RegistryError::AmbiguousTypeName {
            referenced: SmolStr::new(referenced),
            by: SmolStr::new(by),
        }),
    }
}

fn well_known(
    by_name: &BTreeMap<SmolStr, Vec<TypeId>>,
    name: &'static str,
) -> Result<TypeId, RegistryError> {
    match by_name.get(name).map(Vec::as_slice) {
        Some([id]) => Ok(*id),
        Some([]) | None => Err(RegistryError::MissingPrimitive(name)),
        Some(_) => Err(RegistryError::AmbiguousTypeName {
            referenced: SmolStr::new(name),
            by: SmolStr::new("well-known types"),
        }),
    }
}

impl TypeRegistry for StaticRegistry {
    fn find_types(&self, name: &str, namespaces: &NameSet, assemblies: &NameSet) -> Vec<TypeId> {
        match self.by_name.get(name) {
            Some(ids) => ids
                .iter()
                .copied()
                .filter(|id| {
                    let entry = self.entry(*id);
                    namespaces.contains(&entry.namespace) && assemblies.contains(&entry.assembly)
                })
                .collect(),
            None => Vec::new(),
        }
    }

    fn type_namespaces(&self, assemblies: &NameSet) -> NameSet {
        self.types
            .iter()
            .filter(|entry| assemblies.contains(&entry.assembly))
            .map(|entry| entry.namespace.clone())
            .collect()
    }

    fn type_name(&self, ty: TypeId) -> SmolStr {
        self.entry(ty).name.clone()
    }

    fn constructors(&self, ty: TypeId) -> Vec<Vec<TypeId>> {
        self.entry(ty).constructors.clone()
    }

    fn properties(&self, ty: TypeId) -> BTreeMap<SmolStr, TypeId> {
        // Inherited properties are visible on the derived type; on a
        // name collision the derived declaration wins.
        let mut all = BTreeMap::new();
        let mut current = Some(ty);
        while let Some(id) = current {
            let entry = self.entry(id);
            for (name, prop_ty) in &entry.properties {
                all.entry(name.clone()).or_insert(*prop_ty);
            }
            current = entry.base;
        }
        all
    }

    fn enum_members(&self, ty: TypeId) -> BTreeSet<SmolStr> {
        self.entry(ty).enum_members.clone()
    }

    fn collection_shape(&self, ty: TypeId) -> CollectionShape {
        self.entry(ty).shape
    }

    fn is_assignable(&self, from: TypeId, to: TypeId) -> bool {
        if from == to || to == self.object_id {
            return true;
        }
        let mut current = self.entry(from).base;
        while let Some(base) = current {
            if base == to {
                return true;
            }
            current = self.entry(base).base;
        }
        false
    }

    fn object_type(&self) -> TypeId {
        self.object_id
    }

    fn string_type(&self) -> TypeId {
        self.string_id
    }

    fn double_type(&self) -> TypeId {
        self.double_id
    }
}

/// Failure while building a [`StaticRegistry`].
#[derive(Debug)]
pub enum RegistryError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    DuplicateType { name: SmolStr, namespace: SmolStr },
    UnknownTypeName { referenced: SmolStr, by: SmolStr },
    AmbiguousTypeName { referenced: SmolStr, by: SmolStr },
    InvalidCollection { type_name: SmolStr },
    BaseCycle { type_name: SmolStr },
    MissingPrimitive(&'static str),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{}", err),
            Self::Yaml(err) => write!(f, "{}", err),
            Self::DuplicateType { name, namespace } => {
                write!(f, "type '{}' defined twice in namespace '{}'", name, namespace)
            }
            Self::UnknownTypeName { referenced, by } => {
                write!(f, "definition of '{}' references unknown type '{}'", by, referenced)
            }
            Self::AmbiguousTypeName { referenced, by } => write!(
                f,
                "definition of '{}' references '{}', which names more than one type",
                by, referenced
            ),
            Self::InvalidCollection { type_name } => write!(
                f,
                "collection shape of '{}' must be exactly one of list, keyed or untyped",
                type_name
            ),
            Self::BaseCycle { type_name } => {
                write!(f, "base chain of type '{}' forms a cycle", type_name)
            }
            Self::MissingPrimitive(name) => {
                write!(f, "registry must define the well-known type '{}'", name)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io(err)
    }
}

impl From<serde_yaml::Error> for RegistryError {
    fn from(err: serde_yaml::Error) -> Self {
        RegistryError::Yaml(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DEFS: &str = r#"
- name: Object
  namespace: System
  assembly: mscorlib
- name: String
  namespace: System
  assembly: mscorlib
  constructors: []
- name: Double
  namespace: System
  assembly: mscorlib
  constructors: []
- name: Uri
  namespace: System
  assembly: System
  constructors:
    - [String]
- name: Visibility
  namespace: System.Windows
  assembly: PresentationFramework
  enum: [Visible, Hidden, Collapsed]
- name: UIElement
  namespace: System.Windows
  assembly: PresentationFramework
- name: TextBox
  namespace: System.Windows.Controls
  assembly: PresentationFramework
  base: UIElement
  properties:
    Text: String
- name: UIElementCollection
  namespace: System.Windows.Controls
  assembly: PresentationFramework
  collection:
    list: UIElement
- name: ResourceDictionary
  namespace: System.Windows
  assembly: PresentationFramework
  collection:
    keyed: Object
- name: ArrayList
  namespace: System.Collections
  assembly: mscorlib
  collection:
    untyped: true
"#;

    fn names(values: &[&str]) -> NameSet {
        values.iter().map(|s| SmolStr::new(s)).collect()
    }

    fn registry() -> StaticRegistry {
        StaticRegistry::from_yaml(DEFS).expect("registry failed to load")
    }

    #[test]
    fn test_find_types_scoped_by_namespace_and_assembly() {
        let reg = registry();
        let assemblies = names(&["mscorlib", "System", "PresentationFramework"]);

        let hits = reg.find_types("TextBox", &names(&["System.Windows.Controls"]), &assemblies);
        assert_eq!(hits.len(), 1);
        assert_eq!(reg.type_name(hits[0]), "TextBox");

        // Wrong namespace filters the type out.
        assert!(reg
            .find_types("TextBox", &names(&["System.Windows"]), &assemblies)
            .is_empty());
        // Wrong assembly filters the type out.
        assert!(reg
            .find_types(
                "TextBox",
                &names(&["System.Windows.Controls"]),
                &names(&["mscorlib"])
            )
            .is_empty());
    }

    #[test]
    fn test_type_namespaces() {
        let reg = registry();
        let namespaces = reg.type_namespaces(&names(&["PresentationFramework"]));

        assert!(namespaces.contains("System.Windows"));
        assert!(namespaces.contains("System.Windows.Controls"));
        assert!(!namespaces.contains("System"));
    }

    #[test]
    fn test_assignability_walks_base_chain() {
        let reg = registry();
        let assemblies = names(&["mscorlib", "System", "PresentationFramework"]);
        let all = reg.type_namespaces(&assemblies);

        let textbox = reg.find_types("TextBox", &all, &assemblies)[0];
        let uielement = reg.find_types("UIElement", &all, &assemblies)[0];

        assert!(reg.is_assignable(textbox, uielement));
        assert!(!reg.is_assignable(uielement, textbox));
        assert!(reg.is_assignable(textbox, reg.object_type()));
        assert!(reg.is_assignable(reg.double_type(), reg.object_type()));
    }

    #[test]
    fn test_constructors_and_shapes() {
        let reg = registry();
        let assemblies = names(&["mscorlib", "System", "PresentationFramework"]);
        let all = reg.type_namespaces(&assemblies);

        let uri = reg.find_types("Uri", &all, &assemblies)[0];
        assert_eq!(reg.constructors(uri), vec![vec![reg.string_type()]]);

        // Omitted constructors mean parameterless.
        let textbox = reg.find_types("TextBox", &all, &assemblies)[0];
        assert_eq!(reg.constructors(textbox), vec![Vec::new()]);

        let list = reg.find_types("UIElementCollection", &all, &assemblies)[0];
        let uielement = reg.find_types("UIElement", &all, &assemblies)[0];
        assert_eq!(reg.collection_shape(list), CollectionShape::Single(uielement));

        let dict = reg.find_types("ResourceDictionary", &all, &assemblies)[0];
        assert_eq!(
            reg.collection_shape(dict),
            CollectionShape::Keyed(reg.object_type())
        );

        let array_list = reg.find_types("ArrayList", &all, &assemblies)[0];
        assert_eq!(reg.collection_shape(array_list), CollectionShape::Untyped);
        assert_eq!(
            reg.collection_shape(textbox),
            CollectionShape::NotCollection
        );
    }

    #[test]
    fn test_properties_include_inherited() {
        let defs = r#"
- name: Object
  namespace: System
  assembly: mscorlib
- name: String
  namespace: System
  assembly: mscorlib
- name: Double
  namespace: System
  assembly: mscorlib
- name: Control
  namespace: System.Windows
  assembly: PresentationFramework
  properties:
    Width: Double
    Tag: Object
- name: TextBox
  namespace: System.Windows
  assembly: PresentationFramework
  base: Control
  properties:
    Text: String
    Tag: String
"#;
        let reg = StaticRegistry::from_yaml(defs).unwrap();
        let assemblies = names(&["mscorlib", "PresentationFramework"]);
        let all = reg.type_namespaces(&assemblies);
        let textbox = reg.find_types("TextBox", &all, &assemblies)[0];

        let props = reg.properties(textbox);
        assert_eq!(props.get("Width"), Some(&reg.double_type()));
        assert_eq!(props.get("Text"), Some(&reg.string_type()));
        // The derived declaration shadows the inherited one.
        assert_eq!(props.get("Tag"), Some(&reg.string_type()));
    }

    #[test]
    fn test_enum_members() {
        let reg = registry();
        let assemblies = names(&["PresentationFramework"]);
        let all = reg.type_namespaces(&assemblies);

        let visibility = reg.find_types("Visibility", &all, &assemblies)[0];
        let members = reg.enum_members(visibility);
        assert!(members.contains("Hidden"));
        assert!(!members.contains("hidden"));
        assert!(reg.constructors(visibility).is_empty());
    }

    #[test]
    fn test_unknown_reference_fails_load() {
        let defs = r#"
- name: Object
  namespace: System
  assembly: mscorlib
- name: String
  namespace: System
  assembly: mscorlib
- name: Double
  namespace: System
  assembly: mscorlib
- name: Window
  namespace: System.Windows
  assembly: PresentationFramework
  base: Missing
"#;
        match StaticRegistry::from_yaml(defs) {
            Err(RegistryError::UnknownTypeName { referenced, by }) => {
                assert_eq!(referenced, "Missing");
                assert_eq!(by, "Window");
            }
            other => panic!("expected unknown type name error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_duplicate_type_fails_load() {
        let defs = r#"
- name: Object
  namespace: System
  assembly: mscorlib
- name: Object
  namespace: System
  assembly: mscorlib
"#;
        assert!(matches!(
            StaticRegistry::from_yaml(defs),
            Err(RegistryError::DuplicateType { .. })
        ));
    }

    #[test]
    fn test_invalid_collection_fails_load() {
        let defs = r#"
- name: Object
  namespace: System
  assembly: mscorlib
- name: String
  namespace: System
  assembly: mscorlib
- name: Double
  namespace: System
  assembly: mscorlib
- name: Broken
  namespace: System
  assembly: mscorlib
  collection:
    list: Object
    keyed: Object
"#;
        assert!(matches!(
            StaticRegistry::from_yaml(defs),
            Err(RegistryError::InvalidCollection { .. })
        ));
    }

    #[test]
    fn test_base_cycle_fails_load() {
        let defs = r#"
- name: Object
  namespace: System
  assembly: mscorlib
- name: String
  namespace: System
  assembly: mscorlib
- name: Double
  namespace: System
  assembly: mscorlib
- name: Ping
  namespace: App
  assembly: App
  base: Pong
- name: Pong
  namespace: App
  assembly: App
  base: Ping
"#;
        assert!(matches!(
            StaticRegistry::from_yaml(defs),
            Err(RegistryError::BaseCycle { .. })
        ));
    }

    #[test]
    fn test_missing_primitive_fails_load() {
        let defs = r#"
- name: Object
  namespace: System
  assembly: mscorlib
"#;
        assert!(matches!(
            StaticRegistry::from_yaml(defs),
            Err(RegistryError::MissingPrimitive("String"))
        ));
    }
}
