//! Semantic analysis
//!
//! The analyzer checks a parsed tree against a type registry and
//! rewrites it into the shape code generation expects: string
//! arguments wrapped in synthetic objects where a constructor wants a
//! string-constructible type, enum members annotated with their
//! types, array literals turned into collection initializations, and
//! objects reordered so constructor dependencies come first.
use std::collections::{BTreeMap, BTreeSet};

use smol_str::SmolStr;

use crate::{
    ast::{lower_camel, ObjectNode, PropertyNode, SyntaxTree, ValueNode},
    error::AnalysisError,
    registry::{CollectionShape, NameSet, TypeId, TypeRegistry},
};

/// Check and finalize a parsed tree.
///
/// On success every object resolves to exactly one type with a
/// matching constructor, every property value fits its declared
/// type, and the object list is ordered for instantiation. On error
/// the tree may be partially rewritten and should be discarded.
pub fn analyze<R: TypeRegistry>(
    tree: &mut SyntaxTree,
    registry: &R,
    assemblies: &NameSet,
    namespaces: &NameSet,
) -> Result<(), AnalysisError> {
    Analyzer::new(registry, assemblies, namespaces).run(tree)
}

struct Analyzer<'a, R> {
    registry: &'a R,
    assemblies: &'a NameSet,
    default_namespaces: &'a NameSet,
    /// Declared plus default namespaces, fixed once validated.
    namespaces: NameSet,
    /// Memo of object id to resolved type. Synthetic objects are
    /// seeded here so checking them never repeats a name lookup.
    resolved: BTreeMap<SmolStr, TypeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl<'a, R: TypeRegistry> Analyzer<'a, R> {
    fn new(registry: &'a R, assemblies: &'a NameSet, namespaces: &'a NameSet) -> Self {
        Self {
            registry,
            assemblies,
            default_namespaces: namespaces,
            namespaces: NameSet::new(),
            resolved: BTreeMap::new(),
        }
    }

    fn run(&mut self, tree: &mut SyntaxTree) -> Result<(), AnalysisError> {
        self.check_namespaces(tree)?;
        self.check_sanity(tree)?;

        // Constructor checks may append wrapper objects; they are
        // validated by the same scan.
        let mut index = 0;
        while index < tree.objects.len() {
            self.check_object(tree, index)?;
            index += 1;
        }

        self.sort_objects(tree)
    }

    /// Validate the union of declared and default namespaces against
    /// the registry and write it back to the tree.
    fn check_namespaces(&mut self, tree: &mut SyntaxTree) -> Result<(), AnalysisError> {
        let mut union: NameSet = tree.namespaces.clone();
        union.extend(self.default_namespaces.iter().cloned());

        let known = self.registry.type_namespaces(self.assemblies);
        for namespace in &union {
            if !known.contains(namespace) {
                return Err(AnalysisError::UnknownNamespace(namespace.clone()));
            }
        }

        tree.namespaces = union.clone();
        self.namespaces = union;
        Ok(())
    }

    fn check_sanity(&self, tree: &SyntaxTree) -> Result<(), AnalysisError> {
        if tree.objects.is_empty() {
            return Err(AnalysisError::NoObjects);
        }
        let roots = tree.objects.iter().filter(|obj| obj.is_root()).count();
        if roots != 1 {
            return Err(AnalysisError::RootCountMismatch { found: roots });
        }
        let mut seen = BTreeSet::new();
        for obj in &tree.objects {
            if !seen.insert(obj.id.as_str()) {
                return Err(AnalysisError::DuplicateId(obj.id.clone()));
            }
        }
        Ok(())
    }

    fn check_object(&mut self, tree: &mut SyntaxTree, index: usize) -> Result<(), AnalysisError> {
        let ty = self.resolve_object(tree, index)?;
        self.check_ctor(tree, index, ty)?;
        self.check_properties(tree, index, ty)
    }

    fn resolve_object(&mut self, tree: &SyntaxTree, index: usize) -> Result<TypeId, AnalysisError> {
        let obj = &tree.objects[index];
        if let Some(&ty) = self.resolved.get(&obj.id) {
            return Ok(ty);
        }
        let ty = self.resolve_type_name(&obj.type_name)?;
        self.resolved.insert(obj.id.clone(), ty);
        Ok(ty)
    }

    /// A simple name must match exactly one type in the allowed
    /// namespaces and assemblies.
    fn resolve_type_name(&self, name: &str) -> Result<TypeId, AnalysisError> {
        let hits = self
            .registry
            .find_types(name, &self.namespaces, self.assemblies);
        match hits.as_slice() {
            [ty] => Ok(*ty),
            [] => Err(AnalysisError::TypeNotFound(SmolStr::new(name))),
            _ => Err(AnalysisError::AmbiguousType(SmolStr::new(name))),
        }
    }

    /// Match the object's arguments against the type's constructors.
    ///
    /// An exact signature wins. Failing that, a candidate of the
    /// right arity may take a string argument where it wants a
    /// string-constructible type; the argument is then rewritten into
    /// a reference to a synthetic wrapper object. Wrappers only join
    /// the tree once a whole signature is satisfied, a partially
    /// matched candidate leaves nothing behind.
    fn check_ctor(
        &mut self,
        tree: &mut SyntaxTree,
        index: usize,
        ty: TypeId,
    ) -> Result<(), AnalysisError> {
        let ctors = self.registry.constructors(ty);

        let args: Vec<ValueNode> = match &tree.objects[index].ctor_args {
            Some(args) if !args.is_empty() => args.clone(),
            _ => {
                if ctors.iter().any(|params| params.is_empty()) {
                    return Ok(());
                }
                return Err(AnalysisError::ConstructorNotFound {
                    type_name: self.registry.type_name(ty),
                    arity: 0,
                });
            }
        };

        let mut arg_types = Vec::with_capacity(args.len());
        for arg in &args {
            arg_types.push(self.value_type(tree, arg)?);
        }

        if ctors
            .iter()
            .any(|params| signature_matches(params, &arg_types))
        {
            return Ok(());
        }

        let string = self.registry.string_type();
        for params in &ctors {
            if params.len() != arg_types.len() {
                continue;
            }
            let mut trial = arg_types.clone();
            let mut wrapped = Vec::new();
            let mut viable = true;
            for (slot, &param) in params.iter().enumerate() {
                if trial[slot] == Some(param) {
                    continue;
                }
                if trial[slot] == Some(string) && self.string_constructible(param) {
                    trial[slot] = Some(param);
                    wrapped.push(slot);
                } else {
                    viable = false;
                    break;
                }
            }
            if !viable {
                continue;
            }

            let mut new_args = args.clone();
            for &slot in &wrapped {
                let param = params[slot];
                let wrapper = self.registry.type_name(param);
                let id = self.generate_id(tree, &wrapper);
                log::debug!(
                    "wrapping argument {} of '{}' in '{}' as '{}'",
                    slot,
                    tree.objects[index].id,
                    wrapper,
                    id
                );
                tree.objects.push(ObjectNode {
                    type_name: wrapper.clone(),
                    id: id.clone(),
                    ctor_args: Some(vec![new_args[slot].clone()]),
                    properties: None,
                });
                self.resolved.insert(id.clone(), param);
                new_args[slot] = ValueNode::Reference {
                    id,
                    ty: Some(wrapper),
                };
            }
            tree.objects[index].ctor_args = Some(new_args);
            return Ok(());
        }

        Err(AnalysisError::ConstructorNotFound {
            type_name: self.registry.type_name(ty),
            arity: args.len(),
        })
    }

    /// A type the analyzer may wrap a string literal in: one with a
    /// constructor taking exactly one string.
    fn string_constructible(&self, ty: TypeId) -> bool {
        let string = self.registry.string_type();
        self.registry
            .constructors(ty)
            .iter()
            .any(|params| params.len() == 1 && params[0] == string)
    }

    /// Static type of a constructor argument, when one can be named.
    /// Bindings, arrays and untyped enum members have none.
    fn value_type(
        &mut self,
        tree: &SyntaxTree,
        value: &ValueNode,
    ) -> Result<Option<TypeId>, AnalysisError> {
        match value {
            ValueNode::Number(_) => Ok(Some(self.registry.double_type())),
            ValueNode::Str(_) => Ok(Some(self.registry.string_type())),
            ValueNode::Reference { id, ty } => {
                self.resolve_reference(tree, id, ty.as_deref()).map(Some)
            }
            ValueNode::Enum { ty: Some(name), .. } => self.resolve_type_name(name).map(Some),
            _ => Ok(None),
        }
    }

    fn resolve_reference(
        &mut self,
        tree: &SyntaxTree,
        id: &SmolStr,
        hint: Option<&str>,
    ) -> Result<TypeId, AnalysisError> {
        if let Some(&ty) = self.resolved.get(id) {
            return Ok(ty);
        }
        if let Some(index) = tree.index_of(id) {
            return self.resolve_object(tree, index);
        }
        match hint {
            Some(name) => self.resolve_type_name(name),
            None => Err(AnalysisError::TypeNotFound(id.clone())),
        }
    }

    fn check_properties(
        &mut self,
        tree: &mut SyntaxTree,
        index: usize,
        ty: TypeId,
    ) -> Result<(), AnalysisError> {
        let mut props = match tree.objects[index].properties.take() {
            Some(props) => props,
            None => return Ok(()),
        };
        let type_name = self.registry.type_name(ty);
        let declared = self.registry.properties(ty);

        let result = self.check_property_list(tree, &mut props, &type_name, &declared);
        tree.objects[index].properties = Some(props);
        result
    }

    fn check_property_list(
        &mut self,
        tree: &SyntaxTree,
        props: &mut [PropertyNode],
        type_name: &SmolStr,
        declared: &BTreeMap<SmolStr, TypeId>,
    ) -> Result<(), AnalysisError> {
        let mut seen = BTreeSet::new();
        for prop in props.iter() {
            if !seen.insert(prop.name.clone()) {
                return Err(AnalysisError::DuplicateProperty {
                    type_name: type_name.clone(),
                    name: prop.name.clone(),
                });
            }
        }

        for prop in props.iter_mut() {
            let target = match declared.get(&prop.name) {
                Some(&target) => target,
                None => {
                    return Err(AnalysisError::PropertyNotFound {
                        type_name: type_name.clone(),
                        name: prop.name.clone(),
                    })
                }
            };
            self.check_value(tree, &prop.name, target, &mut prop.value)?;
        }
        Ok(())
    }

    /// Type-check one property value against the declared property
    /// type, rewriting enum and array nodes along the way. Bindings
    /// carry no static type and always pass.
    fn check_value(
        &mut self,
        tree: &SyntaxTree,
        property: &SmolStr,
        target: TypeId,
        value: &mut ValueNode,
    ) -> Result<(), AnalysisError> {
        match value {
            ValueNode::Number(_) => {
                self.require_assignable(self.registry.double_type(), target, property)
            }
            ValueNode::Str(_) => {
                self.require_assignable(self.registry.string_type(), target, property)
            }
            ValueNode::Reference { id, ty } => {
                let from = self.resolve_reference(tree, id, ty.as_deref())?;
                self.require_assignable(from, target, property)
            }
            ValueNode::Enum { ty, member } => {
                let enum_ty = match ty {
                    Some(name) => {
                        let resolved = self.resolve_type_name(name)?;
                        // An explicitly typed member must name the
                        // property's own enum type.
                        if resolved != target {
                            return Err(AnalysisError::ValueTypeMismatch {
                                property: property.clone(),
                                expected: self.registry.type_name(target),
                            });
                        }
                        resolved
                    }
                    None => target,
                };
                let members = self.registry.enum_members(enum_ty);
                if !members.contains(member.as_str()) {
                    return Err(AnalysisError::InvalidEnumMember {
                        type_name: self.registry.type_name(enum_ty),
                        member: member.clone(),
                    });
                }
                *ty = Some(self.registry.type_name(enum_ty));
                Ok(())
            }
            ValueNode::Array { .. } => self.check_array(property, target, value),
            ValueNode::Binding(_) => Ok(()),
            ValueNode::Collection { .. } => Ok(()),
        }
    }

    /// Array literals against a collection-shaped target become
    /// collection initializations. Against a plain target the literal
    /// stays an array and its element type must be assignable.
    fn check_array(
        &mut self,
        property: &SmolStr,
        target: TypeId,
        value: &mut ValueNode,
    ) -> Result<(), AnalysisError> {
        debug_assert!(matches!(value, ValueNode::Array { .. }));

        let element_name = match self.registry.collection_shape(target) {
            CollectionShape::Keyed(value_ty) => self.registry.type_name(value_ty),
            CollectionShape::Single(element_ty) => self.registry.type_name(element_ty),
            CollectionShape::Untyped => self.registry.type_name(self.registry.object_type()),
            CollectionShape::NotCollection => {
                let element = match value {
                    ValueNode::Array {
                        element_type: Some(name),
                        ..
                    } => self.resolve_type_name(name)?,
                    _ => self.registry.object_type(),
                };
                if !self.registry.is_assignable(element, target) {
                    return Err(AnalysisError::ArrayTypeMismatch {
                        property: property.clone(),
                        expected: self.registry.type_name(target),
                    });
                }
                return Ok(());
            }
        };

        let items = match value {
            ValueNode::Array { items, .. } => std::mem::take(items),
            _ => Vec::new(),
        };
        *value = ValueNode::Collection {
            container_type: self.registry.type_name(target),
            element_type: element_name,
            items,
        };
        Ok(())
    }

    fn require_assignable(
        &self,
        from: TypeId,
        to: TypeId,
        property: &SmolStr,
    ) -> Result<(), AnalysisError> {
        if self.registry.is_assignable(from, to) {
            Ok(())
        } else {
            Err(AnalysisError::ValueTypeMismatch {
                property: property.clone(),
                expected: self.registry.type_name(to),
            })
        }
    }

    /// Generate an unused lower-camel id for a synthetic wrapper.
    fn generate_id(&self, tree: &SyntaxTree, type_name: &str) -> SmolStr {
        let stem = lower_camel(type_name);
        let mut counter = 1u32;
        loop {
            let candidate = SmolStr::new(format!("{}{}", stem, counter));
            if tree.object(&candidate).is_none() {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Reorder objects so every constructor dependency precedes its
    /// dependent. The sort is a depth-first walk in list order, so
    /// independent objects keep their relative positions.
    fn sort_objects(&self, tree: &mut SyntaxTree) -> Result<(), AnalysisError> {
        let count = tree.objects.len();
        let mut marks = vec![Mark::Unvisited; count];
        let mut order = Vec::with_capacity(count);

        for index in 0..count {
            self.visit(tree, index, &mut marks, &mut order)?;
        }

        debug_assert_eq!(order.len(), count);
        let mut slots: Vec<Option<ObjectNode>> = std::mem::take(&mut tree.objects)
            .into_iter()
            .map(Some)
            .collect();
        tree.objects = order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();
        Ok(())
    }

    fn visit(
        &self,
        tree: &SyntaxTree,
        index: usize,
        marks: &mut [Mark],
        order: &mut Vec<usize>,
    ) -> Result<(), AnalysisError> {
        match marks[index] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                return Err(AnalysisError::CyclicDependency(
                    tree.objects[index].id.clone(),
                ))
            }
            Mark::Unvisited => {}
        }
        marks[index] = Mark::InProgress;

        if let Some(args) = &tree.objects[index].ctor_args {
            for arg in args {
                if let ValueNode::Reference { id, .. } = arg {
                    if let Some(dep) = tree.index_of(id) {
                        self.visit(tree, dep, marks, order)?;
                    }
                }
            }
        }

        marks[index] = Mark::Done;
        order.push(index);
        Ok(())
    }
}

fn signature_matches(params: &[TypeId], args: &[Option<TypeId>]) -> bool {
    params.len() == args.len()
        && params
            .iter()
            .zip(args)
            .all(|(param, arg)| *arg == Some(*param))
}
