//! Code generation
//!
//! Renders a finalized tree as C# source: a partial class deriving
//! from the root object's type, one internal field per dependent
//! object, and an `InitializeComponent` method that instantiates the
//! dependents and assigns every property.
use itertools::Itertools;

use crate::ast::{Binding, BindingMode, ObjectNode, SyntaxTree, ValueNode};

const INDENT: &str = "    ";

/// Render the tree as a C# partial class in the given namespace.
///
/// The tree is expected to be analyzer output: objects ordered with
/// dependencies first and the root last. Rendering itself cannot
/// fail.
pub fn generate(tree: &SyntaxTree, class_name: &str, namespace: &str) -> String {
    CodeGen::new(class_name, namespace).render(tree)
}

struct CodeGen<'a> {
    class_name: &'a str,
    namespace: &'a str,
}

impl<'a> CodeGen<'a> {
    fn new(class_name: &'a str, namespace: &'a str) -> Self {
        Self {
            class_name,
            namespace,
        }
    }

    fn render(&self, tree: &SyntaxTree) -> String {
        let mut out = String::new();

        // Namespaces come out of a sorted set, so the using block is
        // deterministic.
        for namespace in &tree.namespaces {
            out.push_str("using ");
            out.push_str(namespace);
            out.push_str(";\n");
        }
        if !tree.namespaces.is_empty() {
            out.push('\n');
        }

        push_line(&mut out, 0, &format!("namespace {}", self.namespace));
        push_line(&mut out, 0, "{");

        let class_line = match tree.root() {
            Some(root) => format!(
                "public partial class {} : {}",
                self.class_name, root.type_name
            ),
            None => format!("public partial class {}", self.class_name),
        };
        push_line(&mut out, 1, &class_line);
        push_line(&mut out, 1, "{");

        self.render_fields(tree, &mut out);
        self.render_init(tree, &mut out);

        push_line(&mut out, 1, "}");
        push_line(&mut out, 0, "}");
        out
    }

    /// One internal field per dependent object. The root needs none,
    /// it is the class itself.
    fn render_fields(&self, tree: &SyntaxTree, out: &mut String) {
        let mut any = false;
        for obj in tree.objects.iter().filter(|obj| !obj.is_root()) {
            push_line(out, 2, &format!("internal {} {};", obj.type_name, obj.id));
            any = true;
        }
        if any {
            out.push('\n');
        }
    }

    fn render_init(&self, tree: &SyntaxTree, out: &mut String) {
        push_line(out, 2, "public void InitializeComponent()");
        push_line(out, 2, "{");

        let mut instantiated = false;
        for obj in tree.objects.iter().filter(|obj| !obj.is_root()) {
            let args = obj
                .ctor_args
                .as_deref()
                .unwrap_or(&[])
                .iter()
                .map(|arg| self.value(arg))
                .join(", ");
            push_line(
                out,
                3,
                &format!("{} = new {}({});", obj.id, obj.type_name, args),
            );
            instantiated = true;
        }

        // Dependents' assignments first, the root's last; the root's
        // constructor arguments are never emitted, its construction
        // belongs to the hand-written part of the class.
        let mut assignments = Vec::new();
        for obj in tree.objects.iter().filter(|obj| !obj.is_root()) {
            self.collect_assignments(obj, &mut assignments);
        }
        if let Some(root) = tree.root() {
            self.collect_assignments(root, &mut assignments);
        }

        if instantiated && !assignments.is_empty() {
            out.push('\n');
        }
        for line in &assignments {
            push_line(out, 3, line);
        }

        push_line(out, 2, "}");
    }

    fn collect_assignments(&self, obj: &ObjectNode, lines: &mut Vec<String>) {
        if let Some(props) = &obj.properties {
            for prop in props {
                lines.push(format!(
                    "{}.{} = {};",
                    obj.id,
                    prop.name,
                    self.value(&prop.value)
                ));
            }
        }
    }

    fn value(&self, value: &ValueNode) -> String {
        match value {
            ValueNode::Number(number) => number.to_string(),
            ValueNode::Str(text) => format!("\"{}\"", text),
            ValueNode::Reference { id, .. } => id.to_string(),
            ValueNode::Enum {
                ty: Some(ty),
                member,
            } => format!("{}.{}", ty, member),
            ValueNode::Enum { ty: None, member } => member.to_string(),
            ValueNode::Binding(binding) => self.binding(binding),
            ValueNode::Array {
                element_type,
                items,
            } => {
                let element = element_type.as_deref().unwrap_or("Object");
                self.braced(&format!("new {}[]", element), items)
            }
            ValueNode::Collection {
                container_type,
                items,
                ..
            } => self.braced(&format!("new {}", container_type), items),
        }
    }

    fn braced(&self, head: &str, items: &[ValueNode]) -> String {
        if items.is_empty() {
            format!("{} {{}}", head)
        } else {
            let body = items.iter().map(|item| self.value(item)).join(", ");
            format!("{} {{ {} }}", head, body)
        }
    }

    fn binding(&self, binding: &Binding) -> String {
        let mut fields = Vec::new();
        if let Some(element) = &binding.element_name {
            fields.push(format!("ElementName = \"{}\"", element));
        }
        fields.push(format!("Path = \"{}\"", binding.path));
        if binding.mode != BindingMode::Default {
            fields.push(format!("Mode = BindingMode.{}", binding.mode));
        }
        format!("new Binding {{ {} }}", fields.join(", "))
    }
}

fn push_line(out: &mut String, depth: usize, line: &str) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(line);
    out.push('\n');
}
