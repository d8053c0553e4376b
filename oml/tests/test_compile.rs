use oml::prelude::*;

fn names(items: &[&str]) -> NameSet {
    items.iter().map(|item| (*item).into()).collect()
}

fn config() -> CompileConfig {
    CompileConfig {
        assemblies: names(&["CoreLib", "PresentationCore", "PresentationFramework"]),
        namespaces: names(&["System", "System.Windows.Data", "System.Windows.Media"]),
        class_name: "MainWindow".to_string(),
        namespace: "DocumentEditor.App".to_string(),
    }
}

fn compile(source: &str) -> Result<String, CompileError> {
    let registry = StaticRegistry::from_yaml(include_str!("wpf_types.yaml"))
        .expect("registry failed to load");
    compile_str(source, &registry, &config())
}

#[test]
fn test_compile_main_window() {
    let source = include_str!("main_window.oml");
    let expected = include_str!("main_window.cs");

    match compile(source) {
        Ok(output) => assert_eq!(output, expected),
        Err(err) => panic!("{}", err),
    }
}

#[test]
fn test_compile_data_binding() {
    let source = r#"
using System.Windows;
using System.Windows.Controls;

Window {
    Title: @editor.Text,
    Content: TextBox#editor { Text: @(Path = Title, Mode = TwoWay) }
}
"#;
    let expected = "\
using System;
using System.Windows;
using System.Windows.Controls;
using System.Windows.Data;
using System.Windows.Media;

namespace DocumentEditor.App
{
    public partial class MainWindow : Window
    {
        internal TextBox editor;

        public void InitializeComponent()
        {
            editor = new TextBox();

            editor.Text = new Binding { Path = \"Title\", Mode = BindingMode.TwoWay };
            this.Title = new Binding { ElementName = \"editor\", Path = \"Text\" };
            this.Content = editor;
        }
    }
}
";

    match compile(source) {
        Ok(output) => assert_eq!(output, expected),
        Err(err) => panic!("{}", err),
    }
}

#[test]
fn test_compile_keyed_collection() {
    let source = r#"
using System.Windows;
using System.Windows.Controls;

Window {
    Resources: [ TextBox, "fallback" ],
    Title: "Keyed"
}
"#;
    let expected = "\
using System;
using System.Windows;
using System.Windows.Controls;
using System.Windows.Data;
using System.Windows.Media;

namespace DocumentEditor.App
{
    public partial class MainWindow : Window
    {
        internal TextBox textBox1;

        public void InitializeComponent()
        {
            textBox1 = new TextBox();

            this.Resources = new ResourceDictionary { textBox1, \"fallback\" };
            this.Title = \"Keyed\";
        }
    }
}
";

    match compile(source) {
        Ok(output) => assert_eq!(output, expected),
        Err(err) => panic!("{}", err),
    }
}

#[test]
fn test_compile_untyped_array_for_plain_property() {
    // Content is no collection, so the literal stays an array with
    // the Object element fallback.
    let source = r#"
using System.Windows;

Window { Content: ["a", "b"] }
"#;
    let expected = "\
using System;
using System.Windows;
using System.Windows.Data;
using System.Windows.Media;

namespace DocumentEditor.App
{
    public partial class MainWindow : Window
    {
        public void InitializeComponent()
        {
            this.Content = new Object[] { \"a\", \"b\" };
        }
    }
}
";

    match compile(source) {
        Ok(output) => assert_eq!(output, expected),
        Err(err) => panic!("{}", err),
    }
}

#[test]
fn test_compile_typed_array_of_references() {
    let source = r#"
using System.Windows;
using System.Windows.Controls;

Window {
    Content: TextBox[ #a, #b ],
    Resources: [ TextBox#a, TextBox#b ]
}
"#;

    let output = compile(source).expect("compile failed");
    assert!(output.contains("this.Content = new TextBox[] { a, b };"));
    assert!(output.contains("this.Resources = new ResourceDictionary { a, b };"));
}
