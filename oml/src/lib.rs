//! Object markup compiler.
//!
//! Compiles declarative markup documents describing object trees into
//! C# source: a partial class deriving from the root object's type,
//! with an `InitializeComponent` method that builds the whole tree.
//! Type names resolve against a [`registry::TypeRegistry`]; the
//! bundled [`registry::StaticRegistry`] loads its type metadata from
//! a YAML file.
pub mod analyze;
pub mod ast;
pub mod codegen;
mod cursor;
pub mod error;
pub mod lex;
pub mod parse;
pub mod registry;
pub mod tokens;

pub use self::error::{CompileError, CompileResult};

use self::registry::{NameSet, TypeRegistry};

/// Crate version, from the package manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Settings for one compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileConfig {
    /// Assemblies type lookups may search.
    pub assemblies: NameSet,
    /// Namespaces available without a `using` clause.
    pub namespaces: NameSet,
    /// Name of the generated class.
    pub class_name: String,
    /// Namespace wrapping the generated class.
    pub namespace: String,
}

/// Compile a whole document to C# source.
pub fn compile_str<R: TypeRegistry>(
    source: &str,
    registry: &R,
    config: &CompileConfig,
) -> CompileResult<String> {
    // Lexical and syntactic analysis
    let mut tree = parse::parse(source, registry, &config.assemblies, &config.namespaces)?;

    // Semantic analysis
    analyze::analyze(&mut tree, registry, &config.assemblies, &config.namespaces)?;

    // Code generation
    Ok(codegen::generate(&tree, &config.class_name, &config.namespace))
}

pub mod prelude {
    pub use super::{
        compile_str,
        error::{AnalysisError, CompileError, CompileResult, LexError, ParseError},
        registry::{NameSet, StaticRegistry, TypeRegistry},
        CompileConfig,
    };
}
