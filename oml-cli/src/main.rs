//! Entrypoint for CLI
use std::{
    env,
    error::Error,
    fs,
    path::{Path, PathBuf},
};

use log::{debug, error, info};
use serde::Deserialize;

use oml::{lex::tokenize, prelude::*, VERSION};

static USAGE: &str = r#"
usage: omlc CMD FILE [PROJECT]

commands:
    build    Compile the target document into a C# class
    check    Compile the target document and discard the output
    tokens   Dump the target document's token stream

The project file defaults to oml.yaml in the working directory.

examples:
    omlc build main_window.oml
    omlc build main_window.oml editor.yaml
    omlc check main_window.oml
    omlc tokens main_window.oml
"#;

const DEFAULT_PROJECT: &str = "oml.yaml";

/// Project settings file.
///
/// ```yaml
/// registry: wpf_types.yaml
/// assemblies: [CoreLib, PresentationFramework]
/// namespaces: [System]
/// class: MainWindow
/// namespace: DocumentEditor.App
/// output: MainWindow.g.cs
/// ```
#[derive(Debug, Deserialize)]
struct ProjectDef {
    registry: String,
    #[serde(default)]
    assemblies: Vec<String>,
    #[serde(default)]
    namespaces: Vec<String>,
    class: String,
    namespace: String,
    #[serde(default)]
    output: Option<String>,
}

struct Project {
    registry: PathBuf,
    output: Option<PathBuf>,
    config: CompileConfig,
}

impl Project {
    fn load(filepath: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let filepath = filepath.as_ref();
        let file = fs::File::open(filepath)?;
        let def: ProjectDef = serde_yaml::from_reader(file)?;

        // Paths in the project file are relative to the file itself.
        let base = filepath.parent().unwrap_or(Path::new(""));
        let project = Project {
            registry: base.join(&def.registry),
            output: def.output.as_deref().map(|out| base.join(out)),
            config: CompileConfig {
                assemblies: def.assemblies.iter().map(|name| name.as_str().into()).collect(),
                namespaces: def.namespaces.iter().map(|name| name.as_str().into()).collect(),
                class_name: def.class,
                namespace: def.namespace,
            },
        };
        debug!("loaded project {}", filepath.display());
        Ok(project)
    }

    fn output_path(&self, source_path: &str) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => PathBuf::from(source_path).with_extension("cs"),
        }
    }
}

fn run_build(source_path: &str, project_path: &str) -> Result<(), Box<dyn Error>> {
    info!("building {}", source_path);

    let project = Project::load(project_path)?;
    let registry = StaticRegistry::from_file(&project.registry)?;
    let source = fs::read_to_string(source_path)?;

    match compile_str(&source, &registry, &project.config) {
        Ok(output) => {
            let out_path = project.output_path(source_path);
            fs::write(&out_path, output)?;
            info!("wrote {}", out_path.display());
            Ok(())
        }
        Err(err) => {
            error!("build failed\n{err}");
            Err(err.into())
        }
    }
}

fn run_check(source_path: &str, project_path: &str) -> Result<(), Box<dyn Error>> {
    let project = Project::load(project_path)?;
    let registry = StaticRegistry::from_file(&project.registry)?;
    let source = fs::read_to_string(source_path)?;

    match compile_str(&source, &registry, &project.config) {
        Ok(_) => {
            println!("ok: {}", source_path);
            Ok(())
        }
        Err(err) => {
            error!("check failed\n{err}");
            Err(err.into())
        }
    }
}

fn run_tokens(source_path: &str) -> Result<(), Box<dyn Error>> {
    let source = fs::read_to_string(source_path)?;

    let tokens = match tokenize(&source) {
        Ok(tokens) => tokens,
        Err(err) => {
            error!("scan failed\n{err}");
            return Err(err.into());
        }
    };

    println!("offset | len | token       | fragment ");
    for token in &tokens {
        let offset = token.span.index;
        let len = token.span.size;
        // debug formatting ignores column width
        let kind = format!("{:?}", token.kind);
        let fragment = token.span.fragment(&source);
        println!("{offset:7}:{len: <3} {kind: <24} \"{fragment}\"");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init().unwrap();

    match parse_args() {
        Some(Cmd::Build { source, project }) => run_build(&source, &project)?,
        Some(Cmd::Check { source, project }) => run_check(&source, &project)?,
        Some(Cmd::Tokens { source }) => run_tokens(&source)?,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next() {
        Some(cmd) => match cmd.as_str() {
            "build" => Some(Cmd::Build {
                source: consume_arg(&mut args)?,
                project: project_arg(args),
            }),
            "check" => Some(Cmd::Check {
                source: consume_arg(&mut args)?,
                project: project_arg(args),
            }),
            "tokens" => Some(Cmd::Tokens {
                source: consume_arg(&mut args)?,
            }),
            _ => None,
        },
        None => None,
    }
}

/// Consumes the next argument; the caller prints the usage text when
/// it is missing.
fn consume_arg(args: &mut impl Iterator<Item = String>) -> Option<String> {
    args.next()
}

/// Optional trailing project file argument.
fn project_arg(mut args: impl Iterator<Item = String>) -> String {
    args.next().unwrap_or_else(|| DEFAULT_PROJECT.to_string())
}

fn print_usage() {
    println!("omlc v{VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Compile a document and write the generated class
    Build { source: String, project: String },
    /// Compile a document without writing anything
    Check { source: String, project: String },
    /// Scan a document and dump its tokens
    Tokens { source: String },
}
