use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use idol_compiler::compiler::{compile, CompileOptions};
use idol_compiler::{merge, schema_idl, syntax, textenc};

#[derive(Parser)]
#[command(name = "idol")]
#[command(about = "Compile Idol schemas", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Binary,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a `.idol` schema, with any dependencies given as compiled
    /// schema files
    Compile {
        /// Input `.idol` file
        src: PathBuf,

        /// Compiled dependency schemas
        deps: Vec<PathBuf>,

        /// Output encoding
        #[arg(short, long)]
        format: Format,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Reformat a `.idol` schema in place (reserved)
    Format {
        /// Input `.idol` file
        src: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compile {
            src,
            deps,
            format,
            output,
        } => cmd_compile(&src, &deps, format, output.as_deref()),
        Commands::Format { .. } => {
            eprintln!("The 'format' subcommand is reserved and not yet implemented");
            ExitCode::FAILURE
        }
    }
}

fn cmd_compile(
    src_path: &Path,
    dep_paths: &[PathBuf],
    format: Format,
    out_path: Option<&Path>,
) -> ExitCode {
    let mut dep_bufs: Vec<Vec<u8>> = Vec::with_capacity(dep_paths.len());
    for dep_path in dep_paths {
        match fs::read(dep_path) {
            Ok(buf) => dep_bufs.push(buf),
            Err(err) => {
                eprintln!("{}: {}", dep_path.display(), err);
                return ExitCode::FAILURE;
            }
        }
    }
    let mut dep_schemas = Vec::with_capacity(dep_bufs.len());
    for (dep_path, buf) in dep_paths.iter().zip(&dep_bufs) {
        match schema_idl::Schema::decode(buf) {
            Ok(schema) => dep_schemas.push(schema),
            Err(err) => {
                eprintln!("{}: {}", dep_path.display(), err);
                return ExitCode::FAILURE;
            }
        }
    }
    let dep_set = merge(&dep_schemas);

    let src = match fs::read(src_path) {
        Ok(src) => src,
        Err(err) => {
            eprintln!("{}: {}", src_path.display(), err);
            return ExitCode::FAILURE;
        }
    };
    let parsed = match syntax::parse(&src) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut opts = CompileOptions::new().with_dependencies(&dep_set);
    if src_path.is_relative() {
        opts = opts.with_source_path(split_path(src_path));
    }

    let result = compile(&parsed, opts);
    for warning in &result.warnings {
        eprintln!("{}", warning);
    }
    if !result.errors.is_empty() {
        for err in &result.errors {
            eprintln!("{}", err);
        }
        return ExitCode::FAILURE;
    }

    let Some(encoded) = result.encoded_schema() else {
        unreachable!()
    };
    let output: Vec<u8> = match format {
        Format::Binary => encoded,
        Format::Text => {
            let schema = match schema_idl::Schema::decode(&encoded) {
                Ok(schema) => schema,
                Err(err) => {
                    eprintln!("{}", err);
                    return ExitCode::FAILURE;
                }
            };
            textenc::encode(&schema).into_bytes()
        }
    };

    let write_result = match out_path {
        Some(out_path) => fs::write(out_path, &output),
        None => {
            use std::io::Write as _;
            std::io::stdout().write_all(&output)
        }
    };
    if let Err(err) = write_result {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Splits a relative source path into its components, for the compiled
/// schema's `sourcePath` field.
fn split_path(path: &Path) -> Vec<String> {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect()
}
