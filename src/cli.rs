//! Minimal CLI: compile → (report | encode | decode)
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::{CompiledContext, GenerationReport};
use crate::convert::ConverterRegistry;
use crate::model::{GenerationInput, GenerationSpec};
use crate::walker::compile;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile a declared type graph into serialization contexts and run JSON
/// documents through them
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile the spec and print the generation report
    Report(ReportOut),
    /// encode JSON documents through a compiled context
    Encode(EncodeOut),
    /// decode JSON documents back into member-keyed values
    Decode(DecodeOut),
}

#[derive(Args, Debug, Clone)]
struct SpecSettings {
    /// generation spec file (JSON)
    #[arg(long, short)]
    spec: PathBuf,

    /// context to use when the spec declares more than one
    #[arg(long)]
    context: Option<String>,
}

#[derive(clap::Parser, Debug)]
struct ReportOut {
    #[command(flatten)]
    spec_settings: SpecSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct EncodeOut {
    #[command(flatten)]
    spec_settings: SpecSettings,

    /// root type to dispatch through
    #[arg(long)]
    root_type: String,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// pretty-print regardless of the context policy
    #[arg(long)]
    indent: bool,

    /// force the generic engine even when the fast path is eligible
    #[arg(long)]
    generic: bool,

    /// output file, one document per line (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct DecodeOut {
    #[command(flatten)]
    spec_settings: SpecSettings,

    /// root type to dispatch through
    #[arg(long)]
    root_type: String,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// output file, one document per line (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SpecSettings {
    fn compile(&self) -> anyhow::Result<GenerationReport> {
        let source = std::fs::read_to_string(&self.spec)
            .with_context(|| format!("failed to read spec file {}", self.spec.display()))?;
        let input: GenerationInput = from_str_with_path(&source)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("failed to parse spec file {}", self.spec.display()))?;
        let spec = GenerationSpec::resolve(input, ConverterRegistry::new())?;
        let report = compile(&spec)?;
        for d in &report.diagnostics {
            eprintln!("{} {d}", "warning:".yellow().bold());
        }
        Ok(report)
    }

    fn pick<'a>(&self, report: &'a GenerationReport) -> anyhow::Result<&'a CompiledContext> {
        match self.context.as_deref() {
            Some(name) => report
                .context(name)
                .with_context(|| format!("no context named '{name}' in the spec")),
            None => report
                .contexts
                .first()
                .context("the spec declares no contexts"),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Report(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let report = target.spec_settings.compile()?;
                let summary = serde_json::to_string_pretty(&report.summary())?;
                write_output(target.out.as_ref(), &summary)
            }
            Command::Encode(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let report = target.spec_settings.compile()?;
                let ctx = target.spec_settings.pick(&report)?;
                let mut options = ctx.default_options();
                if target.indent {
                    options.write_indented = true;
                }

                let mut lines = Vec::new();
                for (path, value) in load_documents(&target.input)? {
                    let encoded = if target.generic {
                        crate::engine::to_string_generic(ctx, &target.root_type, &value, &options)
                    } else {
                        crate::engine::to_string(ctx, &target.root_type, &value, &options)
                    };
                    let encoded = encoded
                        .with_context(|| format!("failed to encode document {path}"))?;
                    lines.push(encoded);
                }
                write_output(target.out.as_ref(), &lines.join("\n"))
            }
            Command::Decode(target) => {
                let report = target.spec_settings.compile()?;
                let ctx = target.spec_settings.pick(&report)?;
                let options = ctx.default_options();

                let mut lines = Vec::new();
                for (path, value) in load_documents(&target.input)? {
                    let decoded =
                        crate::engine::from_value(ctx, &target.root_type, &value, &options)
                            .with_context(|| format!("failed to decode document {path}"))?;
                    lines.push(serde_json::to_string(&decoded)?);
                }
                write_output(target.out.as_ref(), &lines.join("\n"))
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Deserialize with JSON-path context in error messages.
fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    let de = &mut serde_json::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(format!("at JSON path {path} → {}", err.into_inner()))
        }
    }
}

fn load_documents(patterns: &[String]) -> anyhow::Result<Vec<(String, Value)>> {
    let mut out = Vec::new();
    for path in resolve_file_path_patterns(patterns)? {
        let path_str = path.to_string_lossy().to_string();
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read input file {path_str}"))?;
        let value: Value = from_str_with_path(&source)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("failed to parse JSON input file {path_str}"))?;
        out.push((path_str, value));
    }
    Ok(out)
}

fn write_output(out: Option<&PathBuf>, content: &str) -> anyhow::Result<()> {
    if let Some(out) = out {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(out, content)
            .with_context(|| format!("failed to write {}", out.display()))?;
    } else {
        println!("{content}");
    }
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            // Treat as a glob pattern
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                matched_any = true;
                out.push(entry?);
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            // Treat as a literal path
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
