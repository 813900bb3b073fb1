//! Show command implementation

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use yapecs::{compose, load_source, ConfigArgs, ModuleDefinition};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Format {
    Toml,
    Yaml,
    Json,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Defaults file (TOML, YAML or JSON) holding the baseline configuration
    #[arg(value_name = "DEFAULTS")]
    pub defaults: PathBuf,

    /// Module name that config files must be tagged with
    /// [default: the defaults file's MODULE, else its file stem]
    #[arg(short, long, value_name = "NAME")]
    pub module: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Toml)]
    pub format: Format,

    #[command(flatten)]
    pub config: ConfigArgs,
}

pub fn run(args: ShowArgs) -> Result<()> {
    let module_name = match args.module {
        Some(name) => name,
        None => default_module_name(&args.defaults)?,
    };

    let definition = ModuleDefinition::from_file(module_name.clone(), &args.defaults);
    let module = compose(&definition, args.config.paths())
        .with_context(|| format!("Failed to configure module {}", module_name))?;
    let resolved = module.resolve_all()?;

    print!("{}", render(&resolved, args.format)?);
    Ok(())
}

fn default_module_name(defaults: &Path) -> Result<String> {
    let source = load_source(defaults)?;
    if let Some(tag) = source.module() {
        return Ok(tag.to_string());
    }
    defaults
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("Cannot derive a module name from {}", defaults.display()))
}

fn render(resolved: &Map<String, Value>, format: Format) -> Result<String> {
    Ok(match format {
        Format::Json => format!("{}\n", serde_json::to_string_pretty(resolved)?),
        Format::Yaml => serde_yaml::to_string(resolved)?,
        Format::Toml => toml::to_string(resolved)
            .context("Configuration cannot be shown as TOML (null values?); try --format json")?,
    })
}
