//! Paths command implementation

use anyhow::Result;
use clap::Args;

use yapecs::extract_config_paths;

#[derive(Args)]
pub struct PathsArgs {
    /// Argument list to scan, usually given after `--`
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

pub fn run(args: PathsArgs) -> Result<()> {
    for path in extract_config_paths(&args.args) {
        println!("{}", path);
    }
    Ok(())
}
