//! `--config` handling
//!
//! Configuration usually happens while a program is still starting up, before
//! its own argument parser has run. [`extract_config_paths`] therefore scans
//! the raw argument list for `--config` without knowing any other flag.
//! [`ConfigArgs`] and [`with_config_arg`] let a clap-based CLI accept the same
//! flag without declaring it by hand.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Args, Command};
use std::path::PathBuf;

pub const CONFIG_FLAG: &str = "--config";
const CONFIG_ARG_ID: &str = "config";

/// Paths following the first exact `--config` token, up to the next token
/// starting with `--` or the end of the list.
pub fn extract_config_paths<S: AsRef<str>>(argv: &[S]) -> Vec<String> {
    let Some(index) = argv.iter().position(|arg| arg.as_ref() == CONFIG_FLAG) else {
        return Vec::new();
    };
    argv[index + 1..]
        .iter()
        .map(|arg| arg.as_ref())
        .take_while(|arg: &&str| !arg.starts_with("--"))
        .map(str::to_string)
        .collect()
}

/// [`extract_config_paths`] over the arguments of the current process.
pub fn config_paths_from_env() -> Vec<PathBuf> {
    let argv: Vec<String> = std::env::args().collect();
    extract_config_paths(&argv).into_iter().map(PathBuf::from).collect()
}

/// `--config <PATH>...`, for `#[command(flatten)]` into a derive-based CLI.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ConfigArgs {
    /// Config files overriding the default configuration, applied in order
    #[arg(long = "config", value_name = "PATH", num_args = 0..)]
    pub config: Vec<PathBuf>,
}

impl ConfigArgs {
    pub fn paths(&self) -> &[PathBuf] {
        &self.config
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_empty()
    }
}

/// Register `--config <PATH>...` on a builder-style command.
pub fn with_config_arg(command: Command) -> Command {
    command.arg(
        Arg::new(CONFIG_ARG_ID)
            .long(CONFIG_ARG_ID)
            .value_name("PATH")
            .help("Config files overriding the default configuration, applied in order")
            .num_args(0..)
            .action(ArgAction::Append)
            .value_parser(value_parser!(PathBuf)),
    )
}

/// Paths given to `--config` on a command built with [`with_config_arg`].
pub fn config_paths(matches: &ArgMatches) -> Vec<PathBuf> {
    matches
        .get_many::<PathBuf>(CONFIG_ARG_ID)
        .map(|paths| paths.cloned().collect())
        .unwrap_or_default()
}
