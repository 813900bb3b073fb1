//! Grid-search command implementation

use anyhow::Result;
use clap::Args;
use serde_json::{Map, Value};
use std::path::PathBuf;

use super::utils::parse_param;
use yapecs::GridSearch;

#[derive(Args)]
pub struct GridSearchArgs {
    /// File recording how many combinations have been handed out
    #[arg(long, value_name = "FILE", env = "YAPECS_PROGRESS_FILE")]
    pub progress: PathBuf,

    /// Parameter and its candidate values as a JSON list, e.g. 'BATCH_SIZE=[64, 128]'
    /// (repeatable; the last parameter varies fastest)
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUES", required_unless_present = "reset")]
    pub params: Vec<String>,

    /// Report progress without advancing the search
    #[arg(long, conflicts_with = "reset")]
    pub status: bool,

    /// Delete the progress file so the search starts over
    #[arg(long)]
    pub reset: bool,
}

pub fn run(args: GridSearchArgs) -> Result<()> {
    let mut search = GridSearch::new(&args.progress);
    for param in &args.params {
        let (name, values) = parse_param(param)?;
        search = search.parameter(name, values);
    }

    if args.reset {
        search.reset()?;
        println!("Reset {}", args.progress.display());
        return Ok(());
    }

    if args.status {
        let total = search.total()?;
        let done = search.progress()?.min(total);
        println!("{}/{} combinations handed out", done, total);
        return Ok(());
    }

    // Exhaustion surfaces as an error, so restart loops stop on the non-zero exit.
    let assignment: Map<String, Value> = search.advance()?.into_iter().collect();
    println!("{}", serde_json::to_string(&assignment)?);
    Ok(())
}
