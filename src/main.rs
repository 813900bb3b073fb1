//! yapecs: inspect configured modules and drive restartable grid searches
//! from the shell.

use anyhow::Result;

mod cli;

fn main() -> Result<()> {
    cli::run()
}
