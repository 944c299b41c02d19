mod cli;
mod console;
mod paths;
mod run;
mod sink;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::run(cli)
}
