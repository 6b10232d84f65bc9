use clap::Parser;
use tradeterm::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
