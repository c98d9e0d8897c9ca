use std::process::ExitCode;

use clap::Parser;
use pixels_editor::cli::{self, CliArgs};

fn main() -> ExitCode {
    cli::run(CliArgs::parse())
}
