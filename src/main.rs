//! mapatlas - command-line tool for extracting sprite atlases from
//! map-editor screenshots

use std::process::ExitCode;

use mapatlas::cli;

fn main() -> ExitCode {
    cli::run()
}
