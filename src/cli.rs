//! Command-line interface implementation

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use crate::extract;

/// Exit codes
const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;

/// Extract de-duplicated per-theme sprite atlases from map-editor screenshots
#[derive(Parser)]
#[command(name = "mapatlas")]
#[command(about = "Extract de-duplicated per-theme sprite atlases from map-editor screenshots")]
#[command(version)]
pub struct Cli {
    /// Directory containing numbered screenshot PNGs
    pub input_dir: PathBuf,

    /// Directory to write the per-colour and common atlases into
    pub output_dir: PathBuf,
}

/// Run the CLI application.
///
/// Argument errors (wrong count, unknown flags) exit nonzero via clap before
/// any processing starts.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match extract::run(&cli.input_dir, &cli.output_dir) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_two_directories() {
        let cli = Cli::try_parse_from(["mapatlas", "shots/", "out/"]).unwrap();
        assert_eq!(cli.input_dir, PathBuf::from("shots/"));
        assert_eq!(cli.output_dir, PathBuf::from("out/"));
    }

    #[test]
    fn test_cli_rejects_wrong_argument_count() {
        assert!(Cli::try_parse_from(["mapatlas"]).is_err());
        assert!(Cli::try_parse_from(["mapatlas", "only-one"]).is_err());
        assert!(Cli::try_parse_from(["mapatlas", "a", "b", "c"]).is_err());
    }
}
