use std::path::PathBuf;

use clap::Parser;

/// Serialization-aware search and replace for MySQL databases.
#[derive(Debug, Parser)]
#[command(name = "dbshift", version, about)]
pub struct Args {
    /// Path to the JSON parameter file.
    #[arg(short, long, value_name = "FILE")]
    pub params: PathBuf,

    /// Print the derived replacement pairs and probe patterns, then
    /// exit without connecting to the database.
    #[arg(long)]
    pub plan: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_params_path() {
        let args = Args::parse_from(["dbshift", "--params", "/tmp/run.json"]);
        assert_eq!(args.params, PathBuf::from("/tmp/run.json"));
        assert!(!args.plan);
    }

    #[test]
    fn plan_flag() {
        let args = Args::parse_from(["dbshift", "-p", "run.json", "--plan"]);
        assert!(args.plan);
    }
}
