//! # pare CLI Module
//!
//! Command-line surface of the reducer.
//!
//! ```bash
//! pare crash.pare --test ./still-crashes.sh
//! pare crash.pare --test ./check.sh --test-arg --input={} -o small.pare
//! pare crash.json --test ./check.sh --in-place -j 4 --max-time 600
//! ```

mod commands;

use clap::Parser;
use pare::{ReduceConfig, SetupError};
use pare_core::{Format, GranularityPolicy};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// pare - delta-debugging test-case reducer
///
/// Repeatedly removes parts of the input and keeps every removal after which
/// the interestingness test still exits with status 0.
#[derive(Parser, Debug)]
#[command(name = "pare")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Artifact to reduce
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Interestingness test executable (exit 0 = interesting)
    #[arg(long = "test", value_name = "EXECUTABLE", required_unless_present = "config")]
    pub test: Option<PathBuf>,

    /// Extra argument for the test; "{}" is replaced by the candidate path,
    /// otherwise the path is appended last (repeatable)
    #[arg(long = "test-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub test_args: Vec<String>,

    /// Output path (default: <stem>.reduced.<ext> next to the input)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Overwrite the input file (takes precedence over --output)
    #[arg(long)]
    pub in_place: bool,

    /// Artifact format: text, json (default: by extension)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Per-trial timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Trials evaluated concurrently
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Stop issuing trials after this many
    #[arg(long, value_name = "N")]
    pub max_trials: Option<u64>,

    /// Stop issuing trials after this many seconds
    #[arg(long, value_name = "SECS")]
    pub max_time: Option<u64>,

    /// Starting number of chunks per target list (minimum 2)
    #[arg(long, value_name = "N")]
    pub initial_chunks: Option<usize>,

    /// Keep the current granularity after a successful removal
    #[arg(long)]
    pub no_reset: bool,

    /// Passes to run, in order (top-level, nested, unreferenced)
    #[arg(long, value_name = "PASSES", value_delimiter = ',')]
    pub passes: Option<Vec<String>>,

    /// Run the test even for candidates already judged
    #[arg(long)]
    pub no_cache: bool,

    /// Directory in which the trial directory is created
    #[arg(long, value_name = "DIR")]
    pub tmp_dir: Option<PathBuf>,

    /// TOML configuration file (flags override its values)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the chunk index reference of every pass
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json_mode: bool,
}

impl Cli {
    /// Fold the configuration file (if any) and the flags into one value.
    pub fn to_config(&self) -> Result<ReduceConfig, SetupError> {
        let mut config = match &self.config {
            Some(path) => ReduceConfig::load(path)?,
            None => ReduceConfig::default(),
        };

        if let Some(test) = &self.test {
            config.oracle.program = test.clone();
        }
        if !self.test_args.is_empty() {
            config.oracle.args = self.test_args.clone();
        }
        if let Some(timeout) = self.timeout {
            config.oracle.timeout_secs = timeout;
        }
        if let Some(name) = &self.format {
            let format =
                Format::from_name(name).map_err(|e| SetupError::Config(e.to_string()))?;
            config.format = Some(format);
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if self.max_trials.is_some() {
            config.max_trials = self.max_trials;
        }
        if self.max_time.is_some() {
            config.max_time_secs = self.max_time;
        }
        if let Some(chunks) = self.initial_chunks {
            config.granularity = GranularityPolicy::new(chunks)
                .with_reset_on_success(config.granularity.reset_on_success);
        }
        if self.no_reset {
            config.granularity.reset_on_success = false;
        }
        if let Some(passes) = &self.passes {
            config.passes = passes.clone();
        }
        if self.no_cache {
            config.cache = false;
        }
        if let Some(dir) = &self.tmp_dir {
            config.tmp_dir = Some(dir.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), SetupError> {
    cmd_reduce(&cli).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("valid arguments")
    }

    #[test]
    fn test_is_required() {
        assert!(Cli::try_parse_from(["pare", "case.pare"]).is_err());
    }

    #[test]
    fn flags_fold_into_config() {
        let cli = parse(&[
            "pare",
            "case.pare",
            "--test",
            "./check.sh",
            "--test-arg",
            "--input={}",
            "--test-arg",
            "quick",
            "-j",
            "3",
            "--initial-chunks",
            "4",
            "--no-reset",
            "--passes",
            "nested,top-level",
            "--no-cache",
        ]);
        let config = cli.to_config().expect("config");

        assert_eq!(config.oracle.args, vec!["--input={}", "quick"]);
        assert_eq!(config.jobs, 3);
        assert_eq!(config.granularity.initial_chunks, 4);
        assert!(!config.granularity.reset_on_success);
        assert_eq!(config.passes, vec!["nested", "top-level"]);
        assert!(!config.cache);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("pare.toml");
        std::fs::write(
            &file,
            "jobs = 8\n[oracle]\nprogram = \"./from-file.sh\"\ntimeout_secs = 9\n",
        )
        .expect("write");

        let cli = parse(&[
            "pare",
            "case.pare",
            "--config",
            file.to_str().expect("utf8 path"),
            "--timeout",
            "2",
        ]);
        let config = cli.to_config().expect("config");

        assert_eq!(config.oracle.program, PathBuf::from("./from-file.sh"));
        assert_eq!(config.oracle.timeout_secs, 2);
        assert_eq!(config.jobs, 8);
    }

    #[test]
    fn unknown_format_is_config_error() {
        let cli = parse(&["pare", "case.pare", "--test", "t", "--format", "xml"]);
        assert!(matches!(cli.to_config(), Err(SetupError::Config(_))));
    }
}
