//! # CLI Command Implementations
//!
//! The reduce command: validate paths, parse the seed, run the session and
//! write the best artifact.

use super::Cli;
use pare::{ExternalOracle, Progress, Session, SessionOptions, SessionReport, SetupError};
use pare_core::primitives::MAX_INPUT_SIZE;
use pare_core::Codec;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// PATH VALIDATION
// =============================================================================

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), SetupError> {
    let metadata = std::fs::metadata(path).map_err(|e| SetupError::Read {
        path: path.to_path_buf(),
        message: format!("cannot read file metadata: {}", e),
    })?;

    if metadata.len() > max_size {
        return Err(SetupError::InputTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit: max_size,
        });
    }
    Ok(())
}

/// Resolve the input path and ensure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, SetupError> {
    // Canonicalize resolves "..", symlinks, and validates existence
    let canonical = path.canonicalize().map_err(|e| SetupError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if !canonical.is_file() {
        return Err(SetupError::Read {
            path: path.to_path_buf(),
            message: "not a regular file".to_string(),
        });
    }

    Ok(canonical)
}

/// Validate that the output's parent directory exists.
fn validate_output_path(path: &Path) -> Result<PathBuf, SetupError> {
    let write_error = |message: String| SetupError::Write {
        path: path.to_path_buf(),
        message,
    };

    let parent = parent_dir(path);
    let canonical_parent = parent
        .canonicalize()
        .map_err(|e| write_error(format!("invalid output directory: {}", e)))?;
    if !canonical_parent.is_dir() {
        return Err(write_error("output directory is not a directory".to_string()));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| write_error("output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// `<stem>.reduced.<ext>` next to `input`, using `fallback_ext` when the input
/// has no extension.
pub fn default_output_path(input: &Path, fallback_ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback_ext.to_string());

    input.with_file_name(format!("{}.reduced.{}", stem, ext))
}

/// Where the result goes. `--in-place` wins over `--output`.
fn resolve_output(cli: &Cli, input: &Path, codec: &dyn Codec) -> Result<PathBuf, SetupError> {
    if cli.in_place {
        if cli.output.is_some() {
            tracing::warn!("--in-place given, ignoring --output");
        }
        return Ok(input.to_path_buf());
    }

    match &cli.output {
        Some(output) => validate_output_path(output),
        None => validate_output_path(&default_output_path(input, codec.extension())),
    }
}

/// Directory containing `path`, `.` for a bare file name.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Replace `path` atomically with `bytes`.
fn write_output(path: &Path, bytes: &[u8]) -> Result<(), SetupError> {
    let write_error = |message: String| SetupError::Write {
        path: path.to_path_buf(),
        message,
    };
    let dir = parent_dir(path);

    let mut file =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| write_error(e.to_string()))?;
    file.write_all(bytes)
        .and_then(|()| file.flush())
        .map_err(|e| write_error(e.to_string()))?;
    file.persist(path)
        .map_err(|e| write_error(e.error.to_string()))?;
    Ok(())
}

// =============================================================================
// REDUCE COMMAND
// =============================================================================

/// Reduce the input and write the result.
pub async fn cmd_reduce(cli: &Cli) -> Result<(), SetupError> {
    let config = cli.to_config()?;

    let input = validate_file_path(&cli.input)?;
    validate_file_size(&input, MAX_INPUT_SIZE)?;
    let original = std::fs::read(&input).map_err(|e| SetupError::Read {
        path: input.clone(),
        message: e.to_string(),
    })?;

    let format = config.format_for(&input);
    let codec = format.codec();
    let seed = codec.parse(&original)?;
    let output = resolve_output(cli, &input, codec.as_ref())?;

    tracing::info!(
        "Reducing {:?} ({} elements, format {:?})",
        input,
        seed.size(),
        format
    );

    let oracle = ExternalOracle::new(
        config.oracle.clone(),
        format.codec(),
        config.tmp_dir.as_deref(),
    )?
    .with_cache(config.cache);

    let options = SessionOptions {
        policy: config.granularity,
        jobs: config.jobs,
        max_trials: config.max_trials,
        max_time: config.max_time(),
    };
    let mut session = Session::new(seed, Arc::new(oracle), config.resolve_passes()?, options);
    if !cli.quiet && !cli.json_mode {
        let verbose = cli.verbose;
        session = session.with_observer(move |progress| print_progress(&progress, verbose));
    }

    let budget = session.budget();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight trials");
            budget.cancel();
        }
    });

    let report = session.run().await?;

    let written = if report.reduced() {
        let bytes = codec
            .render(session.best())
            .map_err(|e| SetupError::Write {
                path: output.clone(),
                message: e.to_string(),
            })?;
        write_output(&output, &bytes)?;
        true
    } else if cli.in_place {
        // nothing changed; leave the input alone
        false
    } else {
        write_output(&output, &original)?;
        true
    };

    print_report(cli, &report, &output, written);
    Ok(())
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_progress(progress: &Progress<'_>, verbose: bool) {
    match progress {
        Progress::PassStarted {
            round,
            pass,
            description,
            targets,
        } => {
            if verbose {
                println!("round {} {} ({}): chunk index reference", round, pass, description);
                for line in pare_core::pass::chunk_index_reference(targets) {
                    println!("  {}", line);
                }
            }
        }
        Progress::PassFinished(report) => {
            if report.skipped {
                return;
            }
            println!(
                "round {} {}: targets {} -> {}, size {} -> {} ({} trials)",
                report.round,
                report.pass,
                report.targets_before,
                report.targets_after,
                report.size_before,
                report.size_after,
                report.stats.trials
            );
        }
        Progress::RoundFinished(report) => {
            println!(
                "round {} done: {} -> {} elements",
                report.round, report.size_before, report.size_after
            );
        }
    }
}

fn print_report(cli: &Cli, report: &SessionReport, output: &Path, written: bool) {
    if cli.json_mode {
        let out = serde_json::json!({
            "input": cli.input.to_string_lossy(),
            "output": written.then(|| output.to_string_lossy()),
            "summary": report.summary(),
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
        return;
    }

    if cli.quiet {
        return;
    }

    println!();
    println!("{}", report.summary());
    println!(
        "Trials: {} ({} cached, {} infrastructure failures)",
        report.stats.trials, report.stats.cache_hits, report.stats.infra_failures
    );
    if report.placeholders > 0 {
        println!("Placeholders: {}", report.placeholders);
    }
    if written {
        println!("Output: {}", output.display());
    } else {
        println!("Input left unchanged: {}", output.display());
    }
}
