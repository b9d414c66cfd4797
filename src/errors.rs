use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum MpibenchError {
    #[error("Could not launch '{command}'")]
    LaunchFailure {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}{}", stderr_suffix(.stderr))]
    ProcessFailure {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("'{command}' exceeded the timeout of {timeout:?} and was killed")]
    Timeout { command: String, timeout: Duration },

    #[error("Benchmark '{name}': iteration count must be at least 1")]
    InvalidIterations { name: String },

    #[error("Benchmark '{name}': invalid extraction pattern: {detail}")]
    InvalidPattern { name: String, detail: String },

    #[error("Benchmark '{name}': invalid duration: {detail}")]
    InvalidDuration { name: String, detail: String },

    #[error("Benchmark '{name}': set either `iterations` or `target_time`, not both")]
    ConflictingPolicy { name: String },

    #[error("Benchmark '{name}' is defined more than once")]
    DuplicateBenchmark { name: String },

    #[error("Benchmark #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("Benchmark '{name}' has an empty command")]
    EmptyCommand { name: String },

    #[error("No benchmark catalog found. Pass --catalog or create mpibench.toml (see `mpibench init`)")]
    CatalogNotFound,

    #[error("Failed to read catalog {path}")]
    CatalogRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse catalog {path}: {detail}")]
    CatalogParse { path: PathBuf, detail: String },

    #[error("Cannot aggregate an empty sample set")]
    NoSamples,

    #[error("Inner time was extracted from {defined} of {total} runs; refusing to mix measured and unmeasured samples")]
    InconsistentSamples { defined: usize, total: usize },

    #[error("Benchmark '{name}' ({command}) failed")]
    BenchmarkFailed {
        name: String,
        command: String,
        #[source]
        source: Box<MpibenchError>,
    },
}

/// `err` followed by each of its sources, separated by `: `.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}
