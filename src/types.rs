use std::fmt;
use std::time::Duration;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// How many times a benchmark is executed.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationPolicy {
    /// Run exactly this many times.
    Fixed(u64),
    /// Calibrate with one run, then repeat until roughly `target` has elapsed.
    Adaptive {
        target: Duration,
        max_iterations: Option<u64>,
    },
}

impl fmt::Display for IterationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterationPolicy::Fixed(n) => write!(f, "{}x", n),
            IterationPolicy::Adaptive {
                target,
                max_iterations: Some(max),
            } => write!(f, "~{:?} (max {})", target, max),
            IterationPolicy::Adaptive { target, .. } => write!(f, "~{:?}", target),
        }
    }
}

/// A validated, ready-to-run benchmark.
#[derive(Debug, Clone)]
pub struct BenchmarkDefinition {
    pub name: String,
    pub command: String,
    pub arguments: Vec<String>,
    /// Compiled once at load time; exactly one capture group.
    pub extraction_pattern: Option<Regex>,
    pub iteration_policy: IterationPolicy,
    pub timeout: Option<Duration>,
}

impl BenchmarkDefinition {
    /// The command and its arguments joined with spaces, for messages.
    pub fn command_line(&self) -> String {
        let mut line = self.command.clone();
        for arg in &self.arguments {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Output of a single process execution, before extraction.
#[derive(Debug, Clone)]
pub struct RawRun {
    pub overall_seconds: f64,
    pub stdout: String,
}

/// Timings for one iteration. `start_seconds` is present iff `inner_seconds` is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionSample {
    pub overall_seconds: f64,
    pub inner_seconds: Option<f64>,
    pub start_seconds: Option<f64>,
}

impl ExecutionSample {
    pub fn overall_only(overall_seconds: f64) -> Self {
        Self {
            overall_seconds,
            inner_seconds: None,
            start_seconds: None,
        }
    }

    pub fn with_inner(overall_seconds: f64, inner_seconds: f64) -> Self {
        Self {
            overall_seconds,
            inner_seconds: Some(inner_seconds),
            start_seconds: Some(overall_seconds - inner_seconds),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregatedStat {
    pub mean: f64,
    pub variance: f64,
    pub stdev: f64,
}

/// Aggregated statistics over every sample of one benchmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub overall: AggregatedStat,
    pub inner: Option<AggregatedStat>,
    pub start: Option<AggregatedStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub iterations: usize,
    pub overall: AggregatedStat,
    pub inner: Option<AggregatedStat>,
    pub start: Option<AggregatedStat>,
}

/// A benchmark that was skipped under [`FailurePolicy::Skip`].
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub name: String,
    pub command: String,
    pub message: String,
}

/// What to do when a benchmark's command fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the whole run on the first failure.
    #[default]
    Abort,
    /// Warn, drop the failed benchmark and continue with the next one.
    Skip,
}

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Table,
    Full,
}
