//! Benchmark catalog loading.
//!
//! A catalog is a TOML file with an optional `[defaults]` table and an ordered
//! list of `[[benchmark]]` entries. Everything is validated here, before any
//! process is launched.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::errors::MpibenchError;
use crate::extract::compile_pattern;
use crate::types::{BenchmarkDefinition, FailurePolicy, IterationPolicy};

/// File name searched for in the current directory and its ancestors.
pub const CATALOG_FILE_NAME: &str = "mpibench.toml";

const DEFAULT_ITERATIONS: i64 = 10;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    defaults: DefaultsFile,
    #[serde(default, rename = "benchmark")]
    benchmarks: Vec<BenchmarkFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefaultsFile {
    iterations: Option<i64>,
    timeout: Option<DurationValue>,
    max_iterations: Option<i64>,
    on_failure: Option<FailurePolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BenchmarkFile {
    name: String,
    command: String,
    #[serde(default)]
    args: Option<ArgsValue>,
    pattern: Option<String>,
    iterations: Option<i64>,
    target_time: Option<DurationValue>,
    max_iterations: Option<i64>,
    timeout: Option<DurationValue>,
}

/// `args = "a b c"` is split on whitespace; `args = ["a", "b c"]` is taken as is.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArgsValue {
    Joined(String),
    List(Vec<String>),
}

impl ArgsValue {
    fn into_vec(self) -> Vec<String> {
        match self {
            ArgsValue::Joined(s) => s.split_whitespace().map(str::to_string).collect(),
            ArgsValue::List(v) => v,
        }
    }
}

/// Durations may be written as `"90s"`, `"5m"`, or a bare number of seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Seconds(f64),
    Text(String),
}

impl DurationValue {
    fn resolve(&self, name: &str) -> Result<Duration, MpibenchError> {
        let invalid = |detail: String| MpibenchError::InvalidDuration {
            name: name.to_string(),
            detail,
        };
        let seconds = match self {
            DurationValue::Seconds(s) => *s,
            DurationValue::Text(text) => parse_duration(text).map_err(&invalid)?,
        };
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(invalid(format!("must be positive, got {}", seconds)));
        }
        Duration::try_from_secs_f64(seconds).map_err(|e| invalid(e.to_string()))
    }
}

/// Parse `"<number><unit>"` into seconds. A missing unit means seconds.
pub fn parse_duration(s: &str) -> Result<f64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let (num_part, unit_part) = s
        .char_indices()
        .find(|(_, c)| c.is_alphabetic())
        .map(|(i, _)| s.split_at(i))
        .unwrap_or((s, "s"));

    let value: f64 = num_part
        .trim()
        .parse()
        .map_err(|_| format!("invalid number '{}'", num_part.trim()))?;

    let multiplier = match unit_part.trim().to_lowercase().as_str() {
        "ns" => 1e-9,
        "us" | "µs" => 1e-6,
        "ms" => 1e-3,
        "s" | "" => 1.0,
        "m" | "min" => 60.0,
        "h" => 3600.0,
        other => return Err(format!("unknown unit '{}'", other)),
    };

    Ok(value * multiplier)
}

/// A validated catalog, in file order.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub benchmarks: Vec<BenchmarkDefinition>,
    pub on_failure: FailurePolicy,
}

impl Catalog {
    /// Load and validate the catalog at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MpibenchError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| MpibenchError::CatalogRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|err| match err {
            MpibenchError::CatalogParse { detail, .. } => MpibenchError::CatalogParse {
                path: path.to_path_buf(),
                detail,
            },
            other => other,
        })
    }

    /// Parse and validate catalog text.
    pub fn parse(content: &str) -> Result<Self, MpibenchError> {
        let file: CatalogFile = toml::from_str(content).map_err(|e| MpibenchError::CatalogParse {
            path: PathBuf::new(),
            detail: e.to_string(),
        })?;
        build(file)
    }

    /// Keep only benchmarks whose name matches `filter`, preserving order.
    pub fn filtered(mut self, filter: &Regex) -> Self {
        self.benchmarks.retain(|b| filter.is_match(&b.name));
        self
    }

    /// Apply `timeout` to every benchmark, replacing catalog values.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        for bench in &mut self.benchmarks {
            bench.timeout = Some(timeout);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.benchmarks.is_empty()
    }
}

fn build(file: CatalogFile) -> Result<Catalog, MpibenchError> {
    let defaults = file.defaults;
    let mut seen = HashSet::new();
    let mut benchmarks = Vec::with_capacity(file.benchmarks.len());

    for (index, entry) in file.benchmarks.into_iter().enumerate() {
        let name = entry.name.trim().to_string();
        if name.is_empty() {
            return Err(MpibenchError::EmptyName { index });
        }
        if !seen.insert(name.clone()) {
            return Err(MpibenchError::DuplicateBenchmark { name });
        }
        if entry.command.trim().is_empty() {
            return Err(MpibenchError::EmptyCommand { name });
        }

        let iteration_policy = match (entry.iterations, &entry.target_time) {
            (Some(_), Some(_)) => return Err(MpibenchError::ConflictingPolicy { name }),
            (Some(n), None) => IterationPolicy::Fixed(positive_count(&name, n)?),
            (None, Some(target)) => IterationPolicy::Adaptive {
                target: target.resolve(&name)?,
                max_iterations: entry
                    .max_iterations
                    .or(defaults.max_iterations)
                    .map(|n| positive_count(&name, n))
                    .transpose()?,
            },
            (None, None) => IterationPolicy::Fixed(positive_count(
                &name,
                defaults.iterations.unwrap_or(DEFAULT_ITERATIONS),
            )?),
        };

        let extraction_pattern = entry
            .pattern
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| compile_pattern(&name, p))
            .transpose()?;

        let timeout = entry
            .timeout
            .as_ref()
            .or(defaults.timeout.as_ref())
            .map(|t| t.resolve(&name))
            .transpose()?;

        benchmarks.push(BenchmarkDefinition {
            name,
            command: entry.command,
            arguments: entry.args.map(ArgsValue::into_vec).unwrap_or_default(),
            extraction_pattern,
            iteration_policy,
            timeout,
        });
    }

    Ok(Catalog {
        benchmarks,
        on_failure: defaults.on_failure.unwrap_or_default(),
    })
}

fn positive_count(name: &str, n: i64) -> Result<u64, MpibenchError> {
    if n < 1 {
        return Err(MpibenchError::InvalidIterations {
            name: name.to_string(),
        });
    }
    Ok(n as u64)
}

/// Find a catalog: `mpibench.toml` in `start` or an ancestor, then the user
/// config directory.
pub fn discover(start: &Path) -> Result<PathBuf, MpibenchError> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CATALOG_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    dirs::config_dir()
        .map(|d| d.join("mpibench").join("catalog.toml"))
        .filter(|p| p.is_file())
        .ok_or(MpibenchError::CatalogNotFound)
}
