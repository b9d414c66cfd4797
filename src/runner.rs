use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::controller::{decide_iterations, run_once};
use crate::errors::{MpibenchError, error_chain};
use crate::execute::Executor;
use crate::stats::aggregate;
use crate::types::{BenchmarkDefinition, BenchmarkResult, ExecutionSample, Failure, FailurePolicy};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub on_failure: FailurePolicy,
    pub show_progress: bool,
}

/// Everything a catalog run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub results: Vec<BenchmarkResult>,
    pub failures: Vec<Failure>,
}

/// Runs every benchmark of a catalog in order, one process at a time.
pub struct Runner<E> {
    executor: E,
    options: RunOptions,
}

impl<E: Executor> Runner<E> {
    pub fn new(executor: E, options: RunOptions) -> Self {
        Self { executor, options }
    }

    /// Run the whole catalog. `on_result` sees each row as soon as it is ready.
    ///
    /// Under [`FailurePolicy::Abort`] the first failing benchmark ends the run
    /// with an error naming it; under [`FailurePolicy::Skip`] it is recorded in
    /// the summary and the next benchmark starts.
    pub fn run(
        &mut self,
        catalog: &Catalog,
        mut on_result: impl FnMut(&BenchmarkResult),
    ) -> Result<RunSummary, MpibenchError> {
        let mut summary = RunSummary::default();

        for definition in &catalog.benchmarks {
            match self.run_benchmark(definition) {
                Ok(result) => {
                    on_result(&result);
                    summary.results.push(result);
                }
                Err(source) => {
                    let command = definition.command_line();
                    if self.options.on_failure == FailurePolicy::Abort {
                        return Err(MpibenchError::BenchmarkFailed {
                            name: definition.name.clone(),
                            command,
                            source: Box::new(source),
                        });
                    }
                    let message = error_chain(&source);
                    warn!(benchmark = %definition.name, %command, "skipping: {}", message);
                    summary.failures.push(Failure {
                        name: definition.name.clone(),
                        command,
                        message,
                    });
                }
            }
        }

        Ok(summary)
    }

    /// Calibrate if needed, execute every iteration, and aggregate.
    pub fn run_benchmark(
        &mut self,
        definition: &BenchmarkDefinition,
    ) -> Result<BenchmarkResult, MpibenchError> {
        info!(benchmark = %definition.name, policy = %definition.iteration_policy, "executing");

        let plan = decide_iterations(definition, &mut self.executor)?;
        let progress = self.progress_bar(definition, plan.count);

        let mut samples: Vec<ExecutionSample> =
            Vec::with_capacity(plan.count.min(1024) as usize);
        if let Some(calibration) = plan.calibration {
            samples.push(calibration);
            progress.inc(1);
        }

        while (samples.len() as u64) < plan.count {
            let sample = match run_once(definition, &mut self.executor) {
                Ok(sample) => sample,
                Err(err) => {
                    progress.abandon();
                    return Err(err);
                }
            };
            debug!(
                benchmark = %definition.name,
                iteration = samples.len(),
                overall = sample.overall_seconds,
                inner = ?sample.inner_seconds,
                "sample"
            );
            samples.push(sample);
            progress.inc(1);
        }
        progress.finish_and_clear();

        let stats = aggregate(&samples)?;
        Ok(BenchmarkResult {
            name: definition.name.clone(),
            iterations: samples.len(),
            overall: stats.overall,
            inner: stats.inner,
            start: stats.start,
        })
    }

    fn progress_bar(&self, definition: &BenchmarkDefinition, count: u64) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(count);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(definition.name.clone());
        pb
    }

    pub fn into_executor(self) -> E {
        self.executor
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use super::*;
    use crate::extract::compile_pattern;
    use crate::types::{IterationPolicy, RawRun};

    /// Replays canned runs and records every invocation.
    #[derive(Default)]
    struct MockExecutor {
        script: VecDeque<Result<RawRun, MpibenchError>>,
        fallback_seconds: f64,
        calls: Vec<String>,
    }

    impl MockExecutor {
        fn constant(seconds: f64) -> Self {
            Self {
                fallback_seconds: seconds,
                ..Default::default()
            }
        }

        fn push(mut self, overall_seconds: f64, stdout: &str) -> Self {
            self.script.push_back(Ok(RawRun {
                overall_seconds,
                stdout: stdout.to_string(),
            }));
            self
        }

        fn push_err(mut self, err: MpibenchError) -> Self {
            self.script.push_back(Err(err));
            self
        }
    }

    impl Executor for MockExecutor {
        fn execute(
            &mut self,
            command: &str,
            _arguments: &[String],
            _timeout: Option<Duration>,
        ) -> Result<RawRun, MpibenchError> {
            self.calls.push(command.to_string());
            self.script.pop_front().unwrap_or_else(|| {
                Ok(RawRun {
                    overall_seconds: self.fallback_seconds,
                    stdout: String::new(),
                })
            })
        }
    }

    fn definition(name: &str, policy: IterationPolicy, pattern: Option<&str>) -> BenchmarkDefinition {
        BenchmarkDefinition {
            name: name.to_string(),
            command: format!("./{}.sh", name),
            arguments: vec!["64".to_string()],
            extraction_pattern: pattern.map(|p| compile_pattern(name, p).unwrap()),
            iteration_policy: policy,
            timeout: None,
        }
    }

    fn catalog(benchmarks: Vec<BenchmarkDefinition>, on_failure: FailurePolicy) -> Catalog {
        Catalog {
            benchmarks,
            on_failure,
        }
    }

    fn options(on_failure: FailurePolicy) -> RunOptions {
        RunOptions {
            on_failure,
            show_progress: false,
        }
    }

    fn failure(command: &str) -> MpibenchError {
        MpibenchError::LaunchFailure {
            command: command.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        }
    }

    #[test]
    fn fixed_five_constant_runs() {
        let mut runner = Runner::new(MockExecutor::constant(1.0), options(FailurePolicy::Abort));
        let def = definition("sp", IterationPolicy::Fixed(5), None);
        let result = runner.run_benchmark(&def).unwrap();

        assert_eq!(result.iterations, 5);
        assert_eq!(result.overall.mean, 1.0);
        assert_eq!(result.overall.variance, 0.0);
        assert_eq!(result.overall.stdev, 0.0);
        assert!(result.inner.is_none());
        assert!(result.start.is_none());
        assert_eq!(runner.into_executor().calls.len(), 5);
    }

    #[test]
    fn adaptive_includes_calibration_sample() {
        let exec = MockExecutor::default()
            .push(2.0, "")
            .push(2.0, "")
            .push(2.0, "")
            .push(2.0, "")
            .push(2.0, "");
        let mut runner = Runner::new(exec, options(FailurePolicy::Abort));
        let def = definition(
            "bt",
            IterationPolicy::Adaptive {
                target: Duration::from_secs(10),
                max_iterations: None,
            },
            None,
        );
        let result = runner.run_benchmark(&def).unwrap();

        assert_eq!(result.iterations, 5);
        assert_eq!(runner.into_executor().calls.len(), 5);
    }

    #[test]
    fn calibration_value_is_aggregated() {
        // Calibration 4s, target 12s: three runs, the first being calibration.
        let exec = MockExecutor::default()
            .push(4.0, "")
            .push(1.0, "")
            .push(1.0, "");
        let mut runner = Runner::new(exec, options(FailurePolicy::Abort));
        let def = definition(
            "lu",
            IterationPolicy::Adaptive {
                target: Duration::from_secs(12),
                max_iterations: None,
            },
            None,
        );
        let result = runner.run_benchmark(&def).unwrap();
        assert_eq!(result.iterations, 3);
        assert_eq!(result.overall.mean, 2.0);
    }

    #[test]
    fn inner_and_start_are_extracted() {
        let exec = MockExecutor::default()
            .push(3.0, "Time in seconds = 2.00\n")
            .push(5.0, "Time in seconds = 4.00\n");
        let mut runner = Runner::new(exec, options(FailurePolicy::Abort));
        let def = definition(
            "sp",
            IterationPolicy::Fixed(2),
            Some(r"Time in seconds\s=\s*(\d+\.\d+)"),
        );
        let result = runner.run_benchmark(&def).unwrap();

        assert_eq!(result.overall.mean, 4.0);
        assert_eq!(result.inner.unwrap().mean, 3.0);
        assert_eq!(result.inner.unwrap().variance, 1.0);
        assert_eq!(result.start.unwrap().mean, 1.0);
        assert_eq!(result.start.unwrap().stdev, 0.0);
    }

    #[test]
    fn runs_catalog_in_order_and_emits_rows() {
        let mut runner = Runner::new(MockExecutor::constant(0.5), options(FailurePolicy::Abort));
        let cat = catalog(
            vec![
                definition("b", IterationPolicy::Fixed(2), None),
                definition("a", IterationPolicy::Fixed(3), None),
            ],
            FailurePolicy::Abort,
        );
        let mut emitted = Vec::new();
        let summary = runner.run(&cat, |r| emitted.push(r.name.clone())).unwrap();

        assert_eq!(emitted, ["b", "a"]);
        assert_eq!(summary.results.len(), 2);
        assert!(summary.failures.is_empty());
        let calls = runner.into_executor().calls;
        assert_eq!(calls, ["./b.sh", "./b.sh", "./a.sh", "./a.sh", "./a.sh"]);
    }

    #[test]
    fn abort_stops_on_first_failure() {
        let exec = MockExecutor::constant(1.0).push(1.0, "").push_err(failure("./first.sh"));
        let mut runner = Runner::new(exec, options(FailurePolicy::Abort));
        let cat = catalog(
            vec![
                definition("first", IterationPolicy::Fixed(3), None),
                definition("second", IterationPolicy::Fixed(1), None),
            ],
            FailurePolicy::Abort,
        );
        let mut emitted = 0;
        let err = runner.run(&cat, |_| emitted += 1).unwrap_err();

        assert_eq!(emitted, 0);
        let msg = err.to_string();
        assert!(msg.contains("'first'"), "{msg}");
        assert!(msg.contains("./first.sh 64"), "{msg}");
        assert_eq!(runner.into_executor().calls.len(), 2);
    }

    #[test]
    fn skip_records_failure_and_continues() {
        let exec = MockExecutor::constant(1.0).push_err(failure("./first.sh"));
        let mut runner = Runner::new(exec, options(FailurePolicy::Skip));
        let cat = catalog(
            vec![
                definition("first", IterationPolicy::Fixed(3), None),
                definition("second", IterationPolicy::Fixed(2), None),
            ],
            FailurePolicy::Skip,
        );
        let summary = runner.run(&cat, |_| {}).unwrap();

        assert_eq!(summary.results.len(), 1);
        assert_eq!(summary.results[0].name, "second");
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].name, "first");
        assert_eq!(summary.failures[0].command, "./first.sh 64");
        assert!(summary.failures[0].message.contains("Could not launch"));
        assert!(summary.failures[0].message.ends_with("not found"));
    }

    #[test]
    fn calibration_failure_is_a_benchmark_failure() {
        let exec = MockExecutor::default().push_err(failure("./cg.sh"));
        let mut runner = Runner::new(exec, options(FailurePolicy::Abort));
        let cat = catalog(
            vec![definition(
                "cg",
                IterationPolicy::Adaptive {
                    target: Duration::from_secs(1),
                    max_iterations: None,
                },
                None,
            )],
            FailurePolicy::Abort,
        );
        let err = runner.run(&cat, |_| {}).unwrap_err();
        assert!(matches!(err, MpibenchError::BenchmarkFailed { .. }));
    }

    #[test]
    fn flaky_extraction_is_reported() {
        let exec = MockExecutor::default()
            .push(1.0, "Time in seconds = 0.50\n")
            .push(1.0, "crashed before printing\n");
        let mut runner = Runner::new(exec, options(FailurePolicy::Abort));
        let def = definition(
            "ft",
            IterationPolicy::Fixed(2),
            Some(r"Time in seconds\s=\s*(\d+\.\d+)"),
        );
        let err = runner.run_benchmark(&def).unwrap_err();
        assert!(matches!(err, MpibenchError::InconsistentSamples { defined: 1, total: 2 }));
    }
}
