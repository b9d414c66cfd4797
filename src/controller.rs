use tracing::info;

use crate::errors::MpibenchError;
use crate::execute::Executor;
use crate::extract::extract;
use crate::types::{BenchmarkDefinition, ExecutionSample, IterationPolicy};

/// How many times to run a benchmark, plus the calibration sample if one was
/// taken. The calibration sample counts as the first of `count` iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationPlan {
    pub count: u64,
    pub calibration: Option<ExecutionSample>,
}

/// Run `definition` once through `executor` and build its sample.
pub fn run_once<E: Executor + ?Sized>(
    definition: &BenchmarkDefinition,
    executor: &mut E,
) -> Result<ExecutionSample, MpibenchError> {
    let run = executor.execute(
        &definition.command,
        &definition.arguments,
        definition.timeout,
    )?;
    Ok(extract(
        &run.stdout,
        definition.extraction_pattern.as_ref(),
        run.overall_seconds,
    ))
}

/// Iterations that fit into `target_seconds` given one run took
/// `calibration_seconds`. Always at least 1, and at most `max` when set.
pub fn adaptive_count(target_seconds: f64, calibration_seconds: f64, max: Option<u64>) -> u64 {
    let ratio = (target_seconds / calibration_seconds).floor();
    let count = if ratio.is_finite() {
        // `as` saturates for values beyond u64::MAX
        ratio as u64
    } else {
        max.unwrap_or(1)
    };

    let count = count.max(1);
    match max {
        Some(max) => count.min(max.max(1)),
        None => count,
    }
}

/// Decide the iteration count for `definition`.
///
/// Adaptive benchmarks are executed once here to measure a representative
/// runtime; that run is returned so the caller can keep it.
pub fn decide_iterations<E: Executor + ?Sized>(
    definition: &BenchmarkDefinition,
    executor: &mut E,
) -> Result<IterationPlan, MpibenchError> {
    match &definition.iteration_policy {
        IterationPolicy::Fixed(count) => {
            if *count == 0 {
                return Err(MpibenchError::InvalidIterations {
                    name: definition.name.clone(),
                });
            }
            Ok(IterationPlan {
                count: *count,
                calibration: None,
            })
        }
        IterationPolicy::Adaptive {
            target,
            max_iterations,
        } => {
            let calibration = run_once(definition, executor)?;
            let count = adaptive_count(
                target.as_secs_f64(),
                calibration.overall_seconds,
                *max_iterations,
            );
            info!(
                benchmark = %definition.name,
                calibration_seconds = calibration.overall_seconds,
                count,
                "calibrated iteration count"
            );
            Ok(IterationPlan {
                count,
                calibration: Some(calibration),
            })
        }
    }
}
