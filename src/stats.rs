use crate::errors::MpibenchError;
use crate::types::{Aggregate, AggregatedStat, ExecutionSample};

/// Mean, population variance and standard deviation of `values`.
///
/// Two passes: the mean first, then the squared deviations from it.
/// `values` must be non-empty.
pub fn describe(values: &[f64]) -> AggregatedStat {
    let n = values.len() as f64;
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    // Rounding in the sum can land the mean just outside [min, max], which
    // would give a run of identical values a tiny non-zero variance.
    let mut mean = values.iter().sum::<f64>() / n;
    if mean < min {
        mean = min;
    } else if mean > max {
        mean = max;
    }
    let variance = values.iter().map(|v| (mean - v).powi(2)).sum::<f64>() / n;

    AggregatedStat {
        mean,
        variance,
        stdev: variance.sqrt(),
    }
}

/// Reduce every sample of one benchmark to per-metric statistics.
///
/// Inner and startup times are aggregated only when every sample carries
/// them. A sample set where some runs matched the extraction pattern and
/// others did not is rejected instead of averaged.
pub fn aggregate(samples: &[ExecutionSample]) -> Result<Aggregate, MpibenchError> {
    if samples.is_empty() {
        return Err(MpibenchError::NoSamples);
    }

    let overall: Vec<f64> = samples.iter().map(|s| s.overall_seconds).collect();
    let inner: Vec<f64> = samples.iter().filter_map(|s| s.inner_seconds).collect();
    let start: Vec<f64> = samples.iter().filter_map(|s| s.start_seconds).collect();

    let (inner, start) = if inner.is_empty() {
        (None, None)
    } else if inner.len() == samples.len() && start.len() == samples.len() {
        (Some(describe(&inner)), Some(describe(&start)))
    } else {
        return Err(MpibenchError::InconsistentSamples {
            defined: inner.len(),
            total: samples.len(),
        });
    };

    Ok(Aggregate {
        overall: describe(&overall),
        inner,
        start,
    })
}
