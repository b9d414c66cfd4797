use regex::Regex;

use crate::errors::MpibenchError;
use crate::types::ExecutionSample;

/// Compile an extraction pattern for benchmark `name`.
///
/// The pattern must have exactly one capture group, which is expected to hold
/// the application-reported runtime in seconds.
pub fn compile_pattern(name: &str, pattern: &str) -> Result<Regex, MpibenchError> {
    let re = Regex::new(pattern).map_err(|e| MpibenchError::InvalidPattern {
        name: name.to_string(),
        detail: e.to_string(),
    })?;

    // captures_len counts the implicit whole-match group
    let groups = re.captures_len() - 1;
    if groups != 1 {
        return Err(MpibenchError::InvalidPattern {
            name: name.to_string(),
            detail: format!("expected exactly one capture group, found {}", groups),
        });
    }

    Ok(re)
}

/// Build the sample for one run from its captured stdout.
///
/// Lines are scanned in order and the first one whose capture parses as a
/// finite float wins. Without a pattern, or when no line yields one, the
/// sample carries no inner/start timings.
pub fn extract(output: &str, pattern: Option<&Regex>, overall_seconds: f64) -> ExecutionSample {
    let Some(re) = pattern else {
        return ExecutionSample::overall_only(overall_seconds);
    };

    for line in output.lines() {
        if let Some(caps) = re.captures(line)
            && let Some(group) = caps.get(1)
            && let Ok(inner) = group.as_str().trim().parse::<f64>()
            && inner.is_finite()
        {
            return ExecutionSample::with_inner(overall_seconds, inner);
        }
    }

    ExecutionSample::overall_only(overall_seconds)
}
