/// Starter catalog printed by `mpibench init`.
pub const CATALOG_TEMPLATE: &str = r#"# mpibench catalog
#
# Benchmarks run in the order listed here, one process at a time.

[defaults]
# Iterations for benchmarks that set neither `iterations` nor `target_time`
iterations = 10
# Kill a run that takes longer than this (uncomment to enable)
# timeout = "30m"
# Upper bound for adaptive benchmarks (uncomment to enable)
# max_iterations = 100
# "abort" stops everything on the first failed run, "skip" moves on
on_failure = "abort"

[[benchmark]]
name = "SP.C.64 (sp/suspend_ib_integration)"
command = "./ib_integration.sh"
# A single string is split on whitespace; use an array to keep spaces
args = "64 2,3 /opt/NPB3.3-MPI/bin/sp.B.64"
# One capture group holding the runtime the application reports
pattern = 'Time in seconds\s=\s*(\d+\.\d+)'
iterations = 10

[[benchmark]]
name = "SP.C.64 (master)"
command = "./master.sh"
args = ["64", "2,3", "/opt/NPB3.3-MPI/bin/sp.B.64"]
pattern = 'Time in seconds\s=\s*(\d+\.\d+)'
# Calibrate with one run, then repeat to fill roughly this much time
target_time = "10m"
"#;

/// Writes the starter catalog to stdout.
pub fn print_catalog_template() {
    print!("{}", CATALOG_TEMPLATE);
}
