use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use regex::Regex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mpibench::catalog::{self, Catalog};
use mpibench::display;
use mpibench::execute::ProcessExecutor;
use mpibench::runner::{RunOptions, Runner};
use mpibench::template;
use mpibench::types::{FailurePolicy, OutputFormat};

#[derive(Parser)]
#[command(name = "mpibench", version, about = "Repeatedly run benchmark commands and report timing statistics")]
struct Cli {
    /// "init" prints a starter catalog; omit to run the catalog
    command: Option<String>,

    /// Catalog file (default: mpibench.toml here or in a parent directory)
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    #[arg(long, default_value = "table")]
    format: OutputFormat,

    #[arg(long)]
    json: bool,

    /// Overrides `on_failure` from the catalog
    #[arg(long)]
    on_failure: Option<FailurePolicy>,

    /// Per-run timeout such as "90s" or "5m", overriding the catalog
    #[arg(long)]
    timeout: Option<String>,

    /// Only run benchmarks whose name matches this regex
    #[arg(short, long)]
    filter: Option<String>,

    /// List the benchmarks that would run, without running them
    #[arg(long)]
    list: bool,

    /// Hide progress bars
    #[arg(short, long)]
    quiet: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "mpibench=debug" } else { "mpibench=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_catalog(cli: &Cli) -> Result<Catalog> {
    let path = match &cli.catalog {
        Some(path) => path.clone(),
        None => {
            let cwd = std::env::current_dir().context("Could not determine current directory")?;
            catalog::discover(&cwd)?
        }
    };
    info!(path = %path.display(), "loading catalog");

    let mut catalog = Catalog::load(&path)?;

    if let Some(pattern) = &cli.filter {
        let re = Regex::new(pattern).with_context(|| format!("Invalid --filter regex '{}'", pattern))?;
        catalog = catalog.filtered(&re);
        if catalog.is_empty() {
            anyhow::bail!("No benchmarks match filter '{}'", pattern);
        }
    }

    if let Some(timeout) = &cli.timeout {
        let seconds = catalog::parse_duration(timeout)
            .map_err(|e| anyhow::anyhow!("Invalid --timeout '{}': {}", timeout, e))?;
        if !seconds.is_finite() || seconds <= 0.0 {
            anyhow::bail!("Invalid --timeout '{}': must be positive", timeout);
        }
        let limit = Duration::try_from_secs_f64(seconds)
            .with_context(|| format!("Invalid --timeout '{}'", timeout))?;
        catalog = catalog.with_timeout(limit);
    }

    Ok(catalog)
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.as_deref() {
        Some("init") => {
            template::print_catalog_template();
            return Ok(());
        }
        Some(other) => {
            anyhow::bail!("Unknown command '{}'. Usage: mpibench [init] [OPTIONS]", other);
        }
        None => {}
    }

    let catalog = load_catalog(&cli)?;

    if cli.list {
        print!("{}", display::format_listing(&catalog));
        return Ok(());
    }

    let options = RunOptions {
        on_failure: cli.on_failure.unwrap_or(catalog.on_failure),
        show_progress: !cli.quiet,
    };
    let mut runner = Runner::new(ProcessExecutor, options);
    let summary = runner.run(&catalog, |result| {
        info!(
            benchmark = %result.name,
            iterations = result.iterations,
            mean = result.overall.mean,
            "done"
        );
    })?;

    let output = if cli.json {
        display::format_json(&summary.results, &summary.failures, Utc::now())
    } else {
        match cli.format {
            OutputFormat::Table => display::format_table(&summary.results, &summary.failures),
            OutputFormat::Full => display::format_full(&summary.results, &summary.failures),
        }
    };

    print!("{}", output);
    if cli.json {
        println!();
    }

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }
}
