//! procwatch entrypoint: `monitor` samples a process into a series file,
//! `analyze` flags anomalies in a series, `audit` pulls the system log
//! around each anomaly. `monitor --report-dir` runs all three stages.

use clap::{Args, Parser, Subcommand};
use procwatch::{
    audit::{AuditCorrelator, SystemLogSource},
    collectors::SysinfoSource,
    config::{DetectionRule, MonitorConfig},
    detector::{HourWindow, Metric, ThresholdPolicy},
    error::{AgentError, ConfigError, StorageError},
    locator::RestartPolicy,
    logging::StructuredLogger,
    monitor::Monitor,
    pipeline,
    storage::{self, SeriesWriter},
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

const CONFIG_ENV: &str = "PROCWATCH_CONFIG_PATH";
const DEFAULT_CONFIG: &str = "procwatch.json";

#[derive(Parser)]
#[command(name = "procwatch", version, about = "Sample a process, flag anomalies, audit its logs")]
struct Cli {
    /// JSON config file [default: $PROCWATCH_CONFIG_PATH or procwatch.json]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sample a process until it exits or Ctrl+C
    Monitor(MonitorArgs),
    /// Detect anomalies in a series file
    Analyze(AnalyzeArgs),
    /// Correlate anomalies with the system log
    Audit(AuditArgs),
}

#[derive(Args)]
struct MonitorArgs {
    /// Process name to monitor
    #[arg(short, long, conflicts_with = "pid")]
    name: Option<String>,

    /// Process id to monitor
    #[arg(short, long)]
    pid: Option<u32>,

    /// Seconds between samples
    #[arg(short, long)]
    interval: Option<f64>,

    /// Series file to write
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after this many samples
    #[arg(long)]
    max_samples: Option<u64>,

    /// Classify each sample as it arrives
    #[arg(long)]
    online: bool,

    /// Follow the process name across restarts
    #[arg(long)]
    reacquire: bool,

    /// Analyze and audit into this directory when the run ends
    #[arg(long)]
    report_dir: Option<PathBuf>,

    #[command(flatten)]
    detection: DetectionArgs,

    #[command(flatten)]
    window: WindowArgs,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Series file to read
    #[arg(short, long)]
    input: PathBuf,

    /// Report directory
    #[arg(short, long, default_value = "reports")]
    output: PathBuf,

    #[command(flatten)]
    detection: DetectionArgs,
}

#[derive(Args)]
struct AuditArgs {
    /// Anomaly file to read
    #[arg(short, long, default_value = "reports/anomalies.csv")]
    input: PathBuf,

    /// Report directory
    #[arg(short, long, default_value = "audit")]
    output: PathBuf,

    #[command(flatten)]
    window: WindowArgs,
}

#[derive(Args)]
struct DetectionArgs {
    /// Fixed CPU limit in percent
    #[arg(long)]
    cpu_threshold: Option<f64>,

    /// k in mean ± k·std_dev for every statistical rule
    #[arg(long)]
    multiplier: Option<f64>,

    /// CPU percent below which nothing is flagged as high
    #[arg(long)]
    cpu_floor: Option<f64>,

    /// Extra baseline over these hours, e.g. 9-17
    #[arg(long)]
    business_hours: Option<HourWindow>,
}

#[derive(Args)]
struct WindowArgs {
    /// Seconds of log before each anomaly
    #[arg(long)]
    lead: Option<u64>,

    /// Seconds of log after each anomaly
    #[arg(long)]
    lag: Option<u64>,

    /// Seconds before a log query is abandoned
    #[arg(long)]
    log_timeout: Option<u64>,
}

impl DetectionArgs {
    fn apply(&self, config: &mut MonitorConfig) {
        let rules = &mut config.detection.rules;
        if let Some(limit) = self.cpu_threshold {
            let fixed_cpu = rules.iter_mut().find(|r| {
                r.metric == Metric::Cpu && matches!(r.policy, ThresholdPolicy::Fixed { .. })
            });
            match fixed_cpu {
                Some(rule) => rule.policy = ThresholdPolicy::Fixed { limit },
                None => rules.push(DetectionRule {
                    metric: Metric::Cpu,
                    policy: ThresholdPolicy::Fixed { limit },
                }),
            }
        }
        for rule in rules.iter_mut() {
            if let ThresholdPolicy::Statistical { multiplier, floor } = &mut rule.policy {
                if let Some(k) = self.multiplier {
                    *multiplier = k;
                }
                if rule.metric == Metric::Cpu && self.cpu_floor.is_some() {
                    *floor = self.cpu_floor;
                }
            }
        }
        if self.business_hours.is_some() {
            config.detection.business_hours = self.business_hours;
        }
    }
}

impl WindowArgs {
    fn apply(&self, config: &mut MonitorConfig) {
        if let Some(lead) = self.lead {
            config.audit.lead_secs = lead;
        }
        if let Some(lag) = self.lag {
            config.audit.lag_secs = lag;
        }
        if let Some(t) = self.log_timeout {
            config.audit.timeout_secs = t;
        }
    }
}

impl MonitorArgs {
    fn apply(&self, config: &mut MonitorConfig) {
        // A selector on the command line replaces the file's selector.
        if self.name.is_some() || self.pid.is_some() {
            config.target.name = self.name.clone();
            config.target.pid = self.pid;
        }
        if self.reacquire {
            config.target.restart = RestartPolicy::Reacquire;
        }
        if let Some(i) = self.interval {
            config.sampling.interval_secs = i;
        }
        if self.max_samples.is_some() {
            config.sampling.max_samples = self.max_samples;
        }
        if self.online {
            config.sampling.online_detection = true;
        }
        if self.output.is_some() {
            config.output.series_path = self.output.clone();
        }
        if self.report_dir.is_some() {
            config.output.report_dir = self.report_dir.clone();
        }
        self.detection.apply(config);
        self.window.apply(config);
    }
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

fn emit_summary(value: &serde_json::Value) -> Result<(), AgentError> {
    let mut out = std::io::stdout().lock();
    StructuredLogger::emit_json(value, &mut out).map_err(|e| StorageError::io("<stdout>", e))?;
    Ok(())
}

fn log_source(config: &MonitorConfig) -> Result<SystemLogSource, AgentError> {
    let timeout = config.audit.timeout();
    let source = match config.audit.log_command.as_deref() {
        Some([program, args @ ..]) => {
            SystemLogSource::with_command(program.clone(), args.to_vec(), timeout)
        }
        _ => SystemLogSource::new(timeout),
    };
    source.map_err(AgentError::LogSource)
}

fn run_monitor(mut config: MonitorConfig, args: &MonitorArgs) -> Result<(), AgentError> {
    args.apply(&mut config);
    let warnings = config.validate()?;
    for w in &warnings {
        warn!(warning = %w, "configuration warning");
        eprintln!("warning: {}", w);
    }
    let series_path = config
        .output
        .series_path
        .clone()
        .ok_or(ConfigError::InvalidValue {
            field: "output.series_path",
            reason: "an output file is required (-o)".to_string(),
        })?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))?;
    }

    let mut monitor = Monitor::new(&config, SysinfoSource::new())?;
    monitor.attach()?;
    let run = {
        let mut writer = SeriesWriter::create(&series_path)?;
        monitor.run(&mut writer, &stop)?
    };
    info!(path = %series_path.display(), samples = run.summary.samples, "series written");
    emit_summary(&serde_json::json!({
        "series": series_path,
        "summary": run.summary,
    }))?;

    if let Some(dir) = &config.output.report_dir {
        let analysis = pipeline::analyze(run.series.samples(), &config.detection, dir)?;
        let source = log_source(&config)?;
        let correlator = AuditCorrelator::from_config(&config.audit);
        let report = pipeline::audit(&analysis.anomalies, 0, &correlator, &source, dir)?;
        emit_summary(&serde_json::json!({
            "anomalies": analysis.anomalies.len(),
            "audited": report.anomalies.len(),
            "report_dir": dir,
        }))?;
    }
    Ok(())
}

fn run_analyze(mut config: MonitorConfig, args: &AnalyzeArgs) -> Result<(), AgentError> {
    args.detection.apply(&mut config);
    config.validate_analysis()?;
    let samples = storage::read_series_file(&args.input)?;
    info!(path = %args.input.display(), samples = samples.len(), "series loaded");
    let out = pipeline::analyze(&samples, &config.detection, &args.output)?;
    emit_summary(&serde_json::json!({
        "samples": samples.len(),
        "anomalies": out.anomalies.len(),
        "outcomes": out.report.summaries(),
        "file": args.output.join(storage::ANOMALIES_FILE),
    }))
}

fn run_audit(mut config: MonitorConfig, args: &AuditArgs) -> Result<(), AgentError> {
    args.window.apply(&mut config);
    config.validate_analysis()?;
    let load = storage::read_anomalies_file(&args.input)?;
    info!(
        path = %args.input.display(),
        anomalies = load.anomalies.len(),
        rejected = load.rejected.len(),
        "anomalies loaded"
    );
    let source = log_source(&config)?;
    let correlator = AuditCorrelator::from_config(&config.audit);
    let report = pipeline::audit(
        &load.anomalies,
        load.rejected.len(),
        &correlator,
        &source,
        &args.output,
    )?;
    emit_summary(&serde_json::json!({
        "audited": report.anomalies.len(),
        "skipped": report.skipped,
        "file": args.output.join(storage::AUDIT_FILE),
    }))
}

fn run(cli: Cli) -> Result<(), AgentError> {
    let path = config_path(&cli);
    let config = MonitorConfig::load(&path)?;
    StructuredLogger::init(config.log.json || cli.json_logs, &config.log.level);
    info!(config = %display_path(&path), "procwatch starting");

    match &cli.command {
        Command::Monitor(args) => run_monitor(config, args),
        Command::Analyze(args) => run_analyze(config, args),
        Command::Audit(args) => run_audit(config, args),
    }
}

fn display_path(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (absent, defaults)", path.display())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
