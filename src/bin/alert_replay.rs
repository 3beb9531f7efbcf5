//! alert_replay - run a recorded detection trace through the alert engine
//!
//! Reads JSON lines (`{"t": secs, "detections": [...]}`) from a file or stdin
//! and prints every raise/extend/clear the live daemon would have produced.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use firewatch::{read_trace, replay, AlertPolicy, AlertTransition};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Trace file (JSON lines). Reads stdin when omitted or "-".
    trace: Option<PathBuf>,
    /// Print the full report as JSON.
    #[arg(long)]
    json: bool,
    /// Minimum confidence for a detection to count.
    #[arg(long, env = "FIREWATCH_CONFIDENCE_THRESHOLD")]
    threshold: Option<f32>,
    /// Monitored labels, comma separated.
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<String>>,
    /// Debounce window in seconds.
    #[arg(long)]
    window: Option<f64>,
    /// Positive frames required inside the window.
    #[arg(long)]
    min_detections: Option<usize>,
    /// Seconds the alert holds after the last positive frame.
    #[arg(long)]
    hold: Option<f64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut policy = AlertPolicy::default();
    if let Some(threshold) = args.threshold {
        policy.confidence_threshold = threshold;
    }
    if let Some(labels) = args.labels {
        policy.labels = labels
            .into_iter()
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect();
    }
    if let Some(window) = args.window {
        policy.window_secs = window;
    }
    if let Some(min_detections) = args.min_detections {
        policy.min_detections = min_detections;
    }
    if let Some(hold) = args.hold {
        policy.hold_secs = hold;
    }

    let records = match args.trace.as_ref().filter(|path| path.as_os_str() != "-") {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open trace {}", path.display()))?;
            read_trace(BufReader::new(file))?
        }
        None => read_trace(io::stdin().lock())?,
    };
    log::info!("replaying {} frames", records.len());

    let report = replay(&records, &policy)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for record in &report.transitions {
        match record.transition {
            AlertTransition::Raised => println!(
                "frame {:>6}  t={:>9.3}s  RAISED    expires_at={:.3}s window={}",
                record.frame, record.t, record.expires_at, record.window_count
            ),
            AlertTransition::Extended => println!(
                "frame {:>6}  t={:>9.3}s  extended  expires_at={:.3}s",
                record.frame, record.t, record.expires_at
            ),
            AlertTransition::Cleared => println!(
                "frame {:>6}  t={:>9.3}s  CLEARED",
                record.frame, record.t
            ),
            AlertTransition::Unchanged => {}
        }
    }
    println!(
        "{} frames, {} positive, final alert: {}",
        report.frames,
        report.positive_frames,
        if report.final_status.active { "ACTIVE" } else { "inactive" }
    );
    Ok(())
}
