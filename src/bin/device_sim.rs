//! ==============================================================================
//! device_sim.rs - synthetic devices pushing positions to a tracker
//! ==============================================================================
//!
//! purpose:
//!     drives a running tracker the way phone tracking apps do, for demos and
//!     manual load checks. each simulated device walks a small circle and
//!     reports every interval, alternating between the encodings real
//!     clients use (json body, form body, query string).
//!
//! usage:
//!     device-sim [--url http://127.0.0.1:5000] [--devices 3]
//!                [--interval-secs 5] [--count 0]
//!
//!     --count 0 keeps reporting until interrupted.
//!
//! ==============================================================================

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use device_tracker::logging::init_tracing;

const CENTER: (f64, f64) = (35.389062, -1.0950887);
// roughly 100 m of latitude
const RADIUS_DEG: f64 = 0.0009;

#[derive(Debug)]
struct SimArgs {
    url: String,
    devices: usize,
    interval: Duration,
    count: u64,
}

impl Default for SimArgs {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:5000".to_string(),
            devices: 3,
            interval: Duration::from_secs(5),
            count: 0,
        }
    }
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<SimArgs> {
    let mut parsed = SimArgs::default();
    while let Some(flag) = args.next() {
        let mut value = || args.next().ok_or_else(|| anyhow!("{flag} needs a value"));
        match flag.as_str() {
            "--url" => parsed.url = value()?.trim_end_matches('/').to_string(),
            "--devices" => parsed.devices = value()?.parse().context("--devices")?,
            "--interval-secs" => {
                let secs = value()?.parse().context("--interval-secs")?;
                parsed.interval = Duration::from_secs(secs);
            }
            "--count" => parsed.count = value()?.parse().context("--count")?,
            other => bail!("unknown argument {other}"),
        }
    }
    if parsed.devices == 0 {
        bail!("--devices must be at least 1");
    }
    Ok(parsed)
}

/// position of device `n` at step `tick`
fn position(n: usize, tick: u64) -> (f64, f64) {
    let phase = n as f64 * 0.7 + tick as f64 * 0.15;
    (CENTER.0 + RADIUS_DEG * phase.sin(), CENTER.1 + RADIUS_DEG * phase.cos())
}

async fn report(client: &reqwest::Client, url: &str, n: usize, tick: u64) -> Result<()> {
    let id = format!("sim-{n}");
    let (lat, lon) = position(n, tick);
    let battery = 100u64.saturating_sub(tick % 100);
    let timestamp = chrono::Utc::now().timestamp().to_string();

    let fields = [
        ("id", id),
        ("lat", lat.to_string()),
        ("lon", lon.to_string()),
        ("batt", battery.to_string()),
        ("speed", "1.4".to_string()),
        ("accuracy", "8.0".to_string()),
        ("timestamp", timestamp),
    ];

    let endpoint = format!("{url}/update");
    let request = match (n as u64 + tick) % 3 {
        0 => {
            let body: HashMap<_, _> = fields.iter().cloned().collect();
            client.post(&endpoint).json(&body)
        }
        1 => client.post(&endpoint).form(&fields[..]),
        _ => client.get(&endpoint).query(&fields[..]),
    };

    let response = request.send().await.context("request failed")?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("tracker answered {status}: {body}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");
    let args = parse_args(std::env::args().skip(1))?;
    info!(
        url = %args.url,
        devices = args.devices,
        interval = ?args.interval,
        count = args.count,
        "simulating devices"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("failed to build http client")?;

    let mut tick = 0u64;
    loop {
        for n in 0..args.devices {
            if let Err(e) = report(&client, &args.url, n, tick).await {
                warn!(device = n, error = %format!("{e:#}"), "report failed");
            }
        }
        tick += 1;
        if args.count != 0 && tick >= args.count {
            info!(rounds = tick, "done");
            return Ok(());
        }
        tokio::time::sleep(args.interval).await;
    }
}
