//! Replays a captured discovery trace and reports which sensors it leaves attached.

use chrono::Local;
use clap::Parser;
use common::config::{parse_formats, parse_headers};
use common::{DomainEvent, NetworkConfig, NetworkError, RawEvent, RawEventKind, Result};
use env_logger::fmt::Color;
use env_logger::Builder;
use log::{error, info, LevelFilter};
use sensor_hub::network::{callback, Callback, Network};
use sensor_hub::sensor::SensorTypeMap;
use sensor_hub::transport::MemoryBus;
use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "sensor-monitor", about = "Replay discovery traffic and list attached sensors")]
struct Args {
    /// JSON-lines file of captured group events
    #[arg(long)]
    trace: PathBuf,

    #[arg(long, value_delimiter = ',')]
    formats: Vec<String>,

    #[arg(long)]
    name: Option<String>,

    /// Extra session headers as key=value
    #[arg(long, value_delimiter = ',')]
    header: Vec<String>,

    #[arg(long, default_value_t = 10)]
    poll_interval_ms: u64,
}

/// One captured event. A string payload is replayed byte for byte, any other
/// JSON value is re-encoded first.
#[derive(Debug, Deserialize)]
struct TraceEntry {
    #[serde(rename = "type")]
    kind: String,
    peer_uuid: Uuid,
    #[serde(default)]
    peer_name: String,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
}

impl TraceEntry {
    fn into_event(self) -> RawEvent {
        let frames = match self.payload {
            Some(Value::String(text)) => vec![text.into_bytes()],
            Some(value) => vec![value.to_string().into_bytes()],
            None => Vec::new(),
        };
        RawEvent {
            kind: RawEventKind::from(self.kind.as_str()),
            peer_uuid: self.peer_uuid,
            peer_name: self.peer_name,
            group: self.group,
            frames,
        }
    }
}

fn load_trace(path: &Path) -> Result<Vec<RawEvent>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| NetworkError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(|(index, line)| {
            serde_json::from_str::<TraceEntry>(line)
                .map(TraceEntry::into_event)
                .map_err(|e| NetworkError::Serialization(format!("line {}: {}", index + 1, e)))
        })
        .collect()
}

fn apply_args(mut config: NetworkConfig, args: &Args) -> Result<NetworkConfig> {
    if let Some(name) = &args.name {
        config.name = Some(name.clone());
    }
    if !args.formats.is_empty() {
        config.formats = parse_formats(&args.formats.join(","))?;
    }
    if !args.header.is_empty() {
        config.headers.extend(parse_headers(&args.header.join(","))?);
    }
    Ok(config)
}

fn log_observer() -> Callback {
    callback(|format, event| {
        match event {
            DomainEvent::Attach(record) => info!(
                "[{}] attached {} \"{}\" ({}) on {}",
                format, record.sensor_uuid, record.sensor_name, record.sensor_type, record.host_name
            ),
            DomainEvent::Detach(record) => info!(
                "[{}] detached {} \"{}\" from {}",
                format, record.sensor_uuid, record.sensor_name, record.host_name
            ),
            DomainEvent::Unknown { .. } => {}
        }
        Ok(())
    })
}

fn print_summary(network: &Network) {
    let sensors = network.sensors();
    println!("\n{} sensor(s) attached", sensors.len());
    println!(
        "{:<36} {:<24} {:<10} {:<16} {}",
        "SENSOR", "NAME", "TYPE", "HOST", "SUPPORTED"
    );
    for record in sensors {
        let supported = network.sensor(&record.sensor_uuid, Vec::new()).is_ok();
        println!(
            "{:<36} {:<24} {:<10} {:<16} {}",
            record.sensor_uuid, record.sensor_name, record.sensor_type, record.host_name, supported
        );
    }
}

fn setup_logger() {
    let mut builder = Builder::from_default_env();

    builder
        .format(|buf, record| {
            let mut timestamp_style = buf.style();
            let mut level_style = buf.style();
            let mut target_style = buf.style();
            let mut message_style = buf.style();

            let level_color = match record.level() {
                log::Level::Error => Color::Red,
                log::Level::Warn => Color::Yellow,
                log::Level::Info => Color::Green,
                log::Level::Debug => Color::Cyan,
                log::Level::Trace => Color::White,
            };

            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(
                buf,
                "{} {} [{}] {}",
                timestamp_style.set_color(Color::Rgb(100, 100, 100)).value(timestamp),
                level_style.set_color(level_color).value(record.level()),
                target_style.set_color(Color::Blue).value(record.target()),
                message_style.set_color(Color::White).value(record.args())
            )
        })
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logger();
    let args = Args::parse();

    let config = apply_args(NetworkConfig::from_env()?, &args)?;
    let trace = load_trace(&args.trace)?;
    info!("Loaded {} event(s) from {}", trace.len(), args.trace.display());

    let bus = MemoryBus::new();
    let mut network = Network::new(
        &config,
        Arc::new(bus.clone()),
        SensorTypeMap::descriptors(),
        vec![log_observer()],
    );
    network.start()?;
    for node in network.nodes() {
        info!("Listening on {} as {}", node.group(), node);
    }

    for event in trace {
        bus.deliver(event);
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(args.poll_interval_ms.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = network.poll() {
                    error!("Observer failed: {}", e);
                }
                if !network.has_events() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    print_summary(&network);
    network.stop()
}
