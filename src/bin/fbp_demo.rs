//! fbp-demo: wires two PubSub engines together over an in-memory transport
//! and negotiates a port connection, reporting convergence.
//!
//! Not a network service — the transport is in-process, so this binary
//! exists to exercise the full negotiation and replay sequence end to end
//! the way the test suite does, with visible logging.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use fitterbap::config::{self, Role as ConfigRole};
use fitterbap::{PubsubEngine, Role, Value, ValueData, ValueFlags};

#[derive(Parser, Debug)]
#[command(name = "fbp-demo", about = "Fitterbap pub/sub fabric demo")]
struct Args {
    /// Path to a TOML config file for the downstream side's topic prefix.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!(version = env!("CARGO_PKG_VERSION"), "fbp-demo starting");

    let cfg = if let Some(path) = args.config {
        match config::load_config_from_path(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("FATAL: failed to load config: {e}");
                std::process::exit(1);
            }
        }
    } else {
        config::DemoConfig {
            schema_version: 1,
            role: ConfigRole::Downstream,
            topic_prefix: "h/".to_owned(),
            arena_capacity: 4096,
        }
    };

    info!(role = ?cfg.role, prefix = %cfg.topic_prefix, "config loaded");

    run_demo(&cfg.topic_prefix, cfg.arena_capacity);
}

/// Build two engines (the configured downstream prefix, and a fixed `c/`
/// upstream peer), seed a retained value on the downstream side, connect
/// them over an in-memory transport, and print what converged.
fn run_demo(downstream_prefix: &str, arena_capacity: usize) {
    let downstream = Arc::new(PubsubEngine::new(downstream_prefix, arena_capacity));
    let upstream = Arc::new(PubsubEngine::new("c/", arena_capacity));

    let seeded_topic = format!("{downstream_prefix}v");
    downstream
        .publish(&seeded_topic, Value::new(ValueData::U32(5), ValueFlags::RETAIN), None)
        .expect("publishing a retained u32 never fails");
    downstream.process();

    let (transport_down, transport_up) = fbp_test_support::channel();
    let mut port_down = fitterbap::Port::new(Role::Downstream, transport_down, downstream.clone());
    let mut port_up = fitterbap::Port::new(Role::Upstream, transport_up, upstream.clone());

    for now_ms in 0..200u64 {
        port_down.pump(now_ms);
        port_up.pump(now_ms);
        if port_down.is_connected() && port_up.is_connected() {
            info!(at_ms = now_ms, "both ports reached Connected");
            break;
        }
    }

    if !port_down.is_connected() || !port_up.is_connected() {
        eprintln!("negotiation did not converge within the demo's pump budget");
        std::process::exit(1);
    }

    match upstream.query(&seeded_topic) {
        Ok(value) => info!(topic = %seeded_topic, ?value, "upstream engine observed downstream's retained value"),
        Err(e) => eprintln!("upstream never received the replayed value: {e}"),
    }

    info!(downstream = ?port_down.stats(), upstream = ?port_up.stats(), "final port stats");
}
