//! gridlink - bridge daemon
//!
//! Connects a grid controller to the DAW's remote-control ports and runs the
//! event loop until SIGINT or SIGTERM.

use anyhow::Context;
use gridlink_midi::{
    default_config_path, list_input_ports, list_output_ports, load_bridge_config, Bridge,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sleep between event loop passes when nothing was handled
const IDLE_SLEEP: Duration = Duration::from_millis(1);

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let list_ports = args.iter().any(|arg| arg == "--list-ports");
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    // Set RUST_LOG=debug to see every message in and out
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if list_ports {
        print_ports()?;
        return Ok(());
    }

    log::info!("gridlink {} starting up", env!("CARGO_PKG_VERSION"));
    let config = load_bridge_config(&config_path);

    let stop = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&stop))
            .with_context(|| format!("registering handler for signal {}", signal))?;
    }

    let mut bridge = Bridge::connect(config).context("connecting the bridge")?;
    bridge.start();

    while !stop.load(Ordering::Relaxed) {
        if bridge.run_once(Instant::now()) == 0 {
            std::thread::sleep(IDLE_SLEEP);
        }
    }

    log::info!("gridlink stopping");
    bridge.shutdown();
    Ok(())
}

fn print_ports() -> anyhow::Result<()> {
    println!("MIDI inputs:");
    for name in list_input_ports().context("listing MIDI inputs")? {
        println!("  {}", name);
    }
    println!("MIDI outputs:");
    for name in list_output_ports().context("listing MIDI outputs")? {
        println!("  {}", name);
    }
    Ok(())
}
