//! BMS host runner.
//!
//! Runs the control core against a simulated pack, with the same thread
//! layout as the target firmware:
//!
//! ```text
//! ┌──────────────┐  lock   ┌──────────────┐  lock   ┌──────────────┐
//! │  Analytics   │───────▶│  SharedPack  │◀────────│ Control loop │
//! │  (200 ms)    │         └──────────────┘         │  (tick)      │
//! └──────┬───────┘                                   └──────┬───────┘
//!        │ ChargerDetected        BUS_INCOMING               │ try_send
//!        └─────────────────────────────────────────▶        ▼
//!                                                     BUS_OUTGOING
//!                                                           │
//!                                                  ┌────────▼───────┐
//!                                                  │  Dispatcher    │
//!                                                  │  (20 ms)       │
//!                                                  └────────────────┘
//! ```
//!
//! Usage: `bms [CONFIG_PATH] [TICKS]`.  `CONFIG_PATH` defaults to
//! `bms.json`; a missing file means defaults.  Without `TICKS` the loop
//! runs until the process is killed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use bms_core::adapters::bus_queue::{
    BUS_INCOMING, BUS_OUTGOING, BusDispatcher, BusQueue, CommandInbox, LogTransmit,
};
use bms_core::adapters::config_file::FileConfigStore;
use bms_core::adapters::fault_pin::{FaultRelay, SimPin};
use bms_core::adapters::log_sink::LogEventSink;
use bms_core::adapters::outputs::ControlOutputs;
use bms_core::adapters::sim::{PackSimulator, SimProfile};
use bms_core::adapters::time::MonotonicClock;
use bms_core::app::commands::AppCommand;
use bms_core::app::events::AppEvent;
use bms_core::app::ports::{Clock, ConfigPort, EventSink};
use bms_core::app::service::BmsController;
use bms_core::config::BmsConfig;
use bms_core::diagnostics;
use bms_core::pack::{PackSnapshot, shared};

const ANALYTICS_PERIOD: Duration = Duration::from_millis(200);
const DISPATCH_PERIOD: Duration = Duration::from_millis(20);
/// Telemetry line every N control ticks.
const TELEMETRY_EVERY: u64 = 10;

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    diagnostics::install_panic_handler();

    info!("╔══════════════════════════════════════╗");
    info!("║  BMS core v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Arguments + config ─────────────────────────────────
    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "bms.json".to_owned());
    let max_ticks: Option<u64> = args
        .next()
        .map(|s| s.parse::<u64>())
        .transpose()
        .context("tick count must be a non-negative integer")?;

    let store = FileConfigStore::new(&config_path);
    let config = match store.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load from {config_path} failed ({e}), using defaults");
            BmsConfig::default()
        }
    };

    // ── 3. Core + shared state ────────────────────────────────
    let mut controller = BmsController::new(config.clone())?;
    let clock = MonotonicClock::new();
    let pack = shared(PackSnapshot::new());
    let running = Arc::new(AtomicBool::new(true));

    // ── 4. Analytics thread ───────────────────────────────────
    let analytics = {
        let pack = Arc::clone(&pack);
        let running = Arc::clone(&running);
        thread::Builder::new()
            .name("analytics".into())
            .spawn(move || {
                let mut sim = PackSimulator::new(SimProfile::default());
                while running.load(Ordering::Relaxed) {
                    let now = clock.now_ms();
                    if sim.take_charger_arrival(now)
                        && BUS_INCOMING.try_send(AppCommand::ChargerDetected).is_err()
                    {
                        warn!("Analytics: command channel full, charger notice dropped");
                    }
                    sim.update(&mut pack.lock(), now);
                    thread::sleep(ANALYTICS_PERIOD);
                }
            })
            .context("spawn analytics thread")?
    };

    // ── 5. Bus dispatcher thread ──────────────────────────────
    let dispatcher = {
        let running = Arc::clone(&running);
        thread::Builder::new()
            .name("can-dispatch".into())
            .spawn(move || {
                let mut dispatcher = BusDispatcher::new(&BUS_OUTGOING, LogTransmit::new());
                while running.load(Ordering::Relaxed) {
                    dispatcher.drain();
                    thread::sleep(DISPATCH_PERIOD);
                }
                dispatcher.drain();
                info!(
                    "Dispatcher: {} messages sent, {} failed, {} frames",
                    dispatcher.sent(),
                    dispatcher.failed(),
                    dispatcher.transmitter().frames()
                );
            })
            .context("spawn dispatcher thread")?
    };

    // ── 6. Control loop ───────────────────────────────────────
    let mut outputs = ControlOutputs::new(
        BusQueue::new(&BUS_OUTGOING),
        FaultRelay::new(SimPin::new(), true),
    );
    let mut sink = (LogEventSink::new(), BusQueue::new(&BUS_OUTGOING));
    let mut inbox = CommandInbox::new(&BUS_INCOMING);
    controller.start(&pack.lock(), &mut sink);

    let period = Duration::from_millis(u64::from(config.tick_period_ms));
    let lock_timeout = Duration::from_millis(u64::from(config.lock_timeout_ms));
    let mut next_tick = Instant::now();
    let mut tick: u64 = 0;

    info!("Control loop running every {period:?}");
    while max_ticks.is_none_or(|max| tick < max) {
        let now = clock.now_ms();

        // Inbound commands are applied under the pack lock, before the tick.
        while let Some(cmd) = inbox.next() {
            let Some(mut guard) = pack.try_lock_for(lock_timeout) else {
                warn!("Command {cmd:?} deferred: pack lock busy");
                inbox.defer(cmd);
                break;
            };
            let applied = controller.handle_command(cmd, &mut guard, now, &mut outputs, &mut sink);
            if let Err(e) = applied {
                warn!("Command rejected: {e}");
            }
        }

        // A lock timeout was already logged and counted; just move on.
        let _ = controller.tick_shared(&pack, now, &mut outputs, &mut sink);
        let drops = outputs.bus.dropped().saturating_add(sink.1.dropped());
        controller.record_queue_drops(drops);

        if tick % TELEMETRY_EVERY == 0 {
            if let Some(guard) = pack.try_lock_for(lock_timeout) {
                let telemetry = controller.build_telemetry(&guard);
                drop(guard);
                sink.emit(&AppEvent::Telemetry(telemetry));
            }
        }

        tick += 1;
        next_tick += period;
        if let Some(wait) = next_tick.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }

    // ── 7. Shutdown ───────────────────────────────────────────
    running.store(false, Ordering::Relaxed);
    analytics.join().map_err(|_| anyhow!("analytics thread panicked"))?;
    dispatcher.join().map_err(|_| anyhow!("dispatcher thread panicked"))?;

    let diag = serde_json::to_string(controller.diagnostics()).context("encode diagnostics")?;
    info!("Diagnostics: {diag}");
    Ok(())
}
