use crate::infra::audit::{AuditEventType, AuditLogger};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use drive_core::{
    CommandSurface, ControlCycle, CycleConfig, CycleStateCell, CycleStats, SampleCell,
    SharedSampleSink, SimulatedDrive, TargetWatchdog, TelemetryFanout,
};
use drive_io::{init_metrics, run_bridge, serve_metrics, BridgeConfig, MetricsSink};
use std::path::PathBuf;
use std::sync::{atomic::AtomicBool, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

pub fn run_from_args() {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return;
    }
    run(config);
}

pub fn run(config: RuntimeConfig) {
    init_tracing(config.json_logs);

    let cycle_config = CycleConfig {
        period: config.cycle_period,
        watchdog_timeout: config.watchdog_timeout,
        mode_confirm_timeout: config.mode_confirm_timeout,
    };
    if let Err(reason) = cycle_config.validate() {
        error!(%reason, "invalid cycle configuration");
        std::process::exit(2);
    }

    init_metrics();

    let metrics_enabled = config.metrics_addr.is_some();
    let _metrics_handle = config.metrics_addr.clone().map(serve_metrics);

    let audit_logger = init_audit_logger(config.audit_path.as_ref());

    if let Some(ref logger) = audit_logger {
        let _ = logger.log_event(
            AuditEventType::DriverStart,
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "bridge_enabled": config.bridge_enabled,
                "metrics_enabled": metrics_enabled,
                "period_ms": cycle_config.period.as_millis() as u64,
                "watchdog_ms": cycle_config.watchdog_timeout.as_millis() as u64,
            }),
        );
    }

    let device = Arc::new(Mutex::new(SimulatedDrive::new()));
    let watchdog = Arc::new(TargetWatchdog::new(cycle_config.watchdog_timeout));
    let cycle_state = Arc::new(CycleStateCell::new());
    let sample = Arc::new(SampleCell::new());

    let stop = Arc::new(AtomicBool::new(false));

    info!(
        period_ms = cycle_config.period.as_millis() as u64,
        watchdog_ms = cycle_config.watchdog_timeout.as_millis() as u64,
        mode_confirm_ms = cycle_config.mode_confirm_timeout.as_millis() as u64,
        "Starting cyclic exchange loop"
    );

    let cycle_handle = {
        let device = Arc::clone(&device);
        let watchdog = Arc::clone(&watchdog);
        let cycle_state = Arc::clone(&cycle_state);
        let sample = Arc::clone(&sample);
        let stop = Arc::clone(&stop);
        let period = cycle_config.period;

        thread::spawn(move || -> (CycleStats, Option<String>) {
            let mut sinks = TelemetryFanout::new();
            sinks.add(Box::new(SharedSampleSink(sample)));
            sinks.add(Box::new(MetricsSink));

            let mut cycle = ControlCycle::new(device, watchdog, cycle_state, period, sinks);
            let fatal = match cycle.run(&stop) {
                Ok(()) => None,
                Err(e) => {
                    error!(error = %e, "cyclic loop terminated");
                    // Bring the rest of the process down with the loop.
                    stop.store(true, std::sync::atomic::Ordering::Relaxed);
                    Some(e.to_string())
                }
            };
            (cycle.stats().clone(), fatal)
        })
    };

    let bridge_handle = if config.bridge_enabled {
        let surface = CommandSurface::new(
            Arc::clone(&device),
            Arc::clone(&watchdog),
            Arc::clone(&cycle_state),
            cycle_config.mode_confirm_timeout,
        );
        let sample = Arc::clone(&sample);
        let stop = Arc::clone(&stop);
        let bridge_config = BridgeConfig {
            bind_addr: config.bind_addr.clone(),
            ..Default::default()
        };
        info!(addr = %bridge_config.bind_addr, "Starting bridge");
        Some(thread::spawn(move || {
            run_bridge(surface, sample, bridge_config, stop);
        }))
    } else {
        info!("Bridge disabled");
        None
    };

    info!("drive402 running. Connect a client to issue commands and stream targets.");

    if let Some(seconds) = config.run_seconds {
        info!(seconds, "Running for limited duration");
        thread::sleep(Duration::from_secs(seconds));
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    let (stats, fatal) = cycle_handle.join().unwrap();
    if let Some(handle) = bridge_handle {
        let _ = handle.join();
    }

    info!(
        cycles_executed = stats.cycles_executed,
        cycles_missed = stats.cycles_missed,
        watchdog_forced = stats.watchdog_forced,
        max_jitter_us = stats.max_jitter_us,
        "Run complete"
    );

    if let Some(ref logger) = audit_logger {
        if let Some(ref reason) = fatal {
            let _ = logger.log_event(
                AuditEventType::InitFailure,
                serde_json::json!({ "reason": reason }),
            );
        }
        let _ = logger.log_event(
            AuditEventType::DriverShutdown,
            serde_json::json!({
                "cycles_executed": stats.cycles_executed,
                "cycles_missed": stats.cycles_missed,
                "watchdog_forced": stats.watchdog_forced,
            }),
        );
    }

    if fatal.is_some() {
        std::process::exit(1);
    }
}

fn init_audit_logger(audit_path: Option<&PathBuf>) -> Option<Arc<AuditLogger>> {
    audit_path.map(|path| match AuditLogger::new(path) {
        Ok(logger) => {
            info!(path = %path.display(), "Audit logging enabled");
            Arc::new(logger)
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Failed to initialize audit logger");
            panic!("Audit logging requested but failed to initialize: {}", e);
        }
    })
}
