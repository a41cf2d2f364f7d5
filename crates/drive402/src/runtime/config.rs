use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    pub bind_addr: String,
    pub bridge_enabled: bool,
    pub json_logs: bool,
    pub metrics_addr: Option<String>,
    pub audit_path: Option<PathBuf>,
    pub cycle_period: Duration,
    pub watchdog_timeout: Duration,
    pub mode_confirm_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            run_seconds: None,
            bind_addr: "127.0.0.1:7402".to_string(),
            bridge_enabled: true,
            json_logs: false,
            metrics_addr: None,
            audit_path: None,
            cycle_period: Duration::from_millis(50),
            watchdog_timeout: Duration::from_secs(1),
            mode_confirm_timeout: Duration::from_millis(100),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Self {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--run-seconds" => {
                    if i + 1 < args.len() {
                        cfg.run_seconds = args[i + 1].parse::<u64>().ok();
                        i += 1;
                    }
                }
                "--bind" => {
                    if i + 1 < args.len() {
                        cfg.bind_addr = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--no-bridge" => {
                    cfg.bridge_enabled = false;
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--metrics-addr" => {
                    if i + 1 < args.len() {
                        cfg.metrics_addr = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--audit-log" => {
                    if i + 1 < args.len() {
                        cfg.audit_path = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--period-ms" => {
                    if i + 1 < args.len() {
                        if let Ok(ms) = args[i + 1].parse::<u64>() {
                            cfg.cycle_period = Duration::from_millis(ms);
                        }
                        i += 1;
                    }
                }
                "--watchdog-ms" => {
                    if i + 1 < args.len() {
                        if let Ok(ms) = args[i + 1].parse::<u64>() {
                            cfg.watchdog_timeout = Duration::from_millis(ms);
                        }
                        i += 1;
                    }
                }
                "--mode-confirm-ms" => {
                    if i + 1 < args.len() {
                        if let Ok(ms) = args[i + 1].parse::<u64>() {
                            cfg.mode_confirm_timeout = Duration::from_millis(ms);
                        }
                        i += 1;
                    }
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
        cfg
    }

    pub fn print_help() {
        println!(
            r#"drive402 - CiA-402 cyclic motion-control driver

USAGE:
    drive402 [OPTIONS]

OPTIONS:
    --bind <ADDR>           Bridge TCP bind address [default: 127.0.0.1:7402]
    --no-bridge             Disable the TCP bridge (standalone simulation)
    --run-seconds <SECS>    Run for a fixed duration then exit
    --json-logs             Output logs in JSON format (for log aggregation)
    --metrics-addr <ADDR>   Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --audit-log <PATH>      Enable audit logging to specified JSONL file
    --period-ms <MS>        Cyclic exchange period in milliseconds [default: 50]
    --watchdog-ms <MS>      Command-staleness timeout in milliseconds [default: 1000]
    --mode-confirm-ms <MS>  Mode-confirmation wait bound in milliseconds [default: 100]
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,drive402=trace)

EXAMPLES:
    # Basic run with metrics
    drive402 --metrics-addr 0.0.0.0:9090

    # Production run with all observability
    drive402 --json-logs --metrics-addr 0.0.0.0:9090 --audit-log /var/log/drive402/audit.jsonl

    # Short test run
    drive402 --run-seconds 10 --no-bridge
"#
        );
    }
}
