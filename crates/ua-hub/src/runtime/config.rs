use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub config_path: Option<PathBuf>,
    pub run_seconds: Option<u64>,
    pub bind_addr: String,
    pub service_enabled: bool,
    pub json_logs: bool,
    pub log_dir: Option<PathBuf>,
    pub metrics_addr: Option<String>,
    pub audit_path: Option<PathBuf>,
    pub simulate: bool,
    pub reconnect_interval: Option<Duration>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            config_path: None,
            run_seconds: None,
            bind_addr: "127.0.0.1:7100".to_string(),
            service_enabled: true,
            json_logs: false,
            log_dir: None,
            metrics_addr: None,
            audit_path: None,
            simulate: false,
            reconnect_interval: None,
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
                "--config" => {
                    if i + 1 < args.len() {
                        cfg.config_path = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
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
                "--no-service" => {
                    cfg.service_enabled = false;
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--log-dir" => {
                    if i + 1 < args.len() {
                        cfg.log_dir = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
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
                "--simulate" => {
                    cfg.simulate = true;
                }
                "--reconnect-interval" => {
                    if i + 1 < args.len() {
                        cfg.reconnect_interval = args[i + 1]
                            .parse::<u64>()
                            .ok()
                            .filter(|secs| *secs > 0)
                            .map(Duration::from_secs);
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
            r#"ua-hub - OPC UA client hub with a line-JSON service endpoint

USAGE:
    ua-hub [OPTIONS]

OPTIONS:
    --config <PATH>             Hub file (JSON) with "opcua", "sensors" and "simulation" sections
    --bind <ADDR>               Service endpoint bind address [default: 127.0.0.1:7100]
    --no-service                Disable the service endpoint
    --run-seconds <SECS>        Run for a fixed duration then exit
    --simulate                  Use in-process simulated servers instead of real endpoints
    --reconnect-interval <SECS> Reconnect dropped hubs at this interval (off by default)
    --json-logs                 Output logs in JSON format (for log aggregation)
    --log-dir <DIR>             Also write logs to a daily rolling file in DIR
    --metrics-addr <ADDR>       Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --audit-log <PATH>          Enable audit logging to specified JSONL file
    -h, --help                  Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                    Set log filter (e.g., RUST_LOG=debug,hub_core=trace)

EXAMPLES:
    # Run against the hubs in hubs.json with metrics
    ua-hub --config hubs.json --metrics-addr 0.0.0.0:9090

    # Production run with all observability
    ua-hub --config /etc/ua-hub/hubs.json --json-logs --log-dir /var/log/ua-hub \
        --audit-log /var/log/ua-hub/audit.jsonl --reconnect-interval 30

    # Short simulated run
    ua-hub --simulate --config hubs.json --run-seconds 10
"#
        );
    }
}
