pub mod bridge;
pub mod metrics;
pub mod protocol;

pub use bridge::{run_bridge, BridgeConfig};
pub use metrics::{init_metrics, serve_metrics, MetricsSink};
pub use protocol::{CommandMsg, IncomingMessage, ProtocolVersion, ResponseMsg, TelemetryMsg};
