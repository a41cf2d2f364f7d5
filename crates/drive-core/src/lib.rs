pub mod command;
pub mod cycle;
pub mod device;
#[cfg(feature = "simulation")]
pub mod device_sim;
pub mod error;
pub mod mode;
pub mod telemetry;
pub mod watchdog;
mod watchdog_proptest;

pub use command::{CommandOutcome, CommandSurface, CycleState, CycleStateCell};
pub use cycle::{ControlCycle, CycleConfig, CycleStats};
pub use device::MotionDevice;
#[cfg(feature = "simulation")]
pub use device_sim::SimulatedDrive;
pub use error::{CycleError, DeviceError};
pub use mode::{DriveStatus, OperationMode, DEFAULT_MODES};
pub use telemetry::{
    SampleCell, SharedSampleSink, SinkError, TelemetryFanout, TelemetrySample, TelemetrySink,
};
pub use watchdog::TargetWatchdog;
