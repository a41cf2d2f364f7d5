use crate::error::DeviceError;
use crate::mode::OperationMode;
use crate::telemetry::TelemetrySample;
use std::time::Duration;

/// Abstraction over a CiA-402 field device. Owns all device-state knowledge:
/// the 402 state machine, object-dictionary semantics and the fieldbus
/// session live behind this seam.
///
/// Implementations are driven from two sides through a single mutex: the
/// cyclic loop (read/write exchange, telemetry sampling) and the command
/// surface (mode transitions, targets, init/recover/halt).
pub trait MotionDevice: Send {
    /// Pull current process data from the device into memory.
    fn read_cycle(&mut self);

    /// Push pending target/mode commands out to the device.
    fn write_cycle(&mut self);

    /// Register the default operating modes. Called exactly once, before
    /// the first cyclic exchange.
    fn register_default_modes(&mut self);

    /// Check that all configured objects are present and consistent.
    /// A failure here is fatal to the driver.
    fn validate_configured_objects(&self) -> Result<(), DeviceError>;

    /// Request a mode transition and block until the device confirms or
    /// rejects it, bounded by `deadline`.
    fn enter_mode(&mut self, mode: OperationMode, deadline: Duration) -> Result<(), DeviceError>;

    /// Forward a motion target. The resulting movement depends on the
    /// active operation mode.
    fn set_target(&mut self, value: f64) -> Result<(), DeviceError>;

    /// Bring the drive to operational and run the homing sequence.
    fn init(&mut self) -> Result<(), DeviceError>;

    /// Reset faults and re-enable the power stage.
    fn recover(&mut self) -> Result<(), DeviceError>;

    /// Issue a quickstop. The resulting state depends on the device's
    /// quickstop option (object 0x605A).
    fn halt(&mut self) -> Result<(), DeviceError>;

    /// Snapshot of the most recently read process data.
    fn current_telemetry(&self) -> TelemetrySample;

    /// Whether the transport layer can currently accept commands.
    fn transport_ready(&self) -> bool;
}
