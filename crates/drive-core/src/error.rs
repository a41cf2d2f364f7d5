use crate::mode::OperationMode;
use thiserror::Error;

/// Request-level errors reported by a device abstraction. These are
/// recoverable: they become a Failure outcome at the command surface and
/// never cross into the periodic loop.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeviceError {
    #[error("configured object 0x{index:04X}:{subindex:02X} missing from dictionary")]
    ObjectMissing { index: u16, subindex: u8 },

    #[error("operation mode {0} not supported by device")]
    ModeNotSupported(OperationMode),

    #[error("mode {mode} not confirmed within {wait_ms}ms")]
    ModeConfirmTimeout { mode: OperationMode, wait_ms: u64 },

    #[error("power stage not enabled")]
    NotEnabled,

    #[error("device is faulted")]
    Faulted,

    #[error("no operation mode active")]
    NoModeActive,

    #[error("target {value} rejected: {reason}")]
    TargetRejected { value: f64, reason: &'static str },

    #[error("fieldbus transport not ready")]
    TransportDown,
}

/// Driver-level errors surfaced by the cyclic loop. Object validation
/// failure is fatal: the loop refuses to enter Running and is not retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CycleError {
    #[error("object dictionary validation failed: {0}")]
    ObjectValidation(#[source] DeviceError),

    #[error("one-shot initialization previously failed; cyclic I/O disabled")]
    InitFailed,
}
