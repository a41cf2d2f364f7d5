use serde::{Deserialize, Serialize};

/// CiA-402 operation modes (object 0x6060 codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    ProfiledPosition,
    ProfiledVelocity,
    ProfiledTorque,
    Homing,
    CyclicSyncPosition,
    CyclicSyncVelocity,
}

/// Modes registered on the device during one-shot initialization.
pub const DEFAULT_MODES: &[OperationMode] = &[
    OperationMode::ProfiledPosition,
    OperationMode::ProfiledVelocity,
    OperationMode::ProfiledTorque,
    OperationMode::Homing,
    OperationMode::CyclicSyncPosition,
    OperationMode::CyclicSyncVelocity,
];

impl OperationMode {
    /// Mode-of-operation code as written to object 0x6060.
    pub fn code(&self) -> i8 {
        match self {
            OperationMode::ProfiledPosition => 1,
            OperationMode::ProfiledVelocity => 3,
            OperationMode::ProfiledTorque => 4,
            OperationMode::Homing => 6,
            OperationMode::CyclicSyncPosition => 8,
            OperationMode::CyclicSyncVelocity => 9,
        }
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(OperationMode::ProfiledPosition),
            3 => Some(OperationMode::ProfiledVelocity),
            4 => Some(OperationMode::ProfiledTorque),
            6 => Some(OperationMode::Homing),
            8 => Some(OperationMode::CyclicSyncPosition),
            9 => Some(OperationMode::CyclicSyncVelocity),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::ProfiledPosition => "profiled_position",
            OperationMode::ProfiledVelocity => "profiled_velocity",
            OperationMode::ProfiledTorque => "profiled_torque",
            OperationMode::Homing => "homing",
            OperationMode::CyclicSyncPosition => "cyclic_sync_position",
            OperationMode::CyclicSyncVelocity => "cyclic_sync_velocity",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "profiled_position" => Some(OperationMode::ProfiledPosition),
            "profiled_velocity" => Some(OperationMode::ProfiledVelocity),
            "profiled_torque" => Some(OperationMode::ProfiledTorque),
            "homing" => Some(OperationMode::Homing),
            "cyclic_sync_position" => Some(OperationMode::CyclicSyncPosition),
            "cyclic_sync_velocity" => Some(OperationMode::CyclicSyncVelocity),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CiA-402 power-state ladder, published as an integer telemetry channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveStatus {
    NotReadyToSwitchOn,
    #[default]
    SwitchOnDisabled,
    ReadyToSwitchOn,
    SwitchedOn,
    OperationEnabled,
    QuickStopActive,
    FaultReactionActive,
    Fault,
}

impl DriveStatus {
    pub fn as_u32(&self) -> u32 {
        match self {
            DriveStatus::NotReadyToSwitchOn => 0,
            DriveStatus::SwitchOnDisabled => 1,
            DriveStatus::ReadyToSwitchOn => 2,
            DriveStatus::SwitchedOn => 3,
            DriveStatus::OperationEnabled => 4,
            DriveStatus::QuickStopActive => 5,
            DriveStatus::FaultReactionActive => 6,
            DriveStatus::Fault => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DriveStatus::NotReadyToSwitchOn => "not_ready_to_switch_on",
            DriveStatus::SwitchOnDisabled => "switch_on_disabled",
            DriveStatus::ReadyToSwitchOn => "ready_to_switch_on",
            DriveStatus::SwitchedOn => "switched_on",
            DriveStatus::OperationEnabled => "operation_enabled",
            DriveStatus::QuickStopActive => "quick_stop_active",
            DriveStatus::FaultReactionActive => "fault_reaction_active",
            DriveStatus::Fault => "fault",
        }
    }

    /// Whether the power stage accepts motion commands.
    pub fn is_operational(&self) -> bool {
        matches!(self, DriveStatus::OperationEnabled)
    }
}
