use core::fmt;

use axerrno::AxError;

use crate::phase::BringUpPhase;

pub type InitResult<T = ()> = Result<T, InitError>;

/// Errors reported by the bring-up phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// A descriptor is malformed or does not match the device.
    InvalidDescriptor,
    /// The device did not accept the initialization sequence.
    DeviceUnresponsive,
    /// The one-time step already ran.
    AlreadyInitialized,
    /// The hart is outside `[0, hart_count)`.
    HartOutOfRange,
    /// A warm step was attempted before the facility's cold step.
    NotInitialized,
    /// The hart called a phase out of sequence.
    OutOfOrder {
        expected: Option<BringUpPhase>,
        found: BringUpPhase,
    },
    /// The cold flag of a call disagrees with the hart's boot path.
    BootKindMismatch,
    /// An earlier cold step failed; nothing else may run.
    Aborted,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDescriptor => f.write_str("invalid device descriptor"),
            Self::DeviceUnresponsive => f.write_str("device unresponsive"),
            Self::AlreadyInitialized => f.write_str("already initialized"),
            Self::HartOutOfRange => f.write_str("hart out of range"),
            Self::NotInitialized => f.write_str("cold init has not run"),
            Self::OutOfOrder {
                expected: Some(expected),
                found,
            } => write!(f, "phase {found:?} called, expected {expected:?}"),
            Self::OutOfOrder {
                expected: None,
                found,
            } => write!(f, "phase {found:?} called on a hart that already finished"),
            Self::BootKindMismatch => f.write_str("cold flag does not match the hart's boot path"),
            Self::Aborted => f.write_str("platform bring-up aborted"),
        }
    }
}

impl From<AxError> for InitError {
    fn from(err: AxError) -> Self {
        match err {
            AxError::AlreadyExists => Self::AlreadyInitialized,
            AxError::InvalidInput | AxError::InvalidData => Self::InvalidDescriptor,
            AxError::BadState => Self::NotInitialized,
            _ => Self::DeviceUnresponsive,
        }
    }
}

impl From<InitError> for AxError {
    fn from(err: InitError) -> Self {
        match err {
            InitError::InvalidDescriptor | InitError::HartOutOfRange => AxError::InvalidInput,
            InitError::AlreadyInitialized => AxError::AlreadyExists,
            InitError::NotInitialized
            | InitError::OutOfOrder { .. }
            | InitError::BootKindMismatch
            | InitError::Aborted => AxError::BadState,
            InitError::DeviceUnresponsive => AxError::Io,
        }
    }
}
