//! Bring-up phases and the per-hart progress they drive.

/// Which boot path a hart is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootKind {
    Cold,
    Warm,
}

impl BootKind {
    pub const fn is_cold(self) -> bool {
        matches!(self, Self::Cold)
    }
}

impl From<bool> for BootKind {
    fn from(cold: bool) -> Self {
        if cold { Self::Cold } else { Self::Warm }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum BringUpPhase {
    EarlyInit = 0,
    ConsoleInit = 1,
    IrqchipInit = 2,
    IpiInit = 3,
    TimerInit = 4,
    FinalInit = 5,
}

impl BringUpPhase {
    pub const ALL: [Self; 6] = [
        Self::EarlyInit,
        Self::ConsoleInit,
        Self::IrqchipInit,
        Self::IpiInit,
        Self::TimerInit,
        Self::FinalInit,
    ];

    const fn from_index(idx: u8) -> Option<Self> {
        match idx {
            0 => Some(Self::EarlyInit),
            1 => Some(Self::ConsoleInit),
            2 => Some(Self::IrqchipInit),
            3 => Some(Self::IpiInit),
            4 => Some(Self::TimerInit),
            5 => Some(Self::FinalInit),
            _ => None,
        }
    }

    /// The phase a hart of the given boot kind runs after this one.
    /// Warm harts never touch the console.
    pub const fn successor(self, kind: BootKind) -> Option<Self> {
        match (self, kind) {
            (Self::EarlyInit, BootKind::Cold) => Some(Self::ConsoleInit),
            (Self::EarlyInit, BootKind::Warm) => Some(Self::IrqchipInit),
            (Self::FinalInit, _) => None,
            (phase, _) => Self::from_index(phase as u8 + 1),
        }
    }
}

/// Progress of one hart through the bring-up state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HartState {
    Uninitialized,
    /// The named phase is the last one that completed.
    Reached(BringUpPhase),
    Ready,
    Failed,
}

const STATE_UNINIT: u8 = 0;
const STATE_READY: u8 = 0xfe;
const STATE_FAILED: u8 = 0xff;
const STATE_REACHED_BASE: u8 = 1;

impl HartState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// The only phase this hart may run next, `None` once terminal.
    pub const fn next_phase(self, kind: BootKind) -> Option<BringUpPhase> {
        match self {
            Self::Uninitialized => Some(BringUpPhase::EarlyInit),
            Self::Reached(phase) => phase.successor(kind),
            Self::Ready | Self::Failed => None,
        }
    }

    /// Last completed phase, if any.
    pub const fn last_phase(self) -> Option<BringUpPhase> {
        match self {
            Self::Reached(phase) => Some(phase),
            Self::Ready => Some(BringUpPhase::FinalInit),
            _ => None,
        }
    }

    pub(crate) const fn encode(self) -> u8 {
        match self {
            Self::Uninitialized => STATE_UNINIT,
            Self::Reached(phase) => STATE_REACHED_BASE + phase as u8,
            Self::Ready => STATE_READY,
            Self::Failed => STATE_FAILED,
        }
    }

    pub(crate) const fn decode(raw: u8) -> Self {
        match raw {
            STATE_UNINIT => Self::Uninitialized,
            STATE_READY => Self::Ready,
            STATE_FAILED => Self::Failed,
            _ => match BringUpPhase::from_index(raw - STATE_REACHED_BASE) {
                Some(phase) => Self::Reached(phase),
                None => Self::Failed,
            },
        }
    }
}
