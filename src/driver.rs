//! Interfaces of the facility drivers the sequencer calls into.
//!
//! Drivers are shared by every hart, so all methods take `&self`. A
//! driver never keeps the descriptor it is handed.

use axerrno::AxResult;

use crate::descriptor::{MswiDescriptor, MtimerDescriptor, PlicDescriptor, UartDescriptor};
use crate::hart::HartId;

/// Called with the hart whose comparator fired.
pub type TimerEventHandler = fn(HartId);

pub trait IrqChipDriver: Sync {
    /// One-time setup of the shared controller state.
    fn cold_init(&self, desc: &PlicDescriptor) -> AxResult;

    /// Enables (or disables) every source for `context` and programs its
    /// priority threshold.
    fn context_init(
        &self,
        desc: &PlicDescriptor,
        context: usize,
        enable: bool,
        threshold: u32,
    ) -> AxResult;
}

pub trait IpiDriver: Sync {
    fn cold_init(&self, desc: &MswiDescriptor) -> AxResult;

    /// Makes `hart` ready to receive IPIs.
    fn warm_init(&self, hart: HartId) -> AxResult;
}

pub trait TimerDriver: Sync {
    fn cold_init(&self, desc: &MtimerDescriptor, handler: Option<TimerEventHandler>) -> AxResult;

    fn warm_init(&self, hart: HartId) -> AxResult;
}

pub trait ConsoleDriver: Sync {
    fn init(&self, desc: &UartDescriptor) -> AxResult;
}
