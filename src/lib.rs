//! Platform bring-up core for multi-hart RISC-V firmware.
//!
//! A board describes its console, PLIC, IPI and timer with a
//! [`DescriptorSet`], plugs its drivers into a [`Sequencer`] and hands the
//! runtime a [`PlatformCapabilities`] table. The runtime then calls the
//! [`PlatformOps`] phases on every hart: cold steps once on the boot hart,
//! warm steps on every hart.

#![no_std]

pub mod board;
mod capabilities;
mod consts;
mod descriptor;
mod driver;
pub mod emu;
mod error;
pub mod hart;
mod phase;
mod sequencer;

pub use capabilities::{PlatformCapabilities, PlatformFeatures, PlatformOps, platform_version};
pub use consts::{
    CONTEXT_PER_HART, DEFAULT_HART_STACK_SIZE, MAX_HARTS, PLIC_M_MODE_THRESHOLD, PLIC_MAX_IRQ,
    PLIC_S_MODE_THRESHOLD,
};
pub use descriptor::{
    DescriptorSet, MswiDescriptor, MtimerDescriptor, PlicDescriptor, UartDescriptor,
};
pub use driver::{ConsoleDriver, IpiDriver, IrqChipDriver, TimerDriver, TimerEventHandler};
pub use error::{InitError, InitResult};
pub use hart::{ContextMapping, HartId};
pub use phase::{BootKind, BringUpPhase, HartState};
pub use sequencer::Sequencer;
