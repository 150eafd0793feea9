//! What the runtime core sees of a board.

use bitflags::bitflags;
use log::info;

use crate::consts::DEFAULT_HART_STACK_SIZE;
use crate::descriptor::DescriptorSet;
use crate::error::InitResult;
use crate::hart::HartId;
use crate::phase::BootKind;

/// Per-board bring-up callbacks, invoked by the runtime core once per hart.
///
/// The hart is always passed explicitly; implementations must not read it
/// from hardware.
pub trait PlatformOps: Sync {
    fn early_init(&self, cold: bool, hart: HartId) -> InitResult;

    /// Cold hart only, once.
    fn console_init(&self, hart: HartId) -> InitResult;

    fn irqchip_init(&self, cold: bool, hart: HartId) -> InitResult;

    fn ipi_init(&self, cold: bool, hart: HartId) -> InitResult;

    fn timer_init(&self, cold: bool, hart: HartId) -> InitResult;

    fn final_init(&self, cold: bool, hart: HartId) -> InitResult;

    /// Runs every phase for `hart` in order and stops at the first error.
    fn bring_up(&self, kind: BootKind, hart: HartId) -> InitResult {
        let cold = kind.is_cold();
        self.early_init(cold, hart)?;
        if cold {
            self.console_init(hart)?;
        }
        self.irqchip_init(cold, hart)?;
        self.ipi_init(cold, hart)?;
        self.timer_init(cold, hart)?;
        self.final_init(cold, hart)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PlatformFeatures: u64 {
        /// Timer value can be read without trapping.
        const TIMER_VALUE = 1 << 0;
        const HART_HOTPLUG = 1 << 1;
        /// Misaligned and access faults are delegated to S-mode.
        const MFAULTS_DELEGATION = 1 << 2;
        const HART_SECONDARY_BOOT = 1 << 3;
        /// A single `mtime` serves every hart.
        const SHARED_TIME_BASE = 1 << 4;
    }
}

impl Default for PlatformFeatures {
    fn default() -> Self {
        Self::MFAULTS_DELEGATION
    }
}

pub const fn platform_version(major: u16, minor: u16) -> u32 {
    ((major as u32) << 16) | minor as u32
}

pub struct PlatformCapabilities<'a> {
    name: &'static str,
    version: u32,
    hart_count: usize,
    hart_stack_size: usize,
    features: PlatformFeatures,
    descriptors: &'a DescriptorSet,
    ops: &'a dyn PlatformOps,
}

impl<'a> PlatformCapabilities<'a> {
    /// Validates `descriptors` and assembles the table. The shared time
    /// base flag is taken from the timer descriptor.
    pub fn new(
        name: &'static str,
        version: u32,
        descriptors: &'a DescriptorSet,
        features: PlatformFeatures,
        ops: &'a dyn PlatformOps,
    ) -> InitResult<Self> {
        descriptors.validate()?;
        let mut features = features;
        features.set(
            PlatformFeatures::SHARED_TIME_BASE,
            descriptors.mtimer.has_shared_mtime,
        );
        info!(
            "platform {name} v{}.{}: {} harts, features {features:?}",
            version >> 16,
            version & 0xffff,
            descriptors.hart_count
        );
        Ok(Self {
            name,
            version,
            hart_count: descriptors.hart_count,
            hart_stack_size: DEFAULT_HART_STACK_SIZE,
            features,
            descriptors,
            ops,
        })
    }

    pub fn with_hart_stack_size(mut self, size: usize) -> Self {
        self.hart_stack_size = size;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn hart_count(&self) -> usize {
        self.hart_count
    }

    pub fn hart_stack_size(&self) -> usize {
        self.hart_stack_size
    }

    pub fn features(&self) -> PlatformFeatures {
        self.features
    }

    pub fn has_feature(&self, feature: PlatformFeatures) -> bool {
        self.features.contains(feature)
    }

    pub fn descriptors(&self) -> &'a DescriptorSet {
        self.descriptors
    }

    pub fn ops(&self) -> &'a dyn PlatformOps {
        self.ops
    }

    pub fn boot_hart(&self, kind: BootKind, hart: HartId) -> InitResult {
        self.ops.bring_up(kind, hart)
    }
}
