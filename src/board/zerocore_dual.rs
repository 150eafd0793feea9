//! ZeroCore dual-hart FPGA platform.
//!
//! AXI UART-lite console, a two-source PLIC and a CLINT-style ACLINT
//! block carrying both the MSWI and the MTIMER.

use memory_addr::PhysAddr;

use crate::capabilities::{PlatformCapabilities, PlatformFeatures, PlatformOps, platform_version};
use crate::consts::{ACLINT_DEFAULT_MTIME_SIZE, ACLINT_DEFAULT_MTIMECMP_SIZE, PLIC_THRESHOLD_CLAIM_END};
use crate::descriptor::{
    DescriptorSet, MswiDescriptor, MtimerDescriptor, PlicDescriptor, UartDescriptor,
};
use crate::emu::{EmuMswi, EmuMtimer, EmuPlic, EmuUartLite};
use crate::error::InitResult;
use crate::sequencer::Sequencer;

pub const NAME: &str = "zerocore_dual";
pub const VERSION: u32 = platform_version(0, 1);
pub const HART_COUNT: usize = 2;

pub const UART_ADDR: usize = 0x1000_0000;
pub const UART_SIZE: usize = 0x10;
pub const UART_FREQ: u32 = 100_000_000;
pub const UART_BAUDRATE: u32 = 9600;

pub const PLIC_ADDR: usize = 0x0c00_0000;
pub const PLIC_SIZE: usize = PLIC_THRESHOLD_CLAIM_END + 1;
pub const PLIC_NUM_SOURCES: usize = 2;

pub const CLINT_ADDR: usize = 0x0200_0000;
const CLINT_MSWI_OFFSET: usize = 0;
const CLINT_MTIMER_OFFSET: usize = 0x10;
const CLINT_MTIMECMP_OFFSET: usize = 0x8;

pub const MSWI_ADDR: usize = CLINT_ADDR + CLINT_MSWI_OFFSET;
pub const MSWI_SIZE: usize = 0x10;
pub const MTIMER_ADDR: usize = CLINT_ADDR + CLINT_MTIMER_OFFSET;
pub const MTIMECMP_ADDR: usize = MTIMER_ADDR + CLINT_MTIMECMP_OFFSET;
pub const MTIMER_FREQ: u64 = 1_000_000;

static DESCRIPTORS: DescriptorSet = DescriptorSet {
    hart_count: HART_COUNT,
    plic: PlicDescriptor {
        base: PhysAddr::from_usize(PLIC_ADDR),
        size: PLIC_SIZE,
        num_sources: PLIC_NUM_SOURCES,
    },
    mswi: MswiDescriptor {
        base: PhysAddr::from_usize(MSWI_ADDR),
        size: MSWI_SIZE,
        first_hart: 0,
        hart_count: HART_COUNT,
    },
    mtimer: MtimerDescriptor {
        frequency: MTIMER_FREQ,
        mtime_base: PhysAddr::from_usize(MTIMER_ADDR),
        mtime_size: ACLINT_DEFAULT_MTIME_SIZE,
        mtimecmp_base: PhysAddr::from_usize(MTIMECMP_ADDR),
        mtimecmp_size: ACLINT_DEFAULT_MTIMECMP_SIZE,
        first_hart: 0,
        hart_count: HART_COUNT,
        has_64bit_mmio: false,
        has_shared_mtime: true,
    },
    uart: UartDescriptor {
        base: PhysAddr::from_usize(UART_ADDR),
        size: UART_SIZE,
        input_frequency: UART_FREQ,
        baud_rate: UART_BAUDRATE,
    },
};

pub fn descriptors() -> &'static DescriptorSet {
    &DESCRIPTORS
}

pub fn capabilities(ops: &dyn PlatformOps) -> InitResult<PlatformCapabilities<'_>> {
    PlatformCapabilities::new(NAME, VERSION, &DESCRIPTORS, PlatformFeatures::default(), ops)
}

pub type EmulatedSequencer = Sequencer<'static, EmuPlic, EmuMswi, EmuMtimer, EmuUartLite>;

/// The board wired to in-memory device models.
pub fn emulated() -> InitResult<EmulatedSequencer> {
    let d = &DESCRIPTORS;
    Sequencer::new(
        d,
        EmuPlic::new(d.plic.base.as_usize()),
        EmuMswi::new(d.mswi.base.as_usize()),
        EmuMtimer::new(d.mtimer.mtime_base.as_usize()),
        EmuUartLite::new(d.uart.base.as_usize()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zerocore_layout() {
        let d = descriptors();
        assert_eq!(d.plic.base.as_usize(), 0xc00_0000);
        assert_eq!(d.mswi.base.as_usize(), 0x200_0000);
        assert_eq!(d.mtimer.mtime_base.as_usize(), 0x200_0010);
        assert_eq!(d.mtimer.mtimecmp_base.as_usize(), 0x200_0018);
        assert_eq!(d.uart.base.as_usize(), 0x1000_0000);
        assert!(!d.mtimer.has_64bit_mmio);
    }

    #[test]
    fn capability_table() {
        let seq = emulated().unwrap();
        let caps = capabilities(&seq).unwrap();
        assert_eq!(caps.name(), "zerocore_dual");
        assert_eq!(caps.version(), 0x1);
        assert_eq!(caps.hart_count(), 2);
        assert_eq!(caps.hart_stack_size(), 8192);
        assert_eq!(
            caps.features(),
            PlatformFeatures::MFAULTS_DELEGATION | PlatformFeatures::SHARED_TIME_BASE
        );
    }
}
