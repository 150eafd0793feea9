//! Static descriptions of the platform facilities.
//!
//! Descriptors are plain data. They are built as `const`/`static` board
//! items, checked once by [`DescriptorSet::validate`], and only ever
//! borrowed by drivers.

use log::error;
use memory_addr::{PhysAddr, PhysAddrRange};

use crate::consts::{
    ACLINT_MSWI_MSIP_WIDTH, CONTEXT_PER_HART, CONTEXT_STRIDE, MAX_HARTS, PLIC_MAX_IRQ,
    PLIC_THRESHOLD_CLAIM_BEGIN,
};
use crate::error::{InitError, InitResult};
use crate::hart::HartId;

fn region(base: PhysAddr, size: usize) -> Option<PhysAddrRange> {
    if size == 0 {
        return None;
    }
    PhysAddrRange::try_from_start_size(base, size)
}

/// Platform-level interrupt controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlicDescriptor {
    pub base: PhysAddr,
    pub size: usize,
    pub num_sources: usize,
}

impl PlicDescriptor {
    pub fn range(&self) -> Option<PhysAddrRange> {
        region(self.base, self.size)
    }

    /// Bytes needed to reach the threshold/claim block of every context
    /// of `hart_count` harts.
    pub const fn required_size(hart_count: usize) -> usize {
        PLIC_THRESHOLD_CLAIM_BEGIN + hart_count * CONTEXT_PER_HART * CONTEXT_STRIDE
    }
}

/// ACLINT machine software interrupt device, used for IPIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MswiDescriptor {
    pub base: PhysAddr,
    pub size: usize,
    pub first_hart: usize,
    pub hart_count: usize,
}

impl MswiDescriptor {
    pub fn range(&self) -> Option<PhysAddrRange> {
        region(self.base, self.size)
    }

    pub fn covers(&self, hart: HartId) -> bool {
        (self.first_hart..self.first_hart + self.hart_count).contains(&hart.as_usize())
    }
}

/// ACLINT machine timer: the `mtime` counter and the `mtimecmp` bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MtimerDescriptor {
    pub frequency: u64,
    pub mtime_base: PhysAddr,
    pub mtime_size: usize,
    pub mtimecmp_base: PhysAddr,
    pub mtimecmp_size: usize,
    pub first_hart: usize,
    pub hart_count: usize,
    pub has_64bit_mmio: bool,
    /// One `mtime` readable by every hart instead of a per-hart counter.
    pub has_shared_mtime: bool,
}

impl MtimerDescriptor {
    pub fn mtime_range(&self) -> Option<PhysAddrRange> {
        region(self.mtime_base, self.mtime_size)
    }

    pub fn mtimecmp_range(&self) -> Option<PhysAddrRange> {
        region(self.mtimecmp_base, self.mtimecmp_size)
    }

    pub fn covers(&self, hart: HartId) -> bool {
        (self.first_hart..self.first_hart + self.hart_count).contains(&hart.as_usize())
    }
}

/// Serial console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartDescriptor {
    pub base: PhysAddr,
    pub size: usize,
    pub input_frequency: u32,
    pub baud_rate: u32,
}

impl UartDescriptor {
    pub fn range(&self) -> Option<PhysAddrRange> {
        region(self.base, self.size)
    }
}

/// Every facility of one board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSet {
    pub hart_count: usize,
    pub plic: PlicDescriptor,
    pub mswi: MswiDescriptor,
    pub mtimer: MtimerDescriptor,
    pub uart: UartDescriptor,
}

impl DescriptorSet {
    pub fn validate(&self) -> InitResult {
        if self.hart_count == 0 || self.hart_count > MAX_HARTS {
            error!(
                "hart count {} outside 1..={}",
                self.hart_count, MAX_HARTS
            );
            return Err(InitError::InvalidDescriptor);
        }

        if self.plic.num_sources == 0 || self.plic.num_sources > PLIC_MAX_IRQ {
            error!("plic: {} sources outside 1..={}", self.plic.num_sources, PLIC_MAX_IRQ);
            return Err(InitError::InvalidDescriptor);
        }
        if self.plic.size < PlicDescriptor::required_size(self.hart_count) {
            error!(
                "plic: size {:#x} cannot hold contexts for {} harts",
                self.plic.size, self.hart_count
            );
            return Err(InitError::InvalidDescriptor);
        }
        if self.mtimer.frequency == 0 {
            error!("mtimer: zero frequency");
            return Err(InitError::InvalidDescriptor);
        }

        if self.mswi.size < self.mswi.hart_count * ACLINT_MSWI_MSIP_WIDTH {
            error!(
                "mswi: size {:#x} cannot hold {} msip words",
                self.mswi.size, self.mswi.hart_count
            );
            return Err(InitError::InvalidDescriptor);
        }

        check_hart_span("mswi", self.mswi.first_hart, self.mswi.hart_count, self.hart_count)?;
        check_hart_span(
            "mtimer",
            self.mtimer.first_hart,
            self.mtimer.hart_count,
            self.hart_count,
        )?;

        let regions = [
            ("plic", self.plic.range()),
            ("mswi", self.mswi.range()),
            ("mtime", self.mtimer.mtime_range()),
            ("mtimecmp", self.mtimer.mtimecmp_range()),
            ("uart", self.uart.range()),
        ];
        for (i, (name, range)) in regions.iter().enumerate() {
            let Some(range) = range else {
                error!("{name}: empty or overflowing address range");
                return Err(InitError::InvalidDescriptor);
            };
            for (other, other_range) in &regions[i + 1..] {
                if other_range.is_some_and(|r| r.overlaps(*range)) {
                    error!("{name} overlaps {other}");
                    return Err(InitError::InvalidDescriptor);
                }
            }
        }
        Ok(())
    }
}

fn check_hart_span(name: &str, first: usize, count: usize, total: usize) -> InitResult {
    if count == 0 {
        error!("{name}: zero hart count");
        return Err(InitError::InvalidDescriptor);
    }
    match first.checked_add(count) {
        Some(end) if end <= total => Ok(()),
        _ => {
            error!("{name}: harts {first}+{count} exceed platform hart count {total}");
            Err(InitError::HartOutOfRange)
        }
    }
}
