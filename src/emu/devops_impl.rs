use axaddrspace::device::AccessWidth;
use axaddrspace::{GuestPhysAddr, GuestPhysAddrRange};
use axdevice_base::{BaseDeviceOps, EmuDeviceType};
use axerrno::{AxError, AxResult};
use log::trace;

use crate::consts::{
    CONTEXT_ENABLE_STRIDE, CONTEXT_STRIDE, PLIC_ENABLE_BEGIN, PLIC_ENABLE_END, PLIC_PENDING_BEGIN,
    PLIC_PENDING_END, PLIC_PRIO_BEGIN, PLIC_PRIO_END, PLIC_THRESHOLD_CLAIM_BEGIN,
    PLIC_THRESHOLD_CLAIM_END,
};
use crate::emu::plic::EmuPlic;

impl EmuPlic {
    fn offset_of(&self, addr: GuestPhysAddr) -> AxResult<usize> {
        addr.as_usize()
            .checked_sub(self.base_addr)
            .filter(|&offset| offset <= PLIC_THRESHOLD_CLAIM_END)
            .ok_or(AxError::InvalidInput)
    }
}

impl BaseDeviceOps<GuestPhysAddrRange> for EmuPlic {
    fn emu_type(&self) -> EmuDeviceType {
        EmuDeviceType::EmuDeviceTInterruptController
    }

    fn address_range(&self) -> GuestPhysAddrRange {
        GuestPhysAddrRange::from_start_size(
            self.base_addr.into(),
            PLIC_THRESHOLD_CLAIM_END - PLIC_PRIO_BEGIN + 1,
        )
    }

    fn handle_read(&self, addr: GuestPhysAddr, width: AccessWidth) -> AxResult<usize> {
        let offset = self.offset_of(addr)?;
        if width != AccessWidth::Dword {
            return Ok(0);
        }
        let val = if (PLIC_PRIO_BEGIN..=PLIC_PRIO_END).contains(&offset) {
            self.get_prio(offset / 4) as usize
        } else if (PLIC_PENDING_BEGIN..=PLIC_PENDING_END).contains(&offset) {
            self.get_pending_word((offset - PLIC_PENDING_BEGIN) / 4) as usize
        } else if (PLIC_ENABLE_BEGIN..=PLIC_ENABLE_END).contains(&offset) {
            let ctx = (offset - PLIC_ENABLE_BEGIN) / CONTEXT_ENABLE_STRIDE;
            let word = ((offset - PLIC_ENABLE_BEGIN) % CONTEXT_ENABLE_STRIDE) / 4;
            self.get_enable_word(ctx, word) as usize
        } else if (PLIC_THRESHOLD_CLAIM_BEGIN..=PLIC_THRESHOLD_CLAIM_END).contains(&offset) {
            let ctx = (offset - PLIC_THRESHOLD_CLAIM_BEGIN) / CONTEXT_STRIDE;
            match (offset - PLIC_THRESHOLD_CLAIM_BEGIN) % CONTEXT_STRIDE {
                0 => self.get_threshold(ctx) as usize,
                4 => self.claim_irq(ctx).unwrap_or(0),
                _ => 0,
            }
        } else {
            0
        };
        trace!("EmuPlic read: offset={offset:#x} -> {val:#x}");
        Ok(val)
    }

    fn handle_write(&self, addr: GuestPhysAddr, width: AccessWidth, val: usize) -> AxResult {
        let offset = self.offset_of(addr)?;
        if width != AccessWidth::Dword {
            return Ok(());
        }
        trace!("EmuPlic write: offset={offset:#x} <- {val:#x}");
        if (PLIC_PRIO_BEGIN..=PLIC_PRIO_END).contains(&offset) {
            self.set_prio(offset / 4, val as u32);
        } else if (PLIC_ENABLE_BEGIN..=PLIC_ENABLE_END).contains(&offset) {
            let ctx = (offset - PLIC_ENABLE_BEGIN) / CONTEXT_ENABLE_STRIDE;
            let word = ((offset - PLIC_ENABLE_BEGIN) % CONTEXT_ENABLE_STRIDE) / 4;
            self.set_enable_word(ctx, word, val as u32);
        } else if (PLIC_THRESHOLD_CLAIM_BEGIN..=PLIC_THRESHOLD_CLAIM_END).contains(&offset) {
            let ctx = (offset - PLIC_THRESHOLD_CLAIM_BEGIN) / CONTEXT_STRIDE;
            match (offset - PLIC_THRESHOLD_CLAIM_BEGIN) % CONTEXT_STRIDE {
                0 => self.set_threshold(ctx, val as u32),
                4 => self.complete_irq(ctx, val),
                _ => {}
            }
        }
        Ok(())
    }
}
