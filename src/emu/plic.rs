use axerrno::{AxError, AxResult};
use log::{info, trace};
use spin::Mutex;

use crate::consts::*;
use crate::descriptor::PlicDescriptor;
use crate::driver::IrqChipDriver;

const BITS_PER_WORD: usize = 32;
const IRQ_WORDS: usize = (PLIC_MAX_IRQ + BITS_PER_WORD) / BITS_PER_WORD;

/// In-memory PLIC register file.
pub struct EmuPlic {
    pub base_addr: usize,
    inner: Mutex<EmuPlicInner>,
}

struct EmuPlicInner {
    /// Set by cold init.
    num_sources: Option<usize>,
    prio: [u32; PLIC_MAX_IRQ + 1],
    pending: [u32; IRQ_WORDS],
    enable: [[u32; IRQ_WORDS]; MAX_CONTEXTS],
    threshold: [u32; MAX_CONTEXTS],
    claim: [u32; MAX_CONTEXTS],
}

impl EmuPlic {
    pub fn new(base_addr: usize) -> Self {
        Self {
            base_addr,
            inner: Mutex::new(EmuPlicInner {
                num_sources: None,
                prio: [0; PLIC_MAX_IRQ + 1],
                pending: [0; IRQ_WORDS],
                enable: [[0; IRQ_WORDS]; MAX_CONTEXTS],
                threshold: [0; MAX_CONTEXTS],
                claim: [0; MAX_CONTEXTS],
            }),
        }
    }

    fn index_and_bit(irq: usize) -> (usize, usize) {
        (irq / BITS_PER_WORD, irq % BITS_PER_WORD)
    }

    pub fn num_sources(&self) -> Option<usize> {
        self.inner.lock().num_sources
    }

    pub fn get_prio(&self, irq: usize) -> u32 {
        self.inner.lock().prio.get(irq).copied().unwrap_or(0)
    }

    pub fn set_prio(&self, irq: usize, prio: u32) {
        if let Some(slot) = self.inner.lock().prio.get_mut(irq) {
            *slot = prio;
        }
    }

    pub fn get_pending(&self, irq: usize) -> bool {
        let (index, bit) = Self::index_and_bit(irq);
        self.get_pending_word(index) & (1 << bit) != 0
    }

    pub fn set_pending(&self, irq: usize) {
        let (index, bit) = Self::index_and_bit(irq);
        if let Some(word) = self.inner.lock().pending.get_mut(index) {
            *word |= 1 << bit;
        }
    }

    pub fn clear_pending(&self, irq: usize) {
        let (index, bit) = Self::index_and_bit(irq);
        if let Some(word) = self.inner.lock().pending.get_mut(index) {
            *word &= !(1 << bit);
        }
    }

    pub fn get_pending_word(&self, word: usize) -> u32 {
        self.inner.lock().pending.get(word).copied().unwrap_or(0)
    }

    pub fn get_enable(&self, context: usize, irq: usize) -> bool {
        let (index, bit) = Self::index_and_bit(irq);
        self.get_enable_word(context, index) & (1 << bit) != 0
    }

    pub fn get_enable_word(&self, context: usize, word: usize) -> u32 {
        let inner = self.inner.lock();
        inner
            .enable
            .get(context)
            .and_then(|words| words.get(word))
            .copied()
            .unwrap_or(0)
    }

    pub fn set_enable_word(&self, context: usize, word: usize, val: u32) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.enable.get_mut(context).and_then(|w| w.get_mut(word)) {
            *slot = val;
        }
    }

    pub fn get_threshold(&self, context: usize) -> u32 {
        self.inner.lock().threshold.get(context).copied().unwrap_or(0)
    }

    pub fn set_threshold(&self, context: usize, threshold: u32) {
        if let Some(slot) = self.inner.lock().threshold.get_mut(context) {
            *slot = threshold;
        }
    }

    pub fn get_claim(&self, context: usize) -> u32 {
        self.inner.lock().claim.get(context).copied().unwrap_or(0)
    }

    /// Highest-priority pending source enabled for `context` whose
    /// priority exceeds the context threshold. The source stops pending.
    pub fn claim_irq(&self, context: usize) -> Option<usize> {
        if context >= MAX_CONTEXTS {
            return None;
        }
        let mut inner = self.inner.lock();
        let threshold = inner.threshold[context];
        let mut best: Option<(usize, u32)> = None;

        for irq in 1..=PLIC_MAX_IRQ {
            let (index, bit) = Self::index_and_bit(irq);
            let prio = inner.prio[irq];
            let pending = inner.pending[index] & (1 << bit) != 0;
            let enabled = inner.enable[context][index] & (1 << bit) != 0;
            if pending && enabled && prio > threshold && best.is_none_or(|(_, p)| prio > p) {
                best = Some((irq, prio));
            }
        }

        let (irq, _) = best?;
        let (index, bit) = Self::index_and_bit(irq);
        inner.pending[index] &= !(1 << bit);
        inner.claim[context] = irq as u32;
        Some(irq)
    }

    pub fn complete_irq(&self, context: usize, _irq: usize) {
        if let Some(slot) = self.inner.lock().claim.get_mut(context) {
            *slot = 0;
        }
    }

    fn check_base(&self, desc: &PlicDescriptor) -> AxResult {
        if desc.base.as_usize() != self.base_addr {
            return Err(AxError::InvalidInput);
        }
        Ok(())
    }
}

impl IrqChipDriver for EmuPlic {
    fn cold_init(&self, desc: &PlicDescriptor) -> AxResult {
        self.check_base(desc)?;
        if desc.num_sources == 0 || desc.num_sources > PLIC_MAX_IRQ {
            return Err(AxError::InvalidInput);
        }
        let mut inner = self.inner.lock();
        if inner.num_sources.is_some() {
            return Err(AxError::AlreadyExists);
        }
        inner.prio[1..=desc.num_sources].fill(0);
        inner.num_sources = Some(desc.num_sources);
        info!("EmuPlic@{:#x}: {} sources", self.base_addr, desc.num_sources);
        Ok(())
    }

    fn context_init(
        &self,
        desc: &PlicDescriptor,
        context: usize,
        enable: bool,
        threshold: u32,
    ) -> AxResult {
        self.check_base(desc)?;
        if context >= MAX_CONTEXTS {
            return Err(AxError::InvalidInput);
        }
        let mut inner = self.inner.lock();
        let num_sources = inner.num_sources.ok_or(AxError::BadState)?;

        inner.threshold[context] = threshold;
        for irq in 1..=num_sources {
            let (index, bit) = Self::index_and_bit(irq);
            if enable {
                inner.enable[context][index] |= 1 << bit;
            } else {
                inner.enable[context][index] &= !(1 << bit);
            }
        }
        trace!(
            "EmuPlic@{:#x}: context {context} enable={enable} threshold={threshold}",
            self.base_addr
        );
        Ok(())
    }
}

impl core::fmt::Debug for EmuPlic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EmuPlic")
            .field("base_addr", &format_args!("{:#x}", self.base_addr))
            .field("num_sources", &self.num_sources())
            .finish()
    }
}
