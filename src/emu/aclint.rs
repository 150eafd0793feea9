//! ACLINT software-interrupt and timer models.

use axerrno::{AxError, AxResult};
use log::{info, trace};
use spin::Mutex;

use crate::consts::MAX_HARTS;
use crate::descriptor::{MswiDescriptor, MtimerDescriptor};
use crate::driver::{IpiDriver, TimerDriver, TimerEventHandler};
use crate::hart::HartId;

/// Harts `[first, first + count)` served by one device.
#[derive(Debug, Clone, Copy)]
struct HartSpan {
    first: usize,
    count: usize,
}

impl HartSpan {
    fn new(first: usize, count: usize) -> AxResult<Self> {
        match first.checked_add(count) {
            Some(end) if count > 0 && end <= MAX_HARTS => Ok(Self { first, count }),
            _ => Err(AxError::InvalidInput),
        }
    }

    fn check(span: Option<Self>, hart: HartId) -> AxResult<usize> {
        let span = span.ok_or(AxError::BadState)?;
        let idx = hart.as_usize();
        if (span.first..span.first + span.count).contains(&idx) {
            Ok(idx)
        } else {
            Err(AxError::InvalidInput)
        }
    }
}

pub struct EmuMswi {
    pub base_addr: usize,
    inner: Mutex<MswiInner>,
}

struct MswiInner {
    span: Option<HartSpan>,
    msip: [u32; MAX_HARTS],
}

impl EmuMswi {
    pub fn new(base_addr: usize) -> Self {
        Self {
            base_addr,
            inner: Mutex::new(MswiInner {
                span: None,
                msip: [0; MAX_HARTS],
            }),
        }
    }

    pub fn send_ipi(&self, hart: HartId) -> AxResult {
        let mut inner = self.inner.lock();
        let idx = HartSpan::check(inner.span, hart)?;
        inner.msip[idx] = 1;
        trace!("EmuMswi: ipi -> {hart}");
        Ok(())
    }

    pub fn clear_ipi(&self, hart: HartId) -> AxResult {
        let mut inner = self.inner.lock();
        let idx = HartSpan::check(inner.span, hart)?;
        inner.msip[idx] = 0;
        Ok(())
    }

    pub fn is_pending(&self, hart: HartId) -> bool {
        let inner = self.inner.lock();
        inner.msip.get(hart.as_usize()).is_some_and(|&msip| msip & 1 != 0)
    }
}

impl IpiDriver for EmuMswi {
    fn cold_init(&self, desc: &MswiDescriptor) -> AxResult {
        if desc.base.as_usize() != self.base_addr {
            return Err(AxError::InvalidInput);
        }
        let span = HartSpan::new(desc.first_hart, desc.hart_count)?;
        let mut inner = self.inner.lock();
        if inner.span.is_some() {
            return Err(AxError::AlreadyExists);
        }
        inner.span = Some(span);
        inner.msip = [0; MAX_HARTS];
        info!(
            "EmuMswi@{:#x}: harts {}..{}",
            self.base_addr,
            span.first,
            span.first + span.count
        );
        Ok(())
    }

    /// Drops any IPI left pending from before the hart came up.
    fn warm_init(&self, hart: HartId) -> AxResult {
        self.clear_ipi(hart)
    }
}

pub struct EmuMtimer {
    pub base_addr: usize,
    inner: Mutex<MtimerInner>,
}

struct MtimerInner {
    span: Option<HartSpan>,
    frequency: u64,
    handler: Option<TimerEventHandler>,
    mtime: u64,
    mtimecmp: [u64; MAX_HARTS],
}

impl EmuMtimer {
    /// `base_addr` is the address of `mtime`.
    pub fn new(base_addr: usize) -> Self {
        Self {
            base_addr,
            inner: Mutex::new(MtimerInner {
                span: None,
                frequency: 0,
                handler: None,
                mtime: 0,
                mtimecmp: [u64::MAX; MAX_HARTS],
            }),
        }
    }

    /// `None` until cold init.
    pub fn frequency(&self) -> Option<u64> {
        let inner = self.inner.lock();
        inner.span.map(|_| inner.frequency)
    }

    pub fn mtime(&self) -> u64 {
        self.inner.lock().mtime
    }

    pub fn set_mtime(&self, value: u64) {
        self.inner.lock().mtime = value;
    }

    pub fn timecmp(&self, hart: HartId) -> Option<u64> {
        self.inner.lock().mtimecmp.get(hart.as_usize()).copied()
    }

    pub fn set_timecmp(&self, hart: HartId, value: u64) -> AxResult {
        let mut inner = self.inner.lock();
        let idx = HartSpan::check(inner.span, hart)?;
        inner.mtimecmp[idx] = value;
        Ok(())
    }

    pub fn is_pending(&self, hart: HartId) -> bool {
        let inner = self.inner.lock();
        inner
            .mtimecmp
            .get(hart.as_usize())
            .is_some_and(|&cmp| inner.mtime >= cmp)
    }

    /// Advances the shared `mtime` and runs the handler for every hart
    /// whose comparator has been reached. Returns how many fired.
    pub fn advance(&self, ticks: u64) -> usize {
        let (handler, span, fired) = {
            let mut inner = self.inner.lock();
            inner.mtime = inner.mtime.saturating_add(ticks);
            let mut fired = [false; MAX_HARTS];
            if let Some(span) = inner.span {
                for idx in span.first..span.first + span.count {
                    fired[idx] = inner.mtime >= inner.mtimecmp[idx];
                }
            }
            (inner.handler, inner.span, fired)
        };
        let Some(span) = span else {
            return 0;
        };
        let mut count = 0;
        for idx in (span.first..span.first + span.count).filter(|&idx| fired[idx]) {
            if let Some(handler) = handler {
                handler(HartId::new(idx));
            }
            count += 1;
        }
        count
    }
}

impl TimerDriver for EmuMtimer {
    fn cold_init(&self, desc: &MtimerDescriptor, handler: Option<TimerEventHandler>) -> AxResult {
        if desc.mtime_base.as_usize() != self.base_addr || desc.frequency == 0 {
            return Err(AxError::InvalidInput);
        }
        let span = HartSpan::new(desc.first_hart, desc.hart_count)?;
        let mut inner = self.inner.lock();
        if inner.span.is_some() {
            return Err(AxError::AlreadyExists);
        }
        inner.span = Some(span);
        inner.frequency = desc.frequency;
        inner.handler = handler;
        inner.mtimecmp = [u64::MAX; MAX_HARTS];
        info!(
            "EmuMtimer@{:#x}: {} Hz, shared mtime: {}",
            self.base_addr, desc.frequency, desc.has_shared_mtime
        );
        Ok(())
    }

    /// Parks the hart's comparator so nothing fires until it is programmed.
    fn warm_init(&self, hart: HartId) -> AxResult {
        self.set_timecmp(hart, u64::MAX)
    }
}
