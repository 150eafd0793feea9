//! Cold-once / warm-per-hart orchestration of the platform facilities.
//!
//! The boot protocol keeps the cold hart alone while it runs a cold step,
//! so nothing here takes a lock. Each hart only writes its own state slot;
//! the per-facility cold flags are written once by the cold hart and read
//! with acquire ordering by everybody else.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use axerrno::AxResult;
use log::{error, info, trace};

use crate::capabilities::PlatformOps;
use crate::consts::{MAX_HARTS, PLIC_M_MODE_THRESHOLD, PLIC_S_MODE_THRESHOLD};
use crate::descriptor::DescriptorSet;
use crate::driver::{ConsoleDriver, IpiDriver, IrqChipDriver, TimerDriver, TimerEventHandler};
use crate::error::{InitError, InitResult};
use crate::hart::{ContextMapping, HartId};
use crate::phase::{BootKind, BringUpPhase, HartState};

const NO_HART: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
enum Facility {
    Console = 0,
    Irqchip = 1,
    Ipi = 2,
    Timer = 3,
}

const FACILITY_COUNT: usize = 4;

pub struct Sequencer<'a, I, P, T, C> {
    descriptors: &'a DescriptorSet,
    irqchip: I,
    ipi: P,
    timer: T,
    console: C,
    timer_handler: Option<TimerEventHandler>,
    cold_hart: AtomicUsize,
    cold_done: [AtomicBool; FACILITY_COUNT],
    aborted: AtomicBool,
    harts: [AtomicU8; MAX_HARTS],
}

impl<'a, I, P, T, C> Sequencer<'a, I, P, T, C>
where
    I: IrqChipDriver,
    P: IpiDriver,
    T: TimerDriver,
    C: ConsoleDriver,
{
    /// Validates `descriptors` before any state is built around them.
    pub fn new(
        descriptors: &'a DescriptorSet,
        irqchip: I,
        ipi: P,
        timer: T,
        console: C,
    ) -> InitResult<Self> {
        descriptors.validate()?;
        Ok(Self {
            descriptors,
            irqchip,
            ipi,
            timer,
            console,
            timer_handler: None,
            cold_hart: AtomicUsize::new(NO_HART),
            cold_done: [const { AtomicBool::new(false) }; FACILITY_COUNT],
            aborted: AtomicBool::new(false),
            harts: [const { AtomicU8::new(HartState::Uninitialized.encode()) }; MAX_HARTS],
        })
    }

    /// Handler passed to the timer driver's cold init.
    pub fn with_timer_handler(mut self, handler: TimerEventHandler) -> Self {
        self.timer_handler = Some(handler);
        self
    }

    pub fn descriptors(&self) -> &'a DescriptorSet {
        self.descriptors
    }

    pub fn irqchip(&self) -> &I {
        &self.irqchip
    }

    pub fn ipi(&self) -> &P {
        &self.ipi
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    /// `None` for harts outside the platform.
    pub fn hart_state(&self, hart: HartId) -> Option<HartState> {
        let idx = hart.as_usize();
        (idx < self.descriptors.hart_count)
            .then(|| HartState::decode(self.harts[idx].load(Ordering::Acquire)))
    }

    pub fn cold_hart(&self) -> Option<HartId> {
        match self.cold_hart.load(Ordering::Acquire) {
            NO_HART => None,
            idx => Some(HartId::new(idx)),
        }
    }

    /// A cold step failed; no hart may make further progress.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Programs the PLIC contexts of one hart. Absent contexts are skipped.
    pub fn warm_irqchip_init(&self, contexts: ContextMapping) -> InitResult {
        let plic = &self.descriptors.plic;
        if let Some(ctx) = contexts.machine {
            trace!("plic: enable all sources for M-mode context {ctx}");
            self.irqchip
                .context_init(plic, ctx, true, PLIC_M_MODE_THRESHOLD)?;
        }
        if let Some(ctx) = contexts.supervisor {
            trace!("plic: enable all sources for S-mode context {ctx}");
            self.irqchip
                .context_init(plic, ctx, true, PLIC_S_MODE_THRESHOLD)?;
        }
        Ok(())
    }

    fn boot_kind_of(&self, idx: usize) -> BootKind {
        BootKind::from(self.cold_hart.load(Ordering::Acquire) == idx)
    }

    fn state_at(&self, idx: usize) -> HartState {
        HartState::decode(self.harts[idx].load(Ordering::Acquire))
    }

    fn slot(&self, hart: HartId, phase: BringUpPhase) -> InitResult<usize> {
        let idx = hart.as_usize();
        if idx >= self.descriptors.hart_count {
            error!("{hart}: {phase:?} rejected, only {} harts", self.descriptors.hart_count);
            return Err(InitError::HartOutOfRange);
        }
        Ok(idx)
    }

    /// Marks the hart failed. A hart that already reached `Ready` keeps it.
    fn fail(&self, idx: usize, phase: BringUpPhase, err: InitError) -> InitError {
        let last = HartState::decode(self.harts[idx].load(Ordering::Acquire)).last_phase();
        error!("hart{idx}: {phase:?} failed after {last:?}: {err}");
        let _ = self.harts[idx].fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
            (HartState::decode(raw) != HartState::Ready).then_some(HartState::Failed.encode())
        });
        err
    }

    fn advance(&self, idx: usize, phase: BringUpPhase) {
        let next = match phase {
            BringUpPhase::FinalInit => HartState::Ready,
            phase => HartState::Reached(phase),
        };
        self.harts[idx].store(next.encode(), Ordering::Release);
        info!("hart{idx}: {phase:?} done");
    }

    /// Every check that has to pass before a phase may touch a device.
    fn enter(
        &self,
        hart: HartId,
        phase: BringUpPhase,
        cold: bool,
        facility: Option<Facility>,
    ) -> InitResult<usize> {
        let idx = self.slot(hart, phase)?;

        if self.is_aborted() {
            return Err(self.fail(idx, phase, InitError::Aborted));
        }

        if let Some(facility) = facility {
            let done = self.cold_done[facility as usize].load(Ordering::Acquire);
            if cold && done {
                return Err(self.fail(idx, phase, InitError::AlreadyInitialized));
            }
            if !cold && !done {
                return Err(self.fail(idx, phase, InitError::NotInitialized));
            }
        }

        let kind = self.boot_kind_of(idx);
        let expected = self.state_at(idx).next_phase(kind);
        if expected != Some(phase) {
            return Err(self.fail(
                idx,
                phase,
                InitError::OutOfOrder {
                    expected,
                    found: phase,
                },
            ));
        }
        if phase != BringUpPhase::EarlyInit && BootKind::from(cold) != kind {
            return Err(self.fail(idx, phase, InitError::BootKindMismatch));
        }
        Ok(idx)
    }

    /// Runs the cold step (on the cold hart) and then the warm step of one
    /// facility for `hart`.
    fn run_facility(
        &self,
        hart: HartId,
        phase: BringUpPhase,
        facility: Facility,
        cold: bool,
        cold_step: impl FnOnce() -> AxResult,
        warm_step: impl FnOnce() -> InitResult,
    ) -> InitResult {
        let idx = self.enter(hart, phase, cold, Some(facility))?;

        if cold {
            if let Err(err) = cold_step() {
                self.aborted.store(true, Ordering::Release);
                error!("{facility:?}: cold init failed, aborting platform bring-up");
                return Err(self.fail(idx, phase, err.into()));
            }
            self.cold_done[facility as usize].store(true, Ordering::Release);
            info!("{facility:?}: cold init done on {hart}");
        }

        if let Err(err) = warm_step() {
            return Err(self.fail(idx, phase, err));
        }
        self.advance(idx, phase);
        Ok(())
    }
}

impl<I, P, T, C> PlatformOps for Sequencer<'_, I, P, T, C>
where
    I: IrqChipDriver,
    P: IpiDriver,
    T: TimerDriver,
    C: ConsoleDriver,
{
    fn early_init(&self, cold: bool, hart: HartId) -> InitResult {
        let phase = BringUpPhase::EarlyInit;
        let idx = self.enter(hart, phase, cold, None)?;
        if cold
            && self
                .cold_hart
                .compare_exchange(NO_HART, idx, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return Err(self.fail(idx, phase, InitError::AlreadyInitialized));
        }
        self.advance(idx, phase);
        Ok(())
    }

    fn console_init(&self, hart: HartId) -> InitResult {
        self.run_facility(
            hart,
            BringUpPhase::ConsoleInit,
            Facility::Console,
            true,
            || self.console.init(&self.descriptors.uart),
            || Ok(()),
        )
    }

    fn irqchip_init(&self, cold: bool, hart: HartId) -> InitResult {
        self.run_facility(
            hart,
            BringUpPhase::IrqchipInit,
            Facility::Irqchip,
            cold,
            || self.irqchip.cold_init(&self.descriptors.plic),
            || self.warm_irqchip_init(ContextMapping::for_hart(hart)),
        )
    }

    fn ipi_init(&self, cold: bool, hart: HartId) -> InitResult {
        self.run_facility(
            hart,
            BringUpPhase::IpiInit,
            Facility::Ipi,
            cold,
            || self.ipi.cold_init(&self.descriptors.mswi),
            || Ok(self.ipi.warm_init(hart)?),
        )
    }

    fn timer_init(&self, cold: bool, hart: HartId) -> InitResult {
        self.run_facility(
            hart,
            BringUpPhase::TimerInit,
            Facility::Timer,
            cold,
            || {
                self.timer
                    .cold_init(&self.descriptors.mtimer, self.timer_handler)
            },
            || Ok(self.timer.warm_init(hart)?),
        )
    }

    fn final_init(&self, cold: bool, hart: HartId) -> InitResult {
        let phase = BringUpPhase::FinalInit;
        let idx = self.enter(hart, phase, cold, None)?;
        self.advance(idx, phase);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};

    use axerrno::{AxError, AxResult};
    use spin::Mutex;

    use super::*;
    use crate::board::zerocore_dual;
    use crate::descriptor::{MswiDescriptor, MtimerDescriptor, PlicDescriptor, UartDescriptor};

    const HART0: HartId = HartId::new(0);
    const HART1: HartId = HartId::new(1);

    /// Counts every driver call and can be told to fail.
    struct Recorder {
        cold: AtomicUsize,
        warm: AtomicUsize,
        fail_cold: bool,
        fail_warm: bool,
        contexts: Mutex<[Option<(usize, u32)>; 4]>,
    }

    impl Default for Recorder {
        fn default() -> Self {
            Self {
                cold: AtomicUsize::new(0),
                warm: AtomicUsize::new(0),
                fail_cold: false,
                fail_warm: false,
                contexts: Mutex::new([None; 4]),
            }
        }
    }

    impl Recorder {
        fn failing_cold() -> Self {
            Self {
                fail_cold: true,
                ..Self::default()
            }
        }

        fn failing_warm() -> Self {
            Self {
                fail_warm: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> (usize, usize) {
            (self.cold.load(Ordering::SeqCst), self.warm.load(Ordering::SeqCst))
        }

        fn cold_call(&self) -> AxResult {
            self.cold.fetch_add(1, Ordering::SeqCst);
            if self.fail_cold { Err(AxError::Io) } else { Ok(()) }
        }

        fn warm_call(&self) -> AxResult {
            self.warm.fetch_add(1, Ordering::SeqCst);
            if self.fail_warm { Err(AxError::Io) } else { Ok(()) }
        }
    }

    impl IrqChipDriver for Recorder {
        fn cold_init(&self, _desc: &PlicDescriptor) -> AxResult {
            self.cold_call()
        }

        fn context_init(
            &self,
            _desc: &PlicDescriptor,
            context: usize,
            enable: bool,
            threshold: u32,
        ) -> AxResult {
            assert!(enable);
            self.warm_call()?;
            self.contexts.lock()[context] = Some((context, threshold));
            Ok(())
        }
    }

    impl IpiDriver for Recorder {
        fn cold_init(&self, _desc: &MswiDescriptor) -> AxResult {
            self.cold_call()
        }

        fn warm_init(&self, _hart: HartId) -> AxResult {
            self.warm_call()
        }
    }

    impl TimerDriver for Recorder {
        fn cold_init(
            &self,
            _desc: &MtimerDescriptor,
            _handler: Option<TimerEventHandler>,
        ) -> AxResult {
            self.cold_call()
        }

        fn warm_init(&self, _hart: HartId) -> AxResult {
            self.warm_call()
        }
    }

    impl ConsoleDriver for Recorder {
        fn init(&self, _desc: &UartDescriptor) -> AxResult {
            self.cold_call()
        }
    }

    type RecorderSequencer = Sequencer<'static, Recorder, Recorder, Recorder, Recorder>;

    fn sequencer() -> RecorderSequencer {
        with_drivers(Recorder::default(), Recorder::default(), Recorder::default())
    }

    fn with_drivers(irqchip: Recorder, ipi: Recorder, timer: Recorder) -> RecorderSequencer {
        Sequencer::new(zerocore_dual::descriptors(), irqchip, ipi, timer, Recorder::default())
            .unwrap()
    }

    #[test]
    fn invalid_descriptors_build_no_sequencer() {
        let mut set = *zerocore_dual::descriptors();
        set.hart_count = 16;
        let seq = Sequencer::new(
            &set,
            Recorder::default(),
            Recorder::default(),
            Recorder::default(),
            Recorder::default(),
        );
        assert_eq!(seq.err(), Some(InitError::InvalidDescriptor));

        let mut set = *zerocore_dual::descriptors();
        set.mswi.hart_count = 3;
        let seq = Sequencer::new(
            &set,
            Recorder::default(),
            Recorder::default(),
            Recorder::default(),
            Recorder::default(),
        );
        assert_eq!(seq.err(), Some(InitError::HartOutOfRange));
    }

    #[test]
    fn canonical_two_hart_boot() {
        let seq = sequencer();
        seq.early_init(true, HART0).unwrap();
        seq.early_init(false, HART1).unwrap();
        seq.console_init(HART0).unwrap();
        seq.irqchip_init(true, HART0).unwrap();
        seq.irqchip_init(false, HART1).unwrap();
        seq.ipi_init(true, HART0).unwrap();
        seq.ipi_init(false, HART1).unwrap();
        seq.timer_init(true, HART0).unwrap();
        seq.timer_init(false, HART1).unwrap();
        seq.final_init(true, HART0).unwrap();
        seq.final_init(false, HART1).unwrap();

        assert_eq!(seq.hart_state(HART0), Some(HartState::Ready));
        assert_eq!(seq.hart_state(HART1), Some(HartState::Ready));
        assert_eq!(seq.cold_hart(), Some(HART0));
        assert!(!seq.is_aborted());

        assert_eq!(seq.console().calls(), (1, 0));
        // one cold init, two contexts per hart
        assert_eq!(seq.irqchip().calls(), (1, 4));
        assert_eq!(seq.ipi().calls(), (1, 2));
        assert_eq!(seq.timer().calls(), (1, 2));

        let contexts = *seq.irqchip().contexts.lock();
        assert_eq!(
            contexts,
            [
                Some((0, PLIC_M_MODE_THRESHOLD)),
                Some((1, PLIC_S_MODE_THRESHOLD)),
                Some((2, PLIC_M_MODE_THRESHOLD)),
                Some((3, PLIC_S_MODE_THRESHOLD)),
            ]
        );
    }

    #[test]
    fn bring_up_runs_every_phase() {
        let seq = sequencer();
        seq.bring_up(BootKind::Cold, HART0).unwrap();
        seq.bring_up(BootKind::Warm, HART1).unwrap();
        assert_eq!(seq.hart_state(HART0), Some(HartState::Ready));
        assert_eq!(seq.hart_state(HART1), Some(HartState::Ready));
        assert_eq!(seq.console().calls(), (1, 0));
    }

    #[test]
    fn second_cold_init_is_rejected_without_device_access() {
        let seq = sequencer();
        seq.early_init(true, HART0).unwrap();
        seq.console_init(HART0).unwrap();
        seq.irqchip_init(true, HART0).unwrap();
        let before = seq.irqchip().calls();

        assert_eq!(
            seq.irqchip_init(true, HART0),
            Err(InitError::AlreadyInitialized)
        );
        assert_eq!(seq.irqchip().calls(), before);
        assert_eq!(seq.hart_state(HART0), Some(HartState::Failed));

        assert_eq!(seq.console_init(HART1), Err(InitError::AlreadyInitialized));
        assert_eq!(seq.console().calls(), (1, 0));

        let seq = sequencer();
        seq.bring_up(BootKind::Cold, HART0).unwrap();
        assert_eq!(seq.ipi_init(true, HART1), Err(InitError::AlreadyInitialized));
        assert_eq!(seq.timer_init(true, HART1), Err(InitError::AlreadyInitialized));
        assert_eq!(seq.ipi().calls(), (1, 1));
        assert_eq!(seq.timer().calls(), (1, 1));
        assert_eq!(seq.hart_state(HART0), Some(HartState::Ready));
        assert_eq!(seq.hart_state(HART1), Some(HartState::Failed));
    }

    #[test]
    fn second_cold_hart_is_rejected() {
        let seq = sequencer();
        seq.early_init(true, HART0).unwrap();
        assert_eq!(seq.early_init(true, HART1), Err(InitError::AlreadyInitialized));
        assert_eq!(seq.cold_hart(), Some(HART0));
        assert_eq!(seq.hart_state(HART1), Some(HartState::Failed));
    }

    #[test]
    fn warm_before_cold_is_rejected_without_device_access() {
        let seq = sequencer();
        seq.early_init(false, HART1).unwrap();
        assert_eq!(seq.irqchip_init(false, HART1), Err(InitError::NotInitialized));
        assert_eq!(seq.irqchip().calls(), (0, 0));

        let seq = sequencer();
        seq.early_init(false, HART1).unwrap();
        assert_eq!(seq.ipi_init(false, HART1), Err(InitError::NotInitialized));
        assert_eq!(seq.timer_init(false, HART1), Err(InitError::NotInitialized));
        assert_eq!(seq.ipi().calls(), (0, 0));
        assert_eq!(seq.timer().calls(), (0, 0));
    }

    #[test]
    fn cold_irqchip_failure_stops_every_hart() {
        let seq = with_drivers(Recorder::failing_cold(), Recorder::default(), Recorder::default());
        seq.early_init(true, HART0).unwrap();
        seq.early_init(false, HART1).unwrap();
        seq.console_init(HART0).unwrap();

        assert_eq!(
            seq.irqchip_init(true, HART0),
            Err(InitError::DeviceUnresponsive)
        );
        assert!(seq.is_aborted());
        // the warm step never ran on the cold hart either
        assert_eq!(seq.irqchip().calls(), (1, 0));

        assert_eq!(seq.irqchip_init(false, HART1), Err(InitError::Aborted));
        assert_eq!(seq.irqchip().calls(), (1, 0));
        assert_eq!(seq.hart_state(HART0), Some(HartState::Failed));
        assert_eq!(seq.hart_state(HART1), Some(HartState::Failed));

        assert_eq!(seq.bring_up(BootKind::Warm, HART1), Err(InitError::Aborted));
    }

    #[test]
    fn cold_timer_failure_stops_every_hart() {
        let seq = with_drivers(Recorder::default(), Recorder::default(), Recorder::failing_cold());
        assert_eq!(
            seq.bring_up(BootKind::Cold, HART0),
            Err(InitError::DeviceUnresponsive)
        );
        assert!(seq.is_aborted());
        assert_eq!(seq.timer().calls(), (1, 0));
        assert_eq!(seq.hart_state(HART0), Some(HartState::Failed));

        assert_eq!(seq.bring_up(BootKind::Warm, HART1), Err(InitError::Aborted));
        assert_eq!(seq.ipi().calls(), (1, 1));
        assert_eq!(seq.timer().calls(), (1, 0));
        assert_eq!(seq.hart_state(HART1), Some(HartState::Failed));
    }

    #[test]
    fn cold_ipi_failure_stops_every_hart() {
        let seq = with_drivers(Recorder::default(), Recorder::failing_cold(), Recorder::default());
        seq.early_init(false, HART1).unwrap();
        assert_eq!(
            seq.bring_up(BootKind::Cold, HART0),
            Err(InitError::DeviceUnresponsive)
        );
        assert!(seq.is_aborted());
        assert_eq!(seq.irqchip_init(false, HART1), Err(InitError::Aborted));
        assert_eq!(seq.irqchip().calls(), (1, 2));
        assert_eq!(seq.timer().calls(), (0, 0));
    }

    #[test]
    fn warm_failure_only_stops_its_hart() {
        let seq = with_drivers(Recorder::default(), Recorder::failing_warm(), Recorder::default());
        assert_eq!(
            seq.bring_up(BootKind::Cold, HART0),
            Err(InitError::DeviceUnresponsive)
        );
        assert_eq!(seq.hart_state(HART0), Some(HartState::Failed));
        assert!(!seq.is_aborted());
        // cold step succeeded, so a later hart sees a live facility
        assert_eq!(seq.ipi().calls(), (1, 1));
    }

    #[test]
    fn phases_cannot_be_skipped() {
        let seq = sequencer();
        assert_eq!(
            seq.console_init(HART0),
            Err(InitError::OutOfOrder {
                expected: Some(BringUpPhase::EarlyInit),
                found: BringUpPhase::ConsoleInit,
            })
        );
        assert_eq!(seq.hart_state(HART0), Some(HartState::Failed));
        assert_eq!(seq.console().calls(), (0, 0));

        let seq = sequencer();
        seq.early_init(true, HART0).unwrap();
        assert_eq!(
            seq.irqchip_init(true, HART0),
            Err(InitError::OutOfOrder {
                expected: Some(BringUpPhase::ConsoleInit),
                found: BringUpPhase::IrqchipInit,
            })
        );
        assert_eq!(seq.irqchip().calls(), (0, 0));
    }

    #[test]
    fn warm_hart_cannot_run_cold_steps() {
        let seq = sequencer();
        seq.early_init(true, HART0).unwrap();
        seq.early_init(false, HART1).unwrap();
        assert_eq!(
            seq.irqchip_init(true, HART1),
            Err(InitError::BootKindMismatch)
        );
        assert_eq!(seq.irqchip().calls(), (0, 0));
    }

    #[test]
    fn ready_is_never_left() {
        let seq = sequencer();
        seq.bring_up(BootKind::Cold, HART0).unwrap();
        assert!(matches!(
            seq.final_init(true, HART0),
            Err(InitError::OutOfOrder { expected: None, .. })
        ));
        assert_eq!(seq.hart_state(HART0), Some(HartState::Ready));
    }

    #[test]
    fn harts_outside_the_platform_are_rejected() {
        let seq = sequencer();
        let hart = HartId::new(2);
        assert_eq!(seq.early_init(false, hart), Err(InitError::HartOutOfRange));
        assert_eq!(seq.hart_state(hart), None);
    }

    #[test]
    fn absent_contexts_are_skipped() {
        let seq = sequencer();
        assert_eq!(seq.warm_irqchip_init(ContextMapping::from_raw(-1, -1)), Ok(()));
        assert_eq!(seq.irqchip().calls(), (0, 0));

        assert_eq!(seq.warm_irqchip_init(ContextMapping::from_raw(-1, 3)), Ok(()));
        assert_eq!(seq.irqchip().calls(), (0, 1));
        assert_eq!(
            seq.irqchip().contexts.lock()[3],
            Some((3, PLIC_S_MODE_THRESHOLD))
        );
    }
}
