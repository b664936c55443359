//! # Flush Coordinator

use crate::{EngineRefs, FlushTarget, Mmu, Platform, flush_target};
use log::{error, warn};
use mmu_chipset::EngineKind;
use mmu_registers::MmuFlushCtrl;

impl<P: Platform> Mmu<P> {
    /// Make page-table updates visible to every engine in `refs`.
    ///
    /// Flushes the BAR first, then each referenced engine in [`EngineKind`]
    /// order: through its registered hook if it has one, else through the
    /// flush-control register. A flush that stays busy past the configured
    /// timeout is logged and the remaining engines are still flushed.
    pub fn flush(&self, refs: &EngineRefs) {
        let _guard = self.flush_lock.lock();

        self.platform().bar_flush();

        for kind in refs.referenced() {
            if let Some(hook) = self.tlb_flush_hook(kind) {
                hook.tlb_flush();
                continue;
            }

            if self.chip().needs_tlb_flush_hook(kind) {
                warn!(
                    "{}: {kind} needs its own TLB flush but has no hook",
                    self.chip().name
                );
            }

            if let FlushTarget::Generic(code) = flush_target(kind) {
                self.flush_engine(kind, code);
            }
        }
    }

    fn flush_engine(&self, kind: EngineKind, code: u8) {
        let ctrl = self.params().flush_ctrl;
        let platform = self.platform();

        platform.store(ctrl, MmuFlushCtrl::kick(code));
        let done = mmu_registers::wait(
            platform,
            platform,
            ctrl,
            MmuFlushCtrl::BUSY_MASK,
            0,
            self.config().flush_timeout_ns,
        );
        if !done {
            error!("vm flush timeout: engine {kind} (target {code:#04x})");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, FakePlatform, capture_logs, logged, tesla_mmu, tesla_mmu_on};
    use log::Level;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn refs(kinds: &[EngineKind]) -> EngineRefs {
        let refs = EngineRefs::new();
        for &kind in kinds {
            refs.inc(kind);
        }
        refs
    }

    #[test]
    fn bar_then_each_referenced_engine() {
        let mmu = tesla_mmu();
        mmu.flush(&refs(&[EngineKind::Ce0, EngineKind::Gr]));
        assert_eq!(
            mmu.platform().events(),
            [Event::BarFlush, Event::Kick(0x00), Event::Kick(0x0d)]
        );
    }

    #[test]
    fn unreferenced_space_only_flushes_bar() {
        let mmu = tesla_mmu();
        mmu.flush(&EngineRefs::new());
        assert_eq!(mmu.platform().events(), [Event::BarFlush]);
    }

    #[test]
    fn engines_without_generic_target_are_skipped() {
        let mmu = tesla_mmu();
        mmu.flush(&refs(&[EngineKind::Fifo, EngineKind::Disp, EngineKind::Msvld]));
        assert_eq!(mmu.platform().events(), [Event::BarFlush, Event::Kick(0x09)]);
    }

    #[test]
    fn stuck_engine_does_not_block_the_others() {
        let mmu = tesla_mmu_on(FakePlatform::new().with_stuck(0x00));
        mmu.flush(&refs(&[EngineKind::Gr, EngineKind::Ce0]));
        assert_eq!(
            mmu.platform().events(),
            [Event::BarFlush, Event::Kick(0x00), Event::Kick(0x0d)]
        );
        // CE0's flush ran to completion.
        assert_eq!(mmu.platform().ctrl() & 1, 0);
    }

    #[test]
    fn timeout_is_reported_with_the_engine() {
        capture_logs();
        let mmu = tesla_mmu_on(FakePlatform::new().with_stuck(0x00));
        mmu.flush(&refs(&[EngineKind::Gr, EngineKind::Ce0]));
        assert_eq!(
            logged(Level::Error),
            ["vm flush timeout: engine GR (target 0x00)"]
        );
    }

    #[test]
    fn quirk_engine_without_hook_is_warned_about() {
        capture_logs();
        let mut mmu = tesla_mmu();
        mmu.flush(&refs(&[EngineKind::Gr, EngineKind::Mpeg]));
        assert_eq!(
            logged(Level::Warn),
            ["NV50: GR needs its own TLB flush but has no hook"]
        );
        assert!(logged(Level::Error).is_empty());

        capture_logs();
        mmu.register_tlb_flush(EngineKind::Gr, Box::new(|| {}));
        mmu.flush(&refs(&[EngineKind::Gr, EngineKind::Mpeg]));
        assert!(logged(Level::Warn).is_empty());
        assert_eq!(
            mmu.platform().events(),
            [
                Event::BarFlush,
                Event::Kick(0x00),
                Event::Kick(0x08),
                Event::BarFlush,
                Event::Kick(0x08),
            ]
        );
    }

    #[test]
    fn hook_replaces_generic_flush() {
        let mut mmu = tesla_mmu();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        mmu.register_tlb_flush(
            EngineKind::Gr,
            Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        );

        mmu.flush(&refs(&[EngineKind::Gr, EngineKind::Vp]));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(mmu.platform().events(), [Event::BarFlush, Event::Kick(0x01)]);
    }

    #[test]
    fn concurrent_flushes_do_not_interleave() {
        const THREADS: usize = 4;
        const ROUNDS: usize = 200;

        let mmu = tesla_mmu_on(FakePlatform::new().with_busy_reads(3));
        let engines = refs(&[EngineKind::Gr, EngineKind::Vp, EngineKind::Ce0]);

        std::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    for _ in 0..ROUNDS {
                        mmu.flush(&engines);
                    }
                });
            }
        });

        let platform = mmu.platform();
        assert_eq!(platform.overlaps(), 0);
        let events = platform.events();
        assert_eq!(events.len(), THREADS * ROUNDS * 4);
        for sequence in events.chunks(4) {
            assert_eq!(
                sequence,
                [Event::BarFlush, Event::Kick(0x00), Event::Kick(0x01), Event::Kick(0x0d)]
            );
        }
    }
}
