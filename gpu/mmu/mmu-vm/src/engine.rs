//! # Engine References and Flush Targets

use core::sync::atomic::{AtomicU32, Ordering};
use mmu_chipset::EngineKind;

/// How an engine's TLB is reached through the generic flush register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FlushTarget {
    /// Code written to the `engine` field of the flush-control register.
    Generic(u8),
    /// The engine has no slot in the flush register.
    NoGenericFlush,
}

/// Flush-target code of every engine kind.
///
/// | Engines          | Code   |
/// |------------------|--------|
/// | GR               | `0x00` |
/// | VP, MSPDEC       | `0x01` |
/// | BAR              | `0x06` |
/// | MSPPP, MPEG      | `0x08` |
/// | BSP, MSVLD       | `0x09` |
/// | CIPHER, SEC      | `0x0a` |
/// | CE0              | `0x0d` |
#[must_use]
pub const fn flush_target(kind: EngineKind) -> FlushTarget {
    match kind {
        EngineKind::Gr => FlushTarget::Generic(0x00),
        EngineKind::Vp | EngineKind::Mspdec => FlushTarget::Generic(0x01),
        EngineKind::Bar => FlushTarget::Generic(0x06),
        EngineKind::Msppp | EngineKind::Mpeg => FlushTarget::Generic(0x08),
        EngineKind::Bsp | EngineKind::Msvld => FlushTarget::Generic(0x09),
        EngineKind::Cipher | EngineKind::Sec => FlushTarget::Generic(0x0a),
        EngineKind::Ce0 => FlushTarget::Generic(0x0d),
        EngineKind::Dmaobj
        | EngineKind::Fifo
        | EngineKind::Sw
        | EngineKind::Ce1
        | EngineKind::Ce2
        | EngineKind::Disp
        | EngineKind::Pm => FlushTarget::NoGenericFlush,
    }
}

/// Per-engine count of users that need an address space's translations.
///
/// A flush visits only engines with a non-zero count.
pub struct EngineRefs {
    counts: [AtomicU32; EngineKind::COUNT],
}

impl Default for EngineRefs {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for EngineRefs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(self.referenced().map(|kind| (kind, self.get(kind))))
            .finish()
    }
}

impl EngineRefs {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counts: [const { AtomicU32::new(0) }; EngineKind::COUNT],
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, kind: EngineKind) -> u32 {
        self.counts[kind.index()].load(Ordering::Acquire)
    }

    /// Take a reference; returns the new count.
    pub fn inc(&self, kind: EngineKind) -> u32 {
        self.counts[kind.index()].fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drop a reference; returns the new count.
    ///
    /// # Panics
    /// If `kind` holds no reference.
    pub fn dec(&self, kind: EngineKind) -> u32 {
        let prev = self.counts[kind.index()]
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match prev {
            Ok(n) => n - 1,
            Err(_) => panic!("{kind} engine reference underflow"),
        }
    }

    /// Engines with a non-zero count, in flush order.
    pub fn referenced(&self) -> impl Iterator<Item = EngineKind> + '_ {
        EngineKind::ALL.into_iter().filter(|&kind| self.get(kind) != 0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.referenced().next().is_none()
    }
}
