//! # MMU Context

use crate::{MmuLayout, PageSize, Platform, TlbFlushHook};
use alloc::boxed::Box;
use log::{debug, warn};
use mmu_chipset::{ChipInfo, ChipsetError, EngineKind, MmuDesc, MmuParams};
use mmu_fields::FieldError;
use mmu_sync::SpinLock;

/// Runtime tunables.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MmuConfig {
    /// How long one engine's TLB flush may stay busy before it is reported.
    pub flush_timeout_ns: u64,
}

impl MmuConfig {
    pub const DEFAULT_FLUSH_TIMEOUT_NS: u64 = 2_000_000_000;

    #[must_use]
    pub const fn with_flush_timeout_ns(mut self, ns: u64) -> Self {
        self.flush_timeout_ns = ns;
        self
    }
}

impl Default for MmuConfig {
    fn default() -> Self {
        Self {
            flush_timeout_ns: Self::DEFAULT_FLUSH_TIMEOUT_NS,
        }
    }
}

/// Errors raised while bringing up the MMU.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MmuError {
    #[error(transparent)]
    Chipset(#[from] ChipsetError),
    #[error("malformed MMU field table: {0}")]
    Fields(#[from] FieldError),
}

/// One device's MMU.
///
/// Shared by every [`AddressSpace`](crate::AddressSpace) of the device. All
/// operations take `&self`; the flush sequence is serialized internally.
pub struct Mmu<P: Platform> {
    platform: P,
    chip: &'static ChipInfo,
    desc: &'static MmuDesc,
    layout: MmuLayout,
    config: MmuConfig,
    hooks: [Option<Box<dyn TlbFlushHook>>; EngineKind::COUNT],
    pub(crate) flush_lock: SpinLock<()>,
}

impl<P: Platform> Mmu<P> {
    /// Bring up the MMU of `chip`.
    ///
    /// # Errors
    /// - [`ChipsetError::NoMmuBackend`] if the chip has no MMU description.
    /// - [`MmuError::Fields`] if its field table lacks a required row.
    pub fn new(platform: P, chip: &'static ChipInfo, config: MmuConfig) -> Result<Self, MmuError> {
        let desc = chip.mmu_desc()?;
        let layout = MmuLayout::resolve(&desc.table())?;

        if !chip.igp && platform.stolen_base().is_some() {
            warn!("{}: discrete part, ignoring the stolen memory base", chip.name);
        }

        debug!(
            "{} MMU ({}): {:#x} byte space, {} DMA bits, {} MiB per directory entry",
            chip.name,
            desc.name,
            desc.params.limit,
            desc.params.dma_bits,
            desc.params.pde_span() >> 20
        );

        Ok(Self {
            platform,
            chip,
            desc,
            layout,
            config,
            hooks: [const { None }; EngineKind::COUNT],
            flush_lock: SpinLock::new(()),
        })
    }

    /// Identify `chipset` and bring up its MMU.
    ///
    /// # Errors
    /// [`ChipsetError::Unknown`] for unrecognized chipsets, otherwise as
    /// [`new`](Self::new).
    pub fn probe(platform: P, chipset: u32, config: MmuConfig) -> Result<Self, MmuError> {
        let chip = mmu_chipset::identify(chipset)?;
        Self::new(platform, chip, config)
    }

    /// Route TLB flushes of `kind` through `hook` instead of the generic
    /// flush register. Replaces an earlier hook.
    pub fn register_tlb_flush(&mut self, kind: EngineKind, hook: Box<dyn TlbFlushHook>) {
        debug!("{}: {kind} registered a TLB flush hook", self.chip.name);
        self.hooks[kind.index()] = Some(hook);
    }

    pub(crate) fn tlb_flush_hook(&self, kind: EngineKind) -> Option<&dyn TlbFlushHook> {
        self.hooks[kind.index()].as_deref()
    }

    #[inline]
    #[must_use]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    #[inline]
    #[must_use]
    pub const fn chip(&self) -> &'static ChipInfo {
        self.chip
    }

    #[inline]
    #[must_use]
    pub const fn params(&self) -> &'static MmuParams {
        &self.desc.params
    }

    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &MmuLayout {
        &self.layout
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &MmuConfig {
        &self.config
    }

    /// Base VRAM objects are retargeted to.
    ///
    /// Only integrated parts carve VRAM out of system memory; a base the
    /// platform reports for a discrete chip is ignored.
    #[must_use]
    pub fn stolen_base(&self) -> Option<u64> {
        self.platform.stolen_base().filter(|_| self.chip.igp)
    }

    /// Page shift of PTEs in a table of `size`.
    #[inline]
    #[must_use]
    pub const fn page_shift(&self, size: PageSize) -> u8 {
        match size {
            PageSize::Small => self.params().spg_shift,
            PageSize::Large => self.params().lpg_shift,
        }
    }

    /// The table size that uses PTEs of `page_shift`, if any.
    #[must_use]
    pub const fn page_size(&self, page_shift: u8) -> Option<PageSize> {
        if page_shift == self.params().spg_shift {
            Some(PageSize::Small)
        } else if page_shift == self.params().lpg_shift {
            Some(PageSize::Large)
        } else {
            None
        }
    }
}
