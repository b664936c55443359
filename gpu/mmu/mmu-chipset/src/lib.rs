//! # Chipset Registry
//!
//! Maps a chip revision identifier (the `chipset` field of the boot
//! register) to a static [`ChipInfo`]: marketing name, whether it is an
//! integrated part, which engines exist, which engines need a dedicated
//! TLB-flush sequence, and the description of its MMU.
//!
//! The registry is plain data. Adding a chip means adding a row.
//!
//! ```rust
//! use mmu_chipset::{identify, EngineKind};
//!
//! let chip = identify(0xa3).unwrap();
//! assert_eq!(chip.name, "GT215");
//! assert!(chip.has_engine(EngineKind::Ce0));
//! assert_eq!(chip.mmu_desc().unwrap().params.pgt_bits, 17);
//! ```

#![cfg_attr(not(test), no_std)]

mod engine;
mod kepler;
mod mmu;
mod tesla;

pub use crate::engine::EngineKind;
pub use crate::mmu::{MmuDesc, MmuParams};

/// Tesla MMU description, shared by every Tesla chip.
pub static TESLA_MMU: &MmuDesc = &tesla::MMU;

/// Static description of one chip revision.
#[derive(Copy, Clone, Debug)]
pub struct ChipInfo {
    pub chipset: u32,
    pub name: &'static str,
    /// Integrated part; VRAM may be carved out of system memory.
    pub igp: bool,
    /// Engines present on this chip.
    pub engines: &'static [EngineKind],
    /// Engines whose TLB must be invalidated through their own hook.
    pub tlb_flush_quirks: &'static [EngineKind],
    /// `None` when this layer has no MMU backend for the chip.
    pub mmu: Option<&'static MmuDesc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChipsetError {
    #[error("unknown chipset {chipset:#x}")]
    Unknown { chipset: u32 },
    #[error("no MMU backend for {name}")]
    NoMmuBackend { name: &'static str },
}

impl ChipInfo {
    #[must_use]
    pub fn has_engine(&self, kind: EngineKind) -> bool {
        self.engines.contains(&kind)
    }

    /// Whether `kind` must be flushed through a registered hook on this chip.
    #[must_use]
    pub fn needs_tlb_flush_hook(&self, kind: EngineKind) -> bool {
        self.tlb_flush_quirks.contains(&kind)
    }

    /// The chip's MMU description.
    ///
    /// # Errors
    /// [`ChipsetError::NoMmuBackend`] for chips without one.
    pub const fn mmu_desc(&self) -> Result<&'static MmuDesc, ChipsetError> {
        match self.mmu {
            Some(desc) => Ok(desc),
            None => Err(ChipsetError::NoMmuBackend { name: self.name }),
        }
    }
}

/// Every registered chip, Tesla first.
pub fn chips() -> impl Iterator<Item = &'static ChipInfo> {
    tesla::CHIPS.iter().chain(kepler::CHIPS.iter())
}

/// Look up a chip revision.
///
/// # Errors
/// [`ChipsetError::Unknown`] if no row matches.
pub fn identify(chipset: u32) -> Result<&'static ChipInfo, ChipsetError> {
    chips()
        .find(|c| c.chipset == chipset)
        .ok_or(ChipsetError::Unknown { chipset })
}
