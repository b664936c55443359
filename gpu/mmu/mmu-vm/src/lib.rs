//! # GPU Virtual Memory (NV50 MMU)
//!
//! Builds and maintains the two-level hardware page tables of an NV50-class
//! GPU MMU, and makes updates visible to the engines through the TLB-flush
//! protocol.
//!
//! ```text
//!            page directory            page tables (per directory entry)
//!           ┌──────────────┐           ┌───────────────┐
//!  VA ──►   │ PDE[va>>29]  │ ──4K────► │ PTE[(va>>12)] │ ──► VRAM / system page
//!           │              │ ──64K───► │ PTE[(va>>16)] │
//!           └──────────────┘           └───────────────┘
//! ```
//!
//! Every directory entry spans 512 MiB and may point at a small-page (4 KiB)
//! table, a large-page (64 KiB) table, or both. Entries are 64 bits, written
//! as a pair of 32-bit words (low, then high).
//!
//! ## Layers
//!
//! - [`Mmu`]: one per device. Owns the register handle ([`Platform`]), the
//!   chip description, the resolved bit layout ([`MmuLayout`]) and the flush
//!   lock. Hosts the stateless engines: PTE encoder, PDE builder, mapping and
//!   unmap engines, and the flush coordinator.
//! - [`AddressSpace`]: one per GPU context. Owns the page directory, the page
//!   tables and the per-engine reference counts.
//!
//! Physical memory, page-table backing and register access are external;
//! they come in through [`GpuMemory`], [`TableAlloc`] and [`Platform`].
//!
//! ## Synchronization
//!
//! Page-table writes are not locked; concurrent writers to the same slots
//! must be serialized by the caller. Only the flush sequence is serialized,
//! across the whole device, since the flush-control register is shared.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod access;
mod address_space;
mod engine;
mod flush;
mod layout;
mod map;
mod memory;
mod mmu;
mod pde;
mod pte;
#[cfg(test)]
mod testing;
mod vma;

pub use crate::access::Access;
pub use crate::address_space::{AddressSpace, AddressSpaceError};
pub use crate::engine::{EngineRefs, FlushTarget, flush_target};
pub use crate::layout::{MmuLayout, PdeLayout, PteLayout};
pub use crate::map::PteRun;
pub use crate::memory::{Aperture, Backing, Domain, MemoryObject, TagAllocation};
pub use crate::mmu::{Mmu, MmuConfig, MmuError};
pub use crate::pde::{PDE_POISON, SizeClass};
pub use crate::vma::{PageSize, Vma};
pub use mmu_chipset::EngineKind;
use mmu_registers::{Mmio, Timer};

/// A physically backed GPU object (page directory or page table).
///
/// Offsets are byte offsets into the object. Implementations decide how the
/// CPU reaches the memory (BAR window, instance memory, a test vector).
pub trait GpuMemory {
    /// Bus address of the first byte.
    fn addr(&self) -> u64;

    /// Size in bytes.
    fn size(&self) -> u64;

    fn rd32(&self, offset: u64) -> u32;

    fn wr32(&mut self, offset: u64, value: u32);

    /// Read one 64-bit entry as its low and high words.
    #[inline]
    fn rd64(&self, offset: u64) -> u64 {
        u64::from(self.rd32(offset)) | (u64::from(self.rd32(offset + 4)) << 32)
    }

    /// Write one 64-bit entry, low word first.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn wr64(&mut self, offset: u64, value: u64) {
        self.wr32(offset, value as u32);
        self.wr32(offset + 4, (value >> 32) as u32);
    }
}

/// Source of page-directory and page-table backing.
pub trait TableAlloc {
    type Object: GpuMemory;

    /// Allocate `size` bytes aligned to `align`. The memory must read as zero.
    fn alloc_table(&mut self, size: u64, align: u64) -> Option<Self::Object>;

    fn free_table(&mut self, object: Self::Object);
}

/// Device access the MMU core needs beyond plain registers.
pub trait Platform: Mmio + Timer {
    /// Post pending writes through the BAR and invalidate its TLB.
    fn bar_flush(&self);

    /// Base of the system memory carved out as VRAM on integrated parts.
    ///
    /// `None` on boards with dedicated VRAM.
    fn stolen_base(&self) -> Option<u64> {
        None
    }
}

/// Engine-specific TLB invalidation, replacing the generic flush register.
pub trait TlbFlushHook: Send + Sync {
    fn tlb_flush(&self);
}

impl<F: Fn() + Send + Sync> TlbFlushHook for F {
    fn tlb_flush(&self) {
        self();
    }
}
