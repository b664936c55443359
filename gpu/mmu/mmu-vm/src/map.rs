//! # Mapping and Unmap Engines
//!
//! The leaf writers. They fill or clear a run of PTE slots in **one** page
//! table and never allocate, link or flush; [`AddressSpace`](crate::AddressSpace)
//! splits ranges into per-table runs and flushes afterwards.
//!
//! ## Block batching
//!
//! Contiguous runs are written in **naturally aligned blocks** of 1 to 128
//! slots. Every slot of a block gets the same entry: the block's first page
//! address plus a **compaction hint** of `log2(slots)` at PTE bits 9:7, from
//! which the hardware derives the page of each slot.
//!
//! A run of 6 small pages starting at slot 2, physical `P`:
//!
//! | Slots | Block | Entry address | Hint |
//! |-------|-------|---------------|------|
//! | 2..4  | 2     | `P`           | 1    |
//! | 4..8  | 4     | `P + 0x2000`  | 2    |
//!
//! Slot 6 therefore resolves to `P + 0x2000 + (6 mod 4) * 0x1000`.
//!
//! ## Compression tags
//!
//! When the memory type's **COMP** field is non-zero *and* the object holds a
//! tag allocation, each block carries `tag + (delta >> 16) * COMP`, where
//! `delta` is the block's byte offset into the memory object.
//!
//! ## Apertures
//!
//! - VRAM goes to **video memory**, or to stolen system memory on integrated
//!   parts (see [`Mmu::stolen_base`]).
//! - System pages go to coherent or non-coherent system memory depending on
//!   the VMA's `no_snoop` flag.

use crate::{Aperture, Domain, GpuMemory, MemoryObject, Mmu, Platform, Vma};
use log::{trace, warn};

/// Largest block, in slots (`2^7`, the widest compaction hint).
const MAX_BLOCK_LOG2: u32 = 7;

/// A run of consecutive PTE slots inside one page table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PteRun {
    /// First slot.
    pub pte: u32,
    pub count: u32,
}

impl PteRun {
    #[must_use]
    pub const fn new(pte: u32, count: u32) -> Self {
        Self { pte, count }
    }
}

/// `log2` of the largest block that starts at `slot`, is aligned to its own
/// size and fits in `left` slots.
fn block_log2(slot: u32, left: u32) -> u32 {
    (0..=MAX_BLOCK_LOG2)
        .rev()
        .find(|&n| left >= (1 << n) && (slot & ((1 << n) - 1)) == 0)
        .unwrap_or(0)
}

impl<P: Platform> Mmu<P> {
    /// Map `run.count` pages of a contiguous run starting at `phys`.
    ///
    /// `delta` is the byte offset of the first page from the start of
    /// `mem`; it selects the compression tags when `mem` is compressed.
    /// VRAM on integrated parts with stolen memory is retargeted to the stolen system
    /// range.
    pub fn map<T: GpuMemory>(
        &self,
        vma: &Vma,
        pgt: &mut T,
        mem: &MemoryObject,
        run: PteRun,
        phys: u64,
        delta: u64,
    ) {
        trace!(
            "map {:#x} pte {}+{} phys {phys:#x} delta {delta:#x}",
            pgt.addr(),
            run.pte,
            run.count
        );

        let layout = self.layout();
        let comp = layout.memtype_comp.get(u64::from(mem.memtype));
        let tag = mem.tag.filter(|_| comp != 0);

        let (phys, aperture) = match (mem.domain, self.stolen_base()) {
            (Domain::Vram, Some(stolen)) => (phys + stolen, Aperture::SystemNonCoherent),
            (Domain::Vram, None) => (phys, Aperture::Video),
            (Domain::System, _) => (phys, Aperture::system(vma.access)),
        };

        let mut word = self.encode_pte(phys, mem.memtype, aperture, vma.access);
        let mut delta = delta;
        let mut slot = run.pte;
        let mut left = run.count;

        while left > 0 {
            let hint = block_log2(slot, left);
            let slots = 1u32 << hint;
            let step = u64::from(slots) << vma.page_shift;

            let mut entry = layout.pte.compaction.set(word, u64::from(hint));
            if let Some(tag) = tag {
                entry = layout.pte.comptag.set(entry, tag.offset + (delta >> 16) * comp);
                delta += step;
            }
            word += step;

            for s in slot..slot + slots {
                pgt.wr64(u64::from(s) * 8, entry);
            }
            slot += slots;
            left -= slots;
        }
    }

    /// Map `run.count` pages, one bus address per page from `pages`.
    ///
    /// No batching: the pages need not be contiguous. Slots past the end of
    /// a short `pages` list are cleared rather than left stale, and the
    /// shortfall is logged.
    pub fn map_sg<T: GpuMemory>(
        &self,
        vma: &Vma,
        pgt: &mut T,
        mem: &MemoryObject,
        run: PteRun,
        pages: &[u64],
    ) {
        trace!("map_sg {:#x} pte {}+{}", pgt.addr(), run.pte, run.count);

        let aperture = Aperture::system(vma.access);
        let mut cleared = 0u32;
        for (i, slot) in (run.pte..run.pte + run.count).enumerate() {
            let word = pages.get(i).map_or_else(
                || {
                    cleared += 1;
                    0
                },
                |&page| self.encode_pte(page, mem.memtype, aperture, vma.access),
            );
            pgt.wr64(u64::from(slot) * 8, word);
        }

        if cleared > 0 {
            warn!(
                "map_sg {:#x}: {} pages for {} slots, {cleared} slots cleared",
                pgt.addr(),
                pages.len(),
                run.count
            );
        }
    }

    /// Clear `run.count` slots to the unmapped (all-zero) pattern.
    pub fn unmap<T: GpuMemory>(&self, pgt: &mut T, run: PteRun) {
        trace!("unmap {:#x} pte {}+{}", pgt.addr(), run.pte, run.count);
        for slot in run.pte..run.pte + run.count {
            pgt.wr64(u64::from(slot) * 8, 0);
        }
    }
}
