//! # Address Space
//!
//! One GPU virtual address space: a page directory covering the whole MMU
//! range, the page tables behind the directory entries this space uses, and
//! the per-engine reference counts that decide which TLBs a flush visits.
//!
//! ## Lifecycle
//!
//! ```text
//! new ──► get (tables referenced) ──► map_at / unmap_at ──► put ──► destroy
//!              ▲                                             │
//!              └─────────────────────────────────────────────┘
//! ```
//!
//! - [`AddressSpace::get`] references the page table of every directory entry
//!   a range touches, allocating and linking tables on first use.
//! - [`AddressSpace::map_at`] and [`AddressSpace::unmap_at`] write PTEs and
//!   flush; they never allocate.
//! - [`AddressSpace::put`] drops those references. A table whose last
//!   reference goes is unlinked, the change flushed, then the table freed.
//!
//! Choosing *where* a range lives is the caller's business.
//!
//! ## Worked flow
//!
//! Mapping 16 KiB of VRAM across the first directory boundary
//! (`0x1fff_e000..0x2000_2000`, small pages):
//!
//! 1. **get** references the small tables of directory entries 0 and 1. Both
//!    are allocated (1 MiB each) and linked; the directory now holds two
//!    `TYPE=4K` entries instead of the poison value.
//! 2. **map_at** checks both tables exist, then writes two runs: slots
//!    131070..131072 of table 0 and slots 0..2 of table 1. The second run
//!    starts 8 KiB into the memory object, so its physical address and its
//!    compression tags continue where the first run stopped.
//! 3. A single **flush** follows: BAR first, then every referenced engine.
//! 4. **unmap** then **put** reverse it; the last reference to each table
//!    restores the poison entry, flushes and frees the table.
//!
//! [`AddressSpace::translate`] reads the directory the way the hardware
//! does, so a table that is allocated but not linked is invisible to it.

use crate::{
    Access, Backing, EngineKind, EngineRefs, GpuMemory, MemoryObject, Mmu, PageSize, Platform,
    PteRun, TableAlloc, Vma,
};
use alloc::vec::Vec;
use core::ops::RangeInclusive;
use log::{debug, warn};
use mmu_chipset::MmuParams;

/// Alignment of the page directory and of every page table.
const TABLE_ALIGN: u64 = 0x1000;

/// Error returned by [`AddressSpace`] operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressSpaceError {
    #[error("out of memory (page directory)")]
    OomDirectory,
    #[error("out of memory (page table for directory entry {pde})")]
    OomTable { pde: u32 },
    #[error("empty range")]
    EmptyRange,
    #[error("range {offset:#x}+{length:#x} exceeds the {limit:#x} byte address limit")]
    BeyondLimit { offset: u64, length: u64, limit: u64 },
    #[error("range {offset:#x}+{length:#x} lies outside the address space or mapping")]
    OutOfRange { offset: u64, length: u64 },
    #[error("range {offset:#x}+{length:#x} is not aligned to {page_shift}-bit pages")]
    Misaligned {
        offset: u64,
        length: u64,
        page_shift: u8,
    },
    #[error("page shift {0} is not supported")]
    UnsupportedPageSize(u8),
    #[error("no page table behind directory entry {pde}")]
    MissingTable { pde: u32 },
}

struct PageTable<O> {
    object: O,
    refs: u32,
}

/// `[small, large]` tables behind one directory entry.
type TablePair<O> = [Option<PageTable<O>>; 2];

/// Directory and table indices are bounded by the MMU geometry.
#[allow(clippy::cast_possible_truncation)]
const fn index(value: u64) -> u32 {
    value as u32
}

/// Directory entry of virtual address `va`.
const fn pde_of(params: &MmuParams, va: u64) -> u32 {
    index(va >> params.pde_shift())
}

/// Split `pages` pages of `1 << page_shift` bytes starting at `va` into
/// per-directory-entry runs.
fn pte_runs(
    params: &MmuParams,
    va: u64,
    pages: u64,
    page_shift: u8,
) -> impl Iterator<Item = (u32, PteRun)> {
    let max = index(params.pde_span() >> page_shift);
    let mut pde = pde_of(params, va);
    let mut pte = index((va & (params.pde_span() - 1)) >> page_shift);
    let mut left = pages;

    core::iter::from_fn(move || {
        if left == 0 {
            return None;
        }
        let room = max - pte;
        let len = u32::try_from(left).map_or(room, |left| left.min(room));
        let run = (pde, PteRun::new(pte, len));

        left -= u64::from(len);
        pte += len;
        if pte == max {
            pde += 1;
            pte = 0;
        }
        Some(run)
    })
}

/// A GPU virtual address space bound to one [`Mmu`].
pub struct AddressSpace<'m, P: Platform, O: GpuMemory> {
    mmu: &'m Mmu<P>,
    offset: u64,
    length: u64,
    /// Allocation granularity: one directory entry's span, or less for
    /// small spaces. Informational; placement is up to the caller.
    block: u64,
    fpde: u32,
    lpde: u32,
    pgd: O,
    pgt: Vec<TablePair<O>>,
    engines: EngineRefs,
}

impl<'m, P: Platform, O: GpuMemory> AddressSpace<'m, P, O> {
    /// Create a space covering `offset..offset + length`.
    ///
    /// Allocates the page directory and poisons the entries of the range.
    ///
    /// # Errors
    /// - [`AddressSpaceError::EmptyRange`] for `length == 0`.
    /// - [`AddressSpaceError::BeyondLimit`] if the range ends past the MMU limit.
    /// - [`AddressSpaceError::OomDirectory`] if `alloc` is exhausted.
    pub fn new<A: TableAlloc<Object = O>>(
        mmu: &'m Mmu<P>,
        alloc: &mut A,
        offset: u64,
        length: u64,
    ) -> Result<Self, AddressSpaceError> {
        let params = mmu.params();
        if length == 0 {
            return Err(AddressSpaceError::EmptyRange);
        }
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= params.limit)
            .ok_or(AddressSpaceError::BeyondLimit {
                offset,
                length,
                limit: params.limit,
            })?;

        let fpde = pde_of(params, offset);
        let lpde = pde_of(params, end - 1);
        let pgd_size = (params.limit >> params.pde_shift()) * 8;
        let mut pgd = alloc
            .alloc_table(pgd_size, TABLE_ALIGN)
            .ok_or(AddressSpaceError::OomDirectory)?;
        for pde in fpde..=lpde {
            mmu.map_pgt::<O, O>(&mut pgd, pde, [None, None]);
        }

        debug!(
            "address space {offset:#x}+{length:#x}: directory at {:#x}, entries {fpde}..={lpde}",
            pgd.addr()
        );

        Ok(Self {
            mmu,
            offset,
            length,
            block: params.pde_span().min(length),
            fpde,
            lpde,
            pgd,
            pgt: (fpde..=lpde).map(|_| [None, None]).collect(),
            engines: EngineRefs::new(),
        })
    }

    #[inline]
    #[must_use]
    pub const fn mmu(&self) -> &'m Mmu<P> {
        self.mmu
    }

    #[inline]
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[inline]
    #[must_use]
    pub const fn length(&self) -> u64 {
        self.length
    }

    /// Allocation granularity a caller placing ranges should align to.
    ///
    /// Informational only: nothing in this type consults it.
    #[inline]
    #[must_use]
    pub const fn block(&self) -> u64 {
        self.block
    }

    /// Directory entries owned by this space.
    #[inline]
    #[must_use]
    pub const fn pde_range(&self) -> RangeInclusive<u32> {
        self.fpde..=self.lpde
    }

    /// The page directory.
    #[inline]
    #[must_use]
    pub const fn directory(&self) -> &O {
        &self.pgd
    }

    /// The table of `size` behind directory entry `pde`, if allocated.
    #[must_use]
    pub fn table(&self, pde: u32, size: PageSize) -> Option<&O> {
        self.pair(pde)?[size.index()].as_ref().map(|t| &t.object)
    }

    /// Reference count of a table; zero if none is allocated.
    #[must_use]
    pub fn table_refs(&self, pde: u32, size: PageSize) -> u32 {
        self.pair(pde)
            .and_then(|pair| pair[size.index()].as_ref())
            .map_or(0, |t| t.refs)
    }

    fn slot(&self, pde: u32) -> Option<usize> {
        (self.fpde..=self.lpde)
            .contains(&pde)
            .then(|| (pde - self.fpde) as usize)
    }

    fn pair(&self, pde: u32) -> Option<&TablePair<O>> {
        self.slot(pde).map(|i| &self.pgt[i])
    }

    fn table_mut(&mut self, pde: u32, size: PageSize) -> Result<&mut O, AddressSpaceError> {
        self.slot(pde)
            .and_then(|i| self.pgt[i][size.index()].as_mut())
            .map(|t| &mut t.object)
            .ok_or(AddressSpaceError::MissingTable { pde })
    }

    /// Rewrite directory entry `pde` from the current table pair.
    fn link(&mut self, pde: u32) {
        let [small, large] = &self.pgt[(pde - self.fpde) as usize];
        self.mmu.map_pgt(
            &mut self.pgd,
            pde,
            [
                small.as_ref().map(|t| &t.object),
                large.as_ref().map(|t| &t.object),
            ],
        );
    }

    /// Take a reference on the table of `size` behind `pde`, allocating and
    /// linking it on first use.
    ///
    /// # Errors
    /// - [`AddressSpaceError::MissingTable`] if `pde` is outside this space.
    /// - [`AddressSpaceError::OomTable`] if `alloc` is exhausted.
    pub fn get_table<A: TableAlloc<Object = O>>(
        &mut self,
        alloc: &mut A,
        pde: u32,
        size: PageSize,
    ) -> Result<(), AddressSpaceError> {
        let slot = self
            .slot(pde)
            .ok_or(AddressSpaceError::MissingTable { pde })?;
        if let Some(table) = &mut self.pgt[slot][size.index()] {
            table.refs += 1;
            return Ok(());
        }

        let bytes = (self.mmu.params().pde_span() >> self.mmu.page_shift(size)) * 8;
        let object = alloc
            .alloc_table(bytes, TABLE_ALIGN)
            .ok_or(AddressSpaceError::OomTable { pde })?;
        debug!(
            "pde {pde}: {size:?} page table at {:#x} ({bytes:#x} bytes)",
            object.addr()
        );

        self.pgt[slot][size.index()] = Some(PageTable { object, refs: 1 });
        self.link(pde);
        Ok(())
    }

    /// Drop a reference taken by [`get_table`](Self::get_table).
    ///
    /// The last reference unlinks the table, flushes, then frees it.
    ///
    /// # Errors
    /// [`AddressSpaceError::MissingTable`] if no such table is allocated.
    pub fn put_table<A: TableAlloc<Object = O>>(
        &mut self,
        alloc: &mut A,
        pde: u32,
        size: PageSize,
    ) -> Result<(), AddressSpaceError> {
        let slot = self
            .slot(pde)
            .ok_or(AddressSpaceError::MissingTable { pde })?;
        let entry = &mut self.pgt[slot][size.index()];
        let table = entry
            .as_mut()
            .ok_or(AddressSpaceError::MissingTable { pde })?;
        table.refs -= 1;
        if table.refs > 0 {
            return Ok(());
        }

        let table = entry.take();
        self.link(pde);
        self.flush();
        if let Some(table) = table {
            debug!("pde {pde}: {size:?} page table at {:#x} released", table.object.addr());
            alloc.free_table(table.object);
        }
        Ok(())
    }

    fn check_range(
        &self,
        offset: u64,
        length: u64,
        page_shift: u8,
    ) -> Result<PageSize, AddressSpaceError> {
        let size = self
            .mmu
            .page_size(page_shift)
            .ok_or(AddressSpaceError::UnsupportedPageSize(page_shift))?;
        if length == 0 {
            return Err(AddressSpaceError::EmptyRange);
        }
        let inside = offset >= self.offset
            && offset
                .checked_add(length)
                .is_some_and(|end| end <= self.offset + self.length);
        if !inside {
            return Err(AddressSpaceError::OutOfRange { offset, length });
        }
        let page_mask = (1u64 << page_shift) - 1;
        if (offset | length) & page_mask != 0 {
            return Err(AddressSpaceError::Misaligned {
                offset,
                length,
                page_shift,
            });
        }
        Ok(size)
    }

    /// Reserve `offset..offset + length` for pages of `1 << page_shift`
    /// bytes, referencing the page tables it needs.
    ///
    /// On failure every reference taken so far is dropped again.
    ///
    /// # Errors
    /// Range validation errors, or [`AddressSpaceError::OomTable`].
    pub fn get<A: TableAlloc<Object = O>>(
        &mut self,
        alloc: &mut A,
        offset: u64,
        length: u64,
        page_shift: u8,
        access: Access,
    ) -> Result<Vma, AddressSpaceError> {
        let size = self.check_range(offset, length, page_shift)?;
        let params = self.mmu.params();
        let first = pde_of(params, offset);
        let last = pde_of(params, offset + length - 1);

        for pde in first..=last {
            if let Err(err) = self.get_table(alloc, pde, size) {
                for taken in first..pde {
                    self.put_table(alloc, taken, size)?;
                }
                return Err(err);
            }
        }
        Ok(Vma::new(offset, length, page_shift, access))
    }

    /// Release the table references of `vma`. Unmap it first.
    ///
    /// # Errors
    /// [`AddressSpaceError::MissingTable`] if `vma` was not obtained from
    /// [`get`](Self::get) on this space.
    pub fn put<A: TableAlloc<Object = O>>(
        &mut self,
        alloc: &mut A,
        vma: &Vma,
    ) -> Result<(), AddressSpaceError> {
        let size = self.check_range(vma.offset, vma.length, vma.page_shift)?;
        let params = self.mmu.params();
        for pde in pde_of(params, vma.offset)..=pde_of(params, vma.end() - 1) {
            self.put_table(alloc, pde, size)?;
        }
        Ok(())
    }

    /// Validate a `delta..delta + length` window of `vma` and make sure all of
    /// its tables exist, before anything is written.
    fn prepare(&self, vma: &Vma, delta: u64, length: u64) -> Result<PageSize, AddressSpaceError> {
        let size = self.check_range(vma.offset, vma.length, vma.page_shift)?;
        if length == 0 {
            return Err(AddressSpaceError::EmptyRange);
        }
        if (delta | length) & ((1u64 << vma.page_shift) - 1) != 0 {
            return Err(AddressSpaceError::Misaligned {
                offset: vma.offset + delta,
                length,
                page_shift: vma.page_shift,
            });
        }
        if delta.checked_add(length).is_none_or(|end| end > vma.length) {
            return Err(AddressSpaceError::OutOfRange {
                offset: vma.offset + delta,
                length,
            });
        }

        let params = self.mmu.params();
        let start = vma.offset + delta;
        for pde in pde_of(params, start)..=pde_of(params, start + length - 1) {
            if self.pair(pde).is_none_or(|pair| pair[size.index()].is_none()) {
                return Err(AddressSpaceError::MissingTable { pde });
            }
        }
        Ok(size)
    }

    /// Map `mem` into `vma` starting `delta` bytes in, then flush.
    ///
    /// Contiguous backing goes through the batched mapping engine,
    /// page lists through the scatter-gather variant.
    ///
    /// # Errors
    /// Range validation errors or [`AddressSpaceError::MissingTable`];
    /// nothing is written in that case.
    pub fn map_at(
        &mut self,
        vma: &Vma,
        delta: u64,
        mem: &MemoryObject,
    ) -> Result<(), AddressSpaceError> {
        let pages = mem.page_count(vma.page_shift);
        let size = self.prepare(vma, delta, pages << vma.page_shift)?;
        let mmu = self.mmu;

        let mut mapped = 0usize;
        for (pde, run) in pte_runs(mmu.params(), vma.offset + delta, pages, vma.page_shift) {
            let table = self.table_mut(pde, size)?;
            let bytes = (mapped as u64) << vma.page_shift;
            match &mem.backing {
                Backing::Contiguous { addr, .. } => {
                    mmu.map(vma, table, mem, run, addr + bytes, bytes);
                }
                Backing::Pages(list) => {
                    mmu.map_sg(vma, table, mem, run, &list[mapped..]);
                }
            }
            mapped += run.count as usize;
        }

        self.flush();
        Ok(())
    }

    /// Clear `delta..delta + length` of `vma`, then flush.
    ///
    /// # Errors
    /// As [`map_at`](Self::map_at).
    pub fn unmap_at(
        &mut self,
        vma: &Vma,
        delta: u64,
        length: u64,
    ) -> Result<(), AddressSpaceError> {
        let size = self.prepare(vma, delta, length)?;
        let mmu = self.mmu;

        let pages = length >> vma.page_shift;
        for (pde, run) in pte_runs(mmu.params(), vma.offset + delta, pages, vma.page_shift) {
            mmu.unmap(self.table_mut(pde, size)?, run);
        }

        self.flush();
        Ok(())
    }

    /// Clear all of `vma`, then flush.
    ///
    /// # Errors
    /// As [`map_at`](Self::map_at).
    pub fn unmap(&mut self, vma: &Vma) -> Result<(), AddressSpaceError> {
        self.unmap_at(vma, 0, vma.length)
    }

    /// Bus address `va` translates to.
    ///
    /// Walks the way the hardware does: decode the directory entry, then
    /// resolve through the one table it links. A table that is allocated but
    /// not linked (the large table while a small one shares its entry) is
    /// never consulted.
    #[must_use]
    pub fn translate(&self, va: u64) -> Option<u64> {
        let params = self.mmu.params();
        let layout = self.mmu.layout();
        let pde = pde_of(params, va);
        let pair = self.pair(pde)?;

        let (size, addr) = layout.pde_target(self.pgd.rd64(u64::from(pde) * 8))?;
        let table = &pair[size.index()]
            .as_ref()
            .filter(|t| t.object.addr() == addr)?
            .object;

        let shift = self.mmu.page_shift(size);
        let within = va & (params.pde_span() - 1);
        let slot = index(within >> shift);
        let page = layout.resolve_pte(slot, table.rd64(u64::from(slot) * 8), shift)?;
        Some(page + (within & ((1 << shift) - 1)))
    }

    /// Take a reference for `kind`; flushes will now visit it.
    ///
    /// An engine the chip does not have is still counted, but reported.
    pub fn ref_engine(&self, kind: EngineKind) -> u32 {
        let chip = self.mmu.chip();
        if !chip.has_engine(kind) {
            warn!(
                "{}: {kind} referenced an address space but the chip has no such engine",
                chip.name
            );
        }
        self.engines.inc(kind)
    }

    /// Drop a reference taken by [`ref_engine`](Self::ref_engine).
    ///
    /// # Panics
    /// If `kind` holds no reference.
    pub fn unref_engine(&self, kind: EngineKind) -> u32 {
        self.engines.dec(kind)
    }

    #[inline]
    #[must_use]
    pub const fn engine_refs(&self) -> &EngineRefs {
        &self.engines
    }

    /// Flush the BAR and every engine referencing this space.
    pub fn flush(&self) {
        self.mmu.flush(&self.engines);
    }

    /// Release every page table, then the directory.
    pub fn destroy<A: TableAlloc<Object = O>>(self, alloc: &mut A) {
        if !self.engines.is_empty() {
            warn!(
                "address space {:#x}+{:#x} destroyed while referenced by {:?}",
                self.offset, self.length, self.engines
            );
        }

        let (offset, length) = (self.offset, self.length);
        let mut released = 0usize;
        for table in self.pgt.into_iter().flatten().flatten() {
            alloc.free_table(table.object);
            released += 1;
        }
        alloc.free_table(self.pgd);
        debug!("address space {offset:#x}+{length:#x} destroyed, {released} page tables released");
    }
}
