//! # MMU Descriptions

use mmu_fields::{ConstDef, FieldDef, FieldTable};

/// Geometry and register placement of one MMU generation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MmuParams {
    /// Size of the GPU virtual address space in bytes.
    pub limit: u64,
    /// Width of DMA (bus) addresses the MMU can emit.
    pub dma_bits: u8,
    /// `log2` of the number of 4 KiB units one directory entry covers.
    pub pgt_bits: u8,
    /// Small page shift (4 KiB pages).
    pub spg_shift: u8,
    /// Large page shift (64 KiB pages).
    pub lpg_shift: u8,
    /// Byte offset of the MMU flush-control register.
    pub flush_ctrl: u32,
}

impl MmuParams {
    /// `log2` of the virtual span covered by one directory entry.
    #[inline]
    #[must_use]
    pub const fn pde_shift(&self) -> u32 {
        self.pgt_bits as u32 + 12
    }

    /// Virtual span covered by one directory entry, in bytes.
    #[inline]
    #[must_use]
    pub const fn pde_span(&self) -> u64 {
        1 << self.pde_shift()
    }
}

/// Everything the MMU core needs to know about one MMU generation.
#[derive(Copy, Clone, Debug)]
pub struct MmuDesc {
    /// Short generation name for diagnostics.
    pub name: &'static str,
    pub params: MmuParams,
    /// `PTE`, `PDE` and `MEMTYPE` field definitions.
    pub fields: &'static [FieldDef],
    pub consts: &'static [ConstDef],
}

impl MmuDesc {
    #[must_use]
    pub const fn table(&self) -> FieldTable<'static> {
        FieldTable::new(self.fields, self.consts)
    }
}
