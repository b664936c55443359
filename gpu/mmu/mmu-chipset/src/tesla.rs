//! # Tesla (NV50 family)
//!
//! ```text
//! PTE (64 bit)
//! | 63‒49   | 48‒40   | 39‒12   | 9‒7        | 6   | 5‒4      | 3         | 0     |
//! | COMPTAG | MEMTYPE | ADDRESS | COMPACTION | SYS | APERTURE | READ_ONLY | VALID |
//!
//! PDE (64 bit)
//! | 39‒12   | 6‒5  | 1‒0  |
//! | ADDRESS | SIZE | TYPE |
//! ```
//!
//! One directory entry spans 512 MiB (`pgt_bits = 17`); a 40-bit space
//! therefore has 2048 directory entries.

use crate::engine::EngineKind::{
    self, Bar, Bsp, Ce0, Cipher, Disp, Dmaobj, Fifo, Gr, Mpeg, Msppp, Mspdec, Msvld, Pm, Sec,
    Sw, Vp,
};
use crate::{ChipInfo, MmuDesc, MmuParams};
use mmu_fields::{ConstDef, FieldDef, FieldRange};

static FIELDS: &[FieldDef] = &[
    FieldDef::new("PTE", "VALID", FieldRange::bit(0)),
    FieldDef::new("PTE", "READ_ONLY", FieldRange::bit(3)),
    FieldDef::new("PTE", "APERTURE", FieldRange::new(5, 4)),
    FieldDef::new("PTE", "SYS", FieldRange::bit(6)),
    FieldDef::new("PTE", "COMPACTION", FieldRange::new(9, 7)),
    FieldDef::new("PTE", "ADDRESS", FieldRange::new(39, 12)),
    FieldDef::new("PTE", "MEMTYPE", FieldRange::new(48, 40)),
    FieldDef::new("PTE", "COMPTAG", FieldRange::new(63, 49)),
    FieldDef::new("PDE", "TYPE", FieldRange::new(1, 0)),
    FieldDef::new("PDE", "SIZE", FieldRange::new(6, 5)),
    FieldDef::new("PDE", "ADDRESS", FieldRange::new(39, 12)),
    FieldDef::new("MEMTYPE", "KIND", FieldRange::new(6, 0)),
    FieldDef::new("MEMTYPE", "COMP", FieldRange::new(8, 7)),
];

static CONSTS: &[ConstDef] = &[
    ConstDef::new("PTE", "VALID", "TRUE", 1),
    ConstDef::new("PTE", "APERTURE", "VIDEO_MEMORY", 0),
    ConstDef::new("PTE", "APERTURE", "SYSTEM_COHERENT_MEMORY", 2),
    ConstDef::new("PTE", "APERTURE", "SYSTEM_NON_COHERENT_MEMORY", 3),
    ConstDef::new("PDE", "TYPE", "INVALID", 0),
    ConstDef::new("PDE", "TYPE", "64K", 1),
    ConstDef::new("PDE", "TYPE", "4K", 3),
    ConstDef::new("PDE", "SIZE", "128K_ENTRIES", 0),
    ConstDef::new("PDE", "SIZE", "32K_ENTRIES", 1),
    ConstDef::new("PDE", "SIZE", "16K_ENTRIES", 2),
    ConstDef::new("PDE", "SIZE", "8K_ENTRIES", 3),
];

pub static MMU: MmuDesc = MmuDesc {
    name: "nv50",
    params: MmuParams {
        limit: 1 << 40,
        dma_bits: 40,
        pgt_bits: 29 - 12,
        spg_shift: 12,
        lpg_shift: 16,
        flush_ctrl: 0x0010_0c80,
    },
    fields: FIELDS,
    consts: CONSTS,
};

const G80: &[EngineKind] = &[Bar, Dmaobj, Fifo, Sw, Gr, Mpeg, Disp];
const G84: &[EngineKind] = &[Bar, Dmaobj, Fifo, Sw, Gr, Mpeg, Vp, Cipher, Bsp, Disp, Pm];
const VP3: &[EngineKind] = &[Bar, Dmaobj, Fifo, Sw, Gr, Msppp, Disp, Pm, Msvld, Sec, Mspdec];
const GT215: &[EngineKind] = &[
    Bar, Dmaobj, Fifo, Sw, Gr, Mpeg, Msppp, Ce0, Disp, Pm, Msvld, Mspdec,
];
const GT216: &[EngineKind] = &[Bar, Dmaobj, Fifo, Sw, Gr, Msppp, Ce0, Disp, Pm, Msvld, Mspdec];

/// Graphics needs its own TLB-flush sequence on every Tesla part.
const GR_QUIRK: &[EngineKind] = &[Gr];

const fn chip(
    chipset: u32,
    name: &'static str,
    igp: bool,
    engines: &'static [EngineKind],
) -> ChipInfo {
    ChipInfo {
        chipset,
        name,
        igp,
        engines,
        tlb_flush_quirks: GR_QUIRK,
        mmu: Some(&MMU),
    }
}

pub static CHIPS: &[ChipInfo] = &[
    chip(0x50, "NV50", false, G80),
    chip(0x84, "G84", false, G84),
    chip(0x86, "G86", false, G84),
    chip(0x92, "G92", false, G84),
    chip(0x94, "G94", false, G84),
    chip(0x96, "G96", false, G84),
    chip(0x98, "G98", false, VP3),
    chip(0xa0, "GT200", false, G84),
    chip(0xa3, "GT215", false, GT215),
    chip(0xa5, "GT216", false, GT216),
    chip(0xa8, "GT218", false, GT216),
    chip(0xaa, "MCP77/MCP78", true, VP3),
    chip(0xac, "MCP79/MCP7A", true, VP3),
    chip(0xaf, "MCP89", true, GT216),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_table_is_self_consistent() {
        let table = MMU.table();
        for c in MMU.consts {
            assert!(
                table.constant(c.register, c.field, c.name).is_ok(),
                "{}.{}.{}",
                c.register,
                c.field,
                c.name
            );
        }
    }

    #[test]
    fn pte_fields_do_not_overlap() {
        let mut seen = 0u64;
        for f in MMU.fields.iter().filter(|f| f.register == "PTE") {
            let bits = f.range.mask_in_place();
            assert_eq!(seen & bits, 0, "PTE.{} overlaps", f.field);
            seen |= bits;
        }
    }

    #[test]
    fn directory_entry_spans_512_mib() {
        assert_eq!(MMU.params.pde_span(), 512 << 20);
        assert_eq!(MMU.params.limit / MMU.params.pde_span(), 2048);
    }
}
