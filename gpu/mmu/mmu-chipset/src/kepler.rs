//! # Kepler (NVE0 family)
//!
//! Kepler parts are recognized so that probing reports a precise error
//! instead of "unknown chipset"; their MMU uses a different directory
//! layout and is not driven by this layer.

use crate::engine::EngineKind::{
    self, Bar, Ce0, Ce1, Ce2, Disp, Dmaobj, Fifo, Gr, Msppp, Msvld, Pm, Sw, Vp,
};
use crate::ChipInfo;

const GK104: &[EngineKind] = &[
    Bar, Dmaobj, Fifo, Sw, Gr, Disp, Ce0, Ce1, Ce2, Msvld, Vp, Msppp, Pm,
];
const GK20A: &[EngineKind] = &[Bar, Dmaobj, Fifo, Sw, Gr, Ce2, Pm];
const GK208: &[EngineKind] = &[Bar, Dmaobj, Fifo, Sw, Gr, Disp, Ce0, Ce1, Ce2, Msvld, Vp, Msppp];

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
        tlb_flush_quirks: &[],
        mmu: None,
    }
}

pub static CHIPS: &[ChipInfo] = &[
    chip(0xe4, "GK104", false, GK104),
    chip(0xe6, "GK106", false, GK104),
    chip(0xe7, "GK107", false, GK104),
    chip(0xea, "GK20A", true, GK20A),
    chip(0xf0, "GK110", false, GK104),
    chip(0xf1, "GK110B", false, GK104),
    chip(0x106, "GK208B", false, GK208),
    chip(0x108, "GK208", false, GK208),
];
