//! # Resolved Entry Layout
//!
//! The chip's field table is consulted once, when the [`Mmu`](crate::Mmu) is
//! created. Everything the map, unmap and flush paths need ends up in an
//! [`MmuLayout`] of plain [`FieldRange`]s and raw constants.

use crate::{Aperture, PageSize, SizeClass};
use mmu_fields::{FieldError, FieldRange, FieldTable};

/// Bit ranges of a page table entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PteLayout {
    pub valid: FieldRange,
    pub read_only: FieldRange,
    pub aperture: FieldRange,
    pub sys: FieldRange,
    /// `log2` of the number of slots in the aligned group written together.
    pub compaction: FieldRange,
    pub address: FieldRange,
    pub memtype: FieldRange,
    pub comptag: FieldRange,
}

/// Bit ranges of a page directory entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PdeLayout {
    /// `TYPE`: which page table the entry points at.
    pub kind: FieldRange,
    pub size: FieldRange,
    pub address: FieldRange,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MmuLayout {
    pub pte: PteLayout,
    pub pde: PdeLayout,
    /// `MEMTYPE.COMP`: compression tags consumed per 64 KiB.
    pub memtype_comp: FieldRange,
    valid: u64,
    apertures: [u64; 3],
    /// `PDE.TYPE` for `[small, large]`.
    pde_types: [u64; 2],
    pde_invalid: u64,
    /// `PDE.SIZE` per [`SizeClass`].
    size_classes: [u64; 4],
}

impl MmuLayout {
    /// Resolve every field and constant the MMU core uses.
    ///
    /// # Errors
    /// The first missing or malformed row of `table`.
    pub fn resolve(table: &FieldTable<'_>) -> Result<Self, FieldError> {
        let pte = |field: &'static str| table.field("PTE", field);
        let pde = |field: &'static str| table.field("PDE", field);

        let mut size_classes = [0; 4];
        for class in SizeClass::ALL {
            size_classes[class.index()] = table.constant("PDE", "SIZE", class.const_name())?;
        }

        Ok(Self {
            pte: PteLayout {
                valid: pte("VALID")?,
                read_only: pte("READ_ONLY")?,
                aperture: pte("APERTURE")?,
                sys: pte("SYS")?,
                compaction: pte("COMPACTION")?,
                address: pte("ADDRESS")?,
                memtype: pte("MEMTYPE")?,
                comptag: pte("COMPTAG")?,
            },
            pde: PdeLayout {
                kind: pde("TYPE")?,
                size: pde("SIZE")?,
                address: pde("ADDRESS")?,
            },
            memtype_comp: table.field("MEMTYPE", "COMP")?,
            valid: table.constant("PTE", "VALID", "TRUE")?,
            apertures: [
                table.constant("PTE", "APERTURE", "VIDEO_MEMORY")?,
                table.constant("PTE", "APERTURE", "SYSTEM_COHERENT_MEMORY")?,
                table.constant("PTE", "APERTURE", "SYSTEM_NON_COHERENT_MEMORY")?,
            ],
            pde_types: [
                table.constant("PDE", "TYPE", "4K")?,
                table.constant("PDE", "TYPE", "64K")?,
            ],
            pde_invalid: table.constant("PDE", "TYPE", "INVALID")?,
            size_classes,
        })
    }

    /// Raw `PTE.VALID` value of a mapped entry.
    #[inline]
    #[must_use]
    pub const fn valid(&self) -> u64 {
        self.valid
    }

    /// Raw `PTE.APERTURE` value.
    #[inline]
    #[must_use]
    pub const fn aperture(&self, aperture: Aperture) -> u64 {
        self.apertures[match aperture {
            Aperture::Video => 0,
            Aperture::SystemCoherent => 1,
            Aperture::SystemNonCoherent => 2,
        }]
    }

    /// Raw `PDE.TYPE` value for a table of `size` pages.
    #[inline]
    #[must_use]
    pub const fn pde_type(&self, size: PageSize) -> u64 {
        self.pde_types[size.index()]
    }

    /// Raw `PDE.SIZE` value.
    #[inline]
    #[must_use]
    pub const fn size_class(&self, class: SizeClass) -> u64 {
        self.size_classes[class.index()]
    }

    /// Whether `word` is a mapped PTE.
    #[inline]
    #[must_use]
    pub const fn pte_valid(&self, word: u64) -> bool {
        self.pte.valid.get(word) == self.valid
    }

    /// Bus address of the page behind PTE `slot`, given the entry word
    /// stored in that slot.
    ///
    /// A compaction hint of `n` makes the hardware treat the slot as part of
    /// a naturally aligned group of `2^n` slots whose first page is at the
    /// stored address; the slot's page follows at its position in the group.
    #[must_use]
    pub const fn resolve_pte(&self, slot: u32, word: u64, page_shift: u8) -> Option<u64> {
        if !self.pte_valid(word) {
            return None;
        }
        let group = 1u64 << self.pte.compaction.get(word);
        let base = self.pte.address.get(word) << self.pte.address.shift();
        Some(base + (((slot as u64) & (group - 1)) << page_shift))
    }

    /// Which table a directory entry links, and its bus address.
    #[must_use]
    pub const fn pde_target(&self, word: u64) -> Option<(PageSize, u64)> {
        let kind = self.pde.kind.get(word);
        let addr = self.pde.address.get(word) << self.pde.address.shift();
        if kind == self.pde_invalid {
            None
        } else if kind == self.pde_types[0] {
            Some((PageSize::Small, addr))
        } else if kind == self.pde_types[1] {
            Some((PageSize::Large, addr))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmu_chipset::TESLA_MMU;
    use mmu_fields::FieldDef;

    #[test]
    fn resolves_tesla_layout() {
        let layout = MmuLayout::resolve(&TESLA_MMU.table()).unwrap();
        assert_eq!(layout.pte.address, FieldRange::new(39, 12));
        assert_eq!(layout.pte.comptag, FieldRange::new(63, 49));
        assert_eq!(layout.memtype_comp, FieldRange::new(8, 7));
        assert_eq!(layout.aperture(Aperture::SystemNonCoherent), 3);
        assert_eq!(layout.pde_type(PageSize::Small), 3);
        assert_eq!(layout.pde_type(PageSize::Large), 1);
        assert_eq!(layout.size_class(SizeClass::Entries8K), 3);
        assert_eq!(layout.size_class(SizeClass::Entries128K), 0);
    }

    #[test]
    fn missing_field_is_reported() {
        static FIELDS: &[FieldDef] = &[FieldDef::new("PTE", "VALID", FieldRange::bit(0))];
        let table = FieldTable::new(FIELDS, &[]);
        assert!(matches!(
            MmuLayout::resolve(&table),
            Err(FieldError::UnknownConstant { .. } | FieldError::UnknownField { .. })
        ));
    }

    #[test]
    fn compaction_hint_spreads_a_group() {
        let layout = MmuLayout::resolve(&TESLA_MMU.table()).unwrap();
        // Four-slot group (hint 2) starting at 0x10_0000, 4 KiB pages.
        let word = 0x10_0000 | (2 << 7) | 1;
        for slot in 8..12 {
            assert_eq!(
                layout.resolve_pte(slot, word, 12),
                Some(0x10_0000 + u64::from(slot - 8) * 0x1000)
            );
        }
        assert_eq!(layout.resolve_pte(0, 0, 12), None);
    }

    #[test]
    fn pde_target_decodes_type() {
        let layout = MmuLayout::resolve(&TESLA_MMU.table()).unwrap();
        assert_eq!(
            layout.pde_target(0x0020_0000 | 0x60 | 3),
            Some((PageSize::Small, 0x0020_0000))
        );
        assert_eq!(
            layout.pde_target(0x0030_0000 | 1),
            Some((PageSize::Large, 0x0030_0000))
        );
        assert_eq!(layout.pde_target(crate::PDE_POISON), None);
    }
}
