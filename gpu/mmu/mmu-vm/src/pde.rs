//! # Page Directory Entries

use crate::{GpuMemory, Mmu, PageSize, Platform};

/// Stored in directory entries with no page table.
///
/// Not a valid bus address; easy to spot when the hardware faults on it.
pub const PDE_POISON: u64 = 0xdead_cafe_0000_0000;

const MIB: u64 = 1024 * 1024;

/// How many entries the hardware fetches for a linked page table.
///
/// The smallest class that covers the table is used.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum SizeClass {
    /// Up to 32 MiB.
    Entries8K,
    /// Up to 64 MiB.
    Entries16K,
    /// Up to 128 MiB.
    Entries32K,
    /// Anything larger.
    Entries128K,
}

impl SizeClass {
    pub const ALL: [Self; 4] = [
        Self::Entries8K,
        Self::Entries16K,
        Self::Entries32K,
        Self::Entries128K,
    ];

    /// Class for a table covering `coverage` bytes of virtual space.
    #[must_use]
    pub const fn for_coverage(coverage: u64) -> Self {
        if coverage <= 32 * MIB {
            Self::Entries8K
        } else if coverage <= 64 * MIB {
            Self::Entries16K
        } else if coverage <= 128 * MIB {
            Self::Entries32K
        } else {
            Self::Entries128K
        }
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name of the matching `PDE.SIZE` constant.
    #[must_use]
    pub const fn const_name(self) -> &'static str {
        match self {
            Self::Entries8K => "8K_ENTRIES",
            Self::Entries16K => "16K_ENTRIES",
            Self::Entries32K => "32K_ENTRIES",
            Self::Entries128K => "128K_ENTRIES",
        }
    }
}

impl<P: Platform> Mmu<P> {
    /// Encode the directory entry for a `[small, large]` table pair.
    ///
    /// The small table wins when both are present. With neither, the entry
    /// is [`PDE_POISON`].
    #[must_use]
    pub fn encode_pde<T: GpuMemory>(&self, tables: [Option<&T>; 2]) -> u64 {
        let (size, table) = match tables {
            [Some(small), _] => (PageSize::Small, small),
            [None, Some(large)] => (PageSize::Large, large),
            [None, None] => return PDE_POISON,
        };

        let layout = self.layout();
        let coverage = (table.size() >> 3) << self.page_shift(size);
        let class = SizeClass::for_coverage(coverage);
        layout.pde.address.place(table.addr() >> layout.pde.address.shift())
            | layout.pde.kind.place(layout.pde_type(size))
            | layout.pde.size.place(layout.size_class(class))
    }

    /// Point directory entry `pde` of `pgd` at `tables`.
    ///
    /// Does not flush; the caller does once the directory is consistent.
    pub fn map_pgt<D: GpuMemory, T: GpuMemory>(
        &self,
        pgd: &mut D,
        pde: u32,
        tables: [Option<&T>; 2],
    ) {
        pgd.wr64(u64::from(pde) * 8, self.encode_pde(tables));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{VecMemory, tesla_mmu};

    /// A table of `entries` PTEs at `addr`.
    fn table(addr: u64, entries: u64) -> VecMemory {
        VecMemory::new(addr, entries * 8)
    }

    #[test]
    fn size_class_ladder() {
        assert_eq!(SizeClass::for_coverage(16 * MIB), SizeClass::Entries8K);
        assert_eq!(SizeClass::for_coverage(48 * MIB), SizeClass::Entries16K);
        assert_eq!(SizeClass::for_coverage(100 * MIB), SizeClass::Entries32K);
        assert_eq!(SizeClass::for_coverage(200 * MIB), SizeClass::Entries128K);
    }

    #[test]
    fn size_class_boundaries_pick_the_smaller_class() {
        assert_eq!(SizeClass::for_coverage(32 * MIB), SizeClass::Entries8K);
        assert_eq!(SizeClass::for_coverage(32 * MIB + 1), SizeClass::Entries16K);
        assert_eq!(SizeClass::for_coverage(64 * MIB), SizeClass::Entries16K);
        assert_eq!(SizeClass::for_coverage(128 * MIB), SizeClass::Entries32K);
        assert_eq!(SizeClass::for_coverage(128 * MIB + 1), SizeClass::Entries128K);
    }

    #[test]
    fn size_class_is_monotonic() {
        let mut last = SizeClass::Entries8K;
        for mib in 0..=600 {
            let class = SizeClass::for_coverage(mib * MIB);
            assert!(class >= last);
            last = class;
        }
    }

    #[test]
    fn empty_entry_is_poisoned() {
        let mmu = tesla_mmu();
        let mut pgd = VecMemory::new(0, 0x4000);
        mmu.map_pgt::<_, VecMemory>(&mut pgd, 5, [None, None]);
        assert_eq!(pgd.rd32(40), 0);
        assert_eq!(pgd.rd32(44), 0xdead_cafe);
    }

    #[test]
    fn small_table_encoding() {
        let mmu = tesla_mmu();
        let mut pgd = VecMemory::new(0, 0x4000);

        // 4096 entries of 4 KiB cover 16 MiB.
        let small = table(0x0020_0000, 4096);
        mmu.map_pgt(&mut pgd, 1, [Some(&small), None]);
        assert_eq!(pgd.rd64(8), 0x0020_0000 | 0x60 | 0x3);

        // 131072 entries cover 512 MiB: 128K class, size bits zero.
        let full = table(0x0040_0000, 131_072);
        mmu.map_pgt(&mut pgd, 2, [Some(&full), None]);
        assert_eq!(pgd.rd64(16), 0x0040_0000 | 0x3);
    }

    #[test]
    fn large_table_encoding() {
        let mmu = tesla_mmu();
        let mut pgd = VecMemory::new(0, 0x4000);

        // 768 entries of 64 KiB cover 48 MiB.
        let large = table(0x0030_0000, 768);
        mmu.map_pgt(&mut pgd, 0, [None, Some(&large)]);
        let word = pgd.rd64(0);
        assert_eq!(word, 0x0030_0000 | 0x40 | 0x1);
        assert_eq!(
            mmu.layout().pde_target(word),
            Some((PageSize::Large, 0x0030_0000))
        );
    }

    #[test]
    fn small_table_wins_over_large() {
        let mmu = tesla_mmu();
        let small = table(0x0010_0000, 25_600); // 100 MiB
        let large = table(0x0030_0000, 8192);
        let word = mmu.encode_pde([Some(&small), Some(&large)]);
        assert_eq!(word, 0x0010_0000 | 0x20 | 0x3);
    }
}
