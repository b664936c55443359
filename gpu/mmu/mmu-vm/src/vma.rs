use crate::Access;

/// Which of the two page tables behind a directory entry a mapping uses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PageSize {
    /// 4 KiB pages.
    Small,
    /// 64 KiB pages.
    Large,
}

impl PageSize {
    /// Index into a directory entry's `[small, large]` table pair.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Small => 0,
            Self::Large => 1,
        }
    }
}

/// A range of GPU virtual addresses with one page size and one set of
/// access flags.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Vma {
    /// First virtual address, in bytes.
    pub offset: u64,
    /// Length in bytes.
    pub length: u64,
    /// `log2` of the page size of every PTE in the range.
    pub page_shift: u8,
    pub access: Access,
}

impl Vma {
    #[must_use]
    pub const fn new(offset: u64, length: u64, page_shift: u8, access: Access) -> Self {
        Self {
            offset,
            length,
            page_shift,
            access,
        }
    }

    #[inline]
    #[must_use]
    pub const fn page_size(&self) -> u64 {
        1 << self.page_shift
    }

    /// Number of pages covered.
    #[inline]
    #[must_use]
    pub const fn pages(&self) -> u64 {
        self.length >> self.page_shift
    }

    /// One past the last byte.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset + self.length
    }
}
