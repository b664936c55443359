//! # Physical Backing

use crate::Access;
use alloc::vec::Vec;

/// Physical memory domain of an object.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Domain {
    /// Device memory (or stolen system memory on integrated parts).
    Vram,
    /// Host memory reached over the bus.
    System,
}

/// The memory domain a PTE addresses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Aperture {
    Video,
    SystemCoherent,
    SystemNonCoherent,
}

impl Aperture {
    /// Aperture for host pages mapped with `access`.
    #[must_use]
    pub const fn system(access: Access) -> Self {
        if access.no_snoop() {
            Self::SystemNonCoherent
        } else {
            Self::SystemCoherent
        }
    }
}

/// A compression-tag allocation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TagAllocation {
    /// First tag of the allocation.
    pub offset: u64,
}

/// Where the pages of an object live.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Backing {
    /// One physically contiguous run.
    Contiguous { addr: u64, size: u64 },
    /// One bus address per page, in mapping order.
    Pages(Vec<u64>),
}

/// The physical backing being mapped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryObject {
    /// Memory type (kind and compression) placed into every PTE.
    pub memtype: u32,
    pub domain: Domain,
    pub tag: Option<TagAllocation>,
    pub backing: Backing,
}

impl MemoryObject {
    /// A contiguous VRAM object.
    #[must_use]
    pub const fn vram(addr: u64, size: u64, memtype: u32) -> Self {
        Self {
            memtype,
            domain: Domain::Vram,
            tag: None,
            backing: Backing::Contiguous { addr, size },
        }
    }

    /// A scatter-gather list of host pages.
    #[must_use]
    pub fn system_pages(pages: Vec<u64>, memtype: u32) -> Self {
        Self {
            memtype,
            domain: Domain::System,
            tag: None,
            backing: Backing::Pages(pages),
        }
    }

    /// Attach a compression-tag allocation starting at `offset`.
    #[must_use]
    pub fn with_tag(mut self, offset: u64) -> Self {
        self.tag = Some(TagAllocation { offset });
        self
    }

    /// Number of pages of size `1 << page_shift` the object maps to.
    ///
    /// A contiguous object's trailing partial page is not counted, so it is
    /// never mapped; allocators hand out page-multiple sizes.
    #[must_use]
    pub fn page_count(&self, page_shift: u8) -> u64 {
        match &self.backing {
            Backing::Contiguous { size, .. } => size >> page_shift,
            Backing::Pages(pages) => pages.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_trailing_page_is_not_counted() {
        let mem = MemoryObject::vram(0, 0x2800, 0);
        assert_eq!(mem.page_count(12), 2);
        assert_eq!(mem.page_count(16), 0);
        assert_eq!(MemoryObject::system_pages(vec![0x1000, 0x3000], 0).page_count(12), 2);
    }
}
