use bitfield_struct::bitfield;

/// MMU control word used to invalidate one engine's TLB.
///
/// Software writes the engine's flush-target code together with `trigger=1`;
/// hardware clears `trigger` once the invalidation has completed. Poll the
/// same register until bit 0 reads back as zero.
///
/// | Bits   | Field     | Meaning                                      |
/// |--------|-----------|----------------------------------------------|
/// | 0      | `trigger` | Start (write 1) / busy (reads 1 until done)  |
/// | 1–15   | reserved  | Written as 0                                 |
/// | 16–19  | `engine`  | Flush-target code of the engine              |
/// | 20–31  | reserved  | Written as 0                                 |
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct MmuFlushCtrl {
    /// Bit 0: start / busy.
    pub trigger: bool,

    /// Bits 1–15: reserved.
    #[bits(15, default = 0)]
    _reserved_1_15: u16,

    /// Bits 16–19: flush-target code.
    #[bits(4)]
    pub engine: u8,

    /// Bits 20–31: reserved.
    #[bits(12, default = 0)]
    _reserved_20_31: u16,
}

impl MmuFlushCtrl {
    /// The word that starts a flush of the engine with flush-target `code`.
    #[inline]
    #[must_use]
    pub const fn kick(code: u8) -> Self {
        Self::new().with_engine(code).with_trigger(true)
    }

    /// Mask of the busy bit for [`wait`](crate::wait).
    pub const BUSY_MASK: u32 = 1;
}
