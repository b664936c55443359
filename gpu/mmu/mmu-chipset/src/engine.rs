//! # Engines

/// Every hardware unit that can hold references to an address space.
///
/// The discriminant doubles as the index into per-engine tables
/// (reference counts, TLB-flush hooks). Declaration order is the order in
/// which a flush visits engines.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(u8)]
pub enum EngineKind {
    /// BAR aperture (CPU access to VRAM through the MMU).
    Bar,
    /// DMA object engine.
    Dmaobj,
    /// Command FIFO / channel scheduler.
    Fifo,
    /// Software methods.
    Sw,
    /// Graphics.
    Gr,
    /// Legacy MPEG decoder.
    Mpeg,
    /// Video processor.
    Vp,
    /// Crypto engine (pre-VP3).
    Cipher,
    /// Bitstream processor (pre-VP3).
    Bsp,
    /// Post-processor (VP3+).
    Msppp,
    /// Copy engines.
    Ce0,
    Ce1,
    Ce2,
    /// Display.
    Disp,
    /// Performance monitor.
    Pm,
    /// Variable-length decoder (VP3+).
    Msvld,
    /// Security engine (VP3+).
    Sec,
    /// Picture decoder (VP3+).
    Mspdec,
}

impl EngineKind {
    /// Number of engine kinds.
    pub const COUNT: usize = 18;

    /// All kinds, in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Bar,
        Self::Dmaobj,
        Self::Fifo,
        Self::Sw,
        Self::Gr,
        Self::Mpeg,
        Self::Vp,
        Self::Cipher,
        Self::Bsp,
        Self::Msppp,
        Self::Ce0,
        Self::Ce1,
        Self::Ce2,
        Self::Disp,
        Self::Pm,
        Self::Msvld,
        Self::Sec,
        Self::Mspdec,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bar => "BAR",
            Self::Dmaobj => "DMAOBJ",
            Self::Fifo => "FIFO",
            Self::Sw => "SW",
            Self::Gr => "GR",
            Self::Mpeg => "MPEG",
            Self::Vp => "VP",
            Self::Cipher => "CIPHER",
            Self::Bsp => "BSP",
            Self::Msppp => "MSPPP",
            Self::Ce0 => "CE0",
            Self::Ce1 => "CE1",
            Self::Ce2 => "CE2",
            Self::Disp => "DISP",
            Self::Pm => "PM",
            Self::Msvld => "MSVLD",
            Self::Sec => "SEC",
            Self::Mspdec => "MSPDEC",
        }
    }
}

impl core::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
