use bitfield_struct::bitfield;

/// Access flags requested for a mapping.
///
/// | Bit | Flag       | Effect on the PTE                                   |
/// |-----|------------|-----------------------------------------------------|
/// | 0   | `read`     | none (every valid PTE is readable)                  |
/// | 1   | `write`    | clears `READ_ONLY`                                  |
/// | 2   | `sys`      | sets `SYS` (system-visible)                         |
/// | 3   | `vm`       | none                                                |
/// | 4   | `no_snoop` | system pages use the non-coherent aperture          |
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Access {
    pub read: bool,
    pub write: bool,
    pub sys: bool,
    pub vm: bool,
    pub no_snoop: bool,

    #[bits(3, default = 0)]
    _reserved_5_7: u8,
}

impl Access {
    pub const READ_ONLY: Self = Self::new().with_read(true);
    pub const READ_WRITE: Self = Self::new().with_read(true).with_write(true);
}
