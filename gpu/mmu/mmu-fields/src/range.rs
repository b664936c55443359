//! # Bit-Field Codec

/// An inclusive `high:low` bit range inside a 64-bit machine word.
///
/// | Operation                 | Result                                   |
/// |---------------------------|------------------------------------------|
/// | [`width`](Self::width)    | `high - low + 1`                         |
/// | [`shift`](Self::shift)    | `low`                                    |
/// | [`mask`](Self::mask)      | `(1 << width) - 1` (logical, unshifted)  |
/// | [`get`](Self::get)        | `(word >> shift) & mask`                 |
/// | [`place`](Self::place)    | `(value & mask) << shift`                |
/// | [`set`](Self::set)        | `word` with the field replaced by `value`|
///
/// Works on 32-bit register words as well; widen with `u64::from`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FieldRange {
    hi: u8,
    lo: u8,
}

impl FieldRange {
    /// Build a range from its documented `high:low` bounds.
    ///
    /// # Panics
    /// If `hi < lo` or `hi > 63`. In a `const` or `static` initializer this
    /// is a compile-time error.
    #[inline]
    #[must_use]
    pub const fn new(hi: u8, lo: u8) -> Self {
        assert!(hi >= lo, "bit field high bit below low bit");
        assert!(hi < 64, "bit field exceeds a 64-bit word");
        Self { hi, lo }
    }

    /// A single-bit field at `bit`.
    #[inline]
    #[must_use]
    pub const fn bit(bit: u8) -> Self {
        Self::new(bit, bit)
    }

    /// Highest bit (inclusive).
    #[inline]
    #[must_use]
    pub const fn hi(self) -> u8 {
        self.hi
    }

    /// Lowest bit (inclusive).
    #[inline]
    #[must_use]
    pub const fn lo(self) -> u8 {
        self.lo
    }

    /// Number of bits covered.
    #[inline]
    #[must_use]
    pub const fn width(self) -> u32 {
        (self.hi - self.lo) as u32 + 1
    }

    /// Position of the lowest bit.
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        self.lo as u32
    }

    /// Logical (width) mask, not shifted into place.
    #[inline]
    #[must_use]
    pub const fn mask(self) -> u64 {
        if self.width() == 64 {
            u64::MAX
        } else {
            (1 << self.width()) - 1
        }
    }

    /// In-place mask, i.e. [`mask`](Self::mask) shifted to [`shift`](Self::shift).
    #[inline]
    #[must_use]
    pub const fn mask_in_place(self) -> u64 {
        self.mask() << self.shift()
    }

    /// Extract the field value from `word`.
    #[inline]
    #[must_use]
    pub const fn get(self, word: u64) -> u64 {
        (word >> self.shift()) & self.mask()
    }

    /// Position `value` at the field. Bits beyond the field width are dropped.
    #[inline]
    #[must_use]
    pub const fn place(self, value: u64) -> u64 {
        (value & self.mask()) << self.shift()
    }

    /// Return `word` with the field replaced by `value`; all other bits are kept.
    #[inline]
    #[must_use]
    pub const fn set(self, word: u64, value: u64) -> u64 {
        (word & !self.mask_in_place()) | self.place(value)
    }

    /// Position a named field constant. Same as [`place`](Self::place); kept
    /// separate so call sites read as "constant" vs. "runtime value".
    #[inline]
    #[must_use]
    pub const fn place_const(self, constant: u64) -> u64 {
        self.place(constant)
    }

    /// Whether `value` is representable in the field without truncation.
    #[inline]
    #[must_use]
    pub const fn fits(self, value: u64) -> bool {
        value & !self.mask() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_shift_mask() {
        let f = FieldRange::new(5, 4);
        assert_eq!(f.width(), 2);
        assert_eq!(f.shift(), 4);
        assert_eq!(f.mask(), 0b11);
        assert_eq!(f.mask_in_place(), 0b11_0000);

        let b = FieldRange::bit(0);
        assert_eq!(b.width(), 1);
        assert_eq!(b.mask(), 1);
    }

    #[test]
    fn full_word_mask_does_not_overflow() {
        let f = FieldRange::new(63, 0);
        assert_eq!(f.width(), 64);
        assert_eq!(f.mask(), u64::MAX);
        assert_eq!(f.get(0xdead_beef_cafe_f00d), 0xdead_beef_cafe_f00d);
    }

    #[test]
    fn set_then_get_returns_value_for_every_range() {
        for lo in 0u8..64 {
            for hi in lo..64 {
                let f = FieldRange::new(hi, lo);
                let values = [0, 1, f.mask() >> 1, f.mask()];
                for v in values {
                    assert_eq!(f.get(f.set(0, v)), v, "{hi}:{lo} <- {v:#x}");
                    assert_eq!(f.width(), u32::from(hi - lo) + 1);
                }
            }
        }
    }

    #[test]
    fn set_preserves_neighbouring_bits() {
        let f = FieldRange::new(9, 7);
        let word = u64::MAX;
        let out = f.set(word, 0b010);
        assert_eq!(f.get(out), 0b010);
        assert_eq!(out | f.mask_in_place(), u64::MAX);
    }

    #[test]
    fn place_truncates_to_width() {
        let f = FieldRange::new(63, 49);
        assert!(!f.fits(1 << 15));
        assert_eq!(f.place(1 << 15), 0);
        assert_eq!(f.place(0x7fff), 0x7fff << 49);
        // Equivalent to shifting the tag into the high address word.
        assert_eq!((f.place(0x1234) >> 32) as u32, 0x1234 << 17);
    }

    #[test]
    #[should_panic(expected = "high bit below low bit")]
    fn inverted_range_fails_fast() {
        let _ = FieldRange::new(3, 4);
    }

    #[test]
    #[should_panic(expected = "exceeds a 64-bit word")]
    fn out_of_word_range_fails_fast() {
        let _ = FieldRange::new(64, 60);
    }
}
