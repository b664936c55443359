//! # Typed GPU Registers
//!
//! Register access for the MMU core is external: the embedding driver hands in
//! something that implements [`Mmio`] (32-bit reads/writes at a byte offset
//! into the register BAR) and [`Timer`] (a monotonic nanosecond clock). Both
//! are assumed strongly ordered with respect to the device.
//!
//! On top of that this crate provides typed register words built with
//! `bitfield-struct` ([`MmuFlushCtrl`]) and the bounded poll ([`wait`]) used
//! for every "kick and wait for the busy bit to drop" sequence.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod flush_ctrl;

pub use flush_ctrl::MmuFlushCtrl;

/// 32-bit register access into the device's MMIO aperture.
pub trait Mmio {
    /// Read the register at byte offset `addr`.
    fn rd32(&self, addr: u32) -> u32;

    /// Write `value` to the register at byte offset `addr`.
    fn wr32(&self, addr: u32, value: u32);

    /// Read a typed register word.
    #[inline]
    fn load<R: From<u32>>(&self, addr: u32) -> R
    where
        Self: Sized,
    {
        R::from(self.rd32(addr))
    }

    /// Write a typed register word.
    #[inline]
    fn store<R: Into<u32>>(&self, addr: u32, value: R)
    where
        Self: Sized,
    {
        self.wr32(addr, value.into());
    }
}

/// Monotonic time source used to bound register polls.
pub trait Timer {
    /// Nanoseconds since an arbitrary, fixed epoch.
    fn read_ns(&self) -> u64;
}

impl<T: Mmio + ?Sized> Mmio for &T {
    #[inline]
    fn rd32(&self, addr: u32) -> u32 {
        (**self).rd32(addr)
    }

    #[inline]
    fn wr32(&self, addr: u32, value: u32) {
        (**self).wr32(addr, value);
    }
}

impl<T: Timer + ?Sized> Timer for &T {
    #[inline]
    fn read_ns(&self) -> u64 {
        (**self).read_ns()
    }
}

/// Poll `addr` until `(value & mask) == expected` or `timeout_ns` elapses.
///
/// The register is always read at least once, so a zero timeout still
/// succeeds for a condition that already holds. Spins; never sleeps.
///
/// Returns `true` if the condition was observed.
pub fn wait<M, T>(mmio: &M, timer: &T, addr: u32, mask: u32, expected: u32, timeout_ns: u64) -> bool
where
    M: Mmio + ?Sized,
    T: Timer + ?Sized,
{
    let start = timer.read_ns();
    loop {
        if mmio.rd32(addr) & mask == expected {
            return true;
        }
        if timer.read_ns().saturating_sub(start) >= timeout_ns {
            return false;
        }
        core::hint::spin_loop();
    }
}
