//! # MMU synchronization primitives
//!
//! The MMU core never sleeps: TLB flushes poll a register with a bounded
//! timeout while holding the flush lock, so the lock itself is a plain
//! test-and-test-and-set spin lock.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;

pub use spin_lock::{SpinLock, SpinLockGuard};
