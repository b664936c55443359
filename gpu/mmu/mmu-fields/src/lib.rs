//! # Hardware Bit Fields
//!
//! GPU register and page-table layouts are documented as `high:low` bit
//! ranges per field, e.g.
//!
//! ```text
//! PTE.VALID        0:0
//! PTE.APERTURE     5:4
//! PTE.MEMTYPE     48:40
//! ```
//!
//! plus named constants per field (`PTE.APERTURE.SYSTEM_COHERENT_MEMORY = 2`).
//!
//! This crate provides
//! - [`FieldRange`]: the codec for a single `high:low` range (width, shift,
//!   mask, extract, insert, place a constant), and
//! - [`FieldTable`]: a lookup table from `(register, field)` to its range and
//!   from `(register, field, name)` to its constant, populated from per-chip
//!   configuration data.
//!
//! Ranges are metadata. They are never derived from runtime data, so a
//! malformed range (`high < low`) is a programming error and fails fast.
//!
//! ## Example
//! ```rust
//! use mmu_fields::{ConstDef, FieldDef, FieldRange, FieldTable};
//!
//! static FIELDS: &[FieldDef] = &[FieldDef::new("PTE", "APERTURE", FieldRange::new(5, 4))];
//! static CONSTS: &[ConstDef] = &[ConstDef::new("PTE", "APERTURE", "SYSTEM_COHERENT_MEMORY", 2)];
//!
//! let table = FieldTable::new(FIELDS, CONSTS);
//! let aperture = table.field("PTE", "APERTURE").unwrap();
//! assert_eq!(aperture.width(), 2);
//! assert_eq!(table.place_const("PTE", "APERTURE", "SYSTEM_COHERENT_MEMORY"), Ok(0b10_0000));
//! ```

#![cfg_attr(not(test), no_std)]

mod range;
mod table;

pub use crate::range::FieldRange;
pub use crate::table::{ConstDef, FieldDef, FieldError, FieldTable};
