//! # Register Field Tables
//!
//! A typed replacement for name-pasting register definitions: every field of
//! every register is one [`FieldDef`] row, every named value one [`ConstDef`]
//! row. Chips ship their own tables as `static` data.

use crate::FieldRange;

/// One `register.field = high:low` row.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FieldDef {
    pub register: &'static str,
    pub field: &'static str,
    pub range: FieldRange,
}

/// One `register.field.name = value` row.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConstDef {
    pub register: &'static str,
    pub field: &'static str,
    pub name: &'static str,
    pub value: u64,
}

impl FieldDef {
    #[must_use]
    pub const fn new(register: &'static str, field: &'static str, range: FieldRange) -> Self {
        Self {
            register,
            field,
            range,
        }
    }
}

impl ConstDef {
    #[must_use]
    pub const fn new(
        register: &'static str,
        field: &'static str,
        name: &'static str,
        value: u64,
    ) -> Self {
        Self {
            register,
            field,
            name,
            value,
        }
    }
}

/// Error returned by [`FieldTable`] lookups.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("unknown field {register}.{field}")]
    UnknownField {
        register: &'static str,
        field: &'static str,
    },
    #[error("unknown constant {register}.{field}.{name}")]
    UnknownConstant {
        register: &'static str,
        field: &'static str,
        name: &'static str,
    },
    #[error("constant {register}.{field}.{name} = {value:#x} does not fit in {width} bits")]
    ConstantTooWide {
        register: &'static str,
        field: &'static str,
        name: &'static str,
        value: u64,
        width: u32,
    },
}

/// Lookup table over a chip's field and constant definitions.
///
/// Lookups are linear scans; tables are small and resolved once at
/// initialization, never on hot paths.
#[derive(Copy, Clone, Debug)]
pub struct FieldTable<'t> {
    fields: &'t [FieldDef],
    consts: &'t [ConstDef],
}

impl<'t> FieldTable<'t> {
    #[must_use]
    pub const fn new(fields: &'t [FieldDef], consts: &'t [ConstDef]) -> Self {
        Self { fields, consts }
    }

    /// Look up the bit range of `register.field`.
    ///
    /// # Errors
    /// [`FieldError::UnknownField`] if the table has no such row.
    pub fn field(
        &self,
        register: &'static str,
        field: &'static str,
    ) -> Result<FieldRange, FieldError> {
        self.fields
            .iter()
            .find(|d| d.register == register && d.field == field)
            .map(|d| d.range)
            .ok_or(FieldError::UnknownField { register, field })
    }

    /// Look up the raw (unshifted) value of `register.field.name`.
    ///
    /// The value is checked against the field's width.
    ///
    /// # Errors
    /// - [`FieldError::UnknownField`] if the field itself is missing.
    /// - [`FieldError::UnknownConstant`] if the constant is missing.
    /// - [`FieldError::ConstantTooWide`] if the value would be truncated.
    pub fn constant(
        &self,
        register: &'static str,
        field: &'static str,
        name: &'static str,
    ) -> Result<u64, FieldError> {
        let range = self.field(register, field)?;
        let value = self
            .consts
            .iter()
            .find(|c| c.register == register && c.field == field && c.name == name)
            .map(|c| c.value)
            .ok_or(FieldError::UnknownConstant {
                register,
                field,
                name,
            })?;

        if !range.fits(value) {
            return Err(FieldError::ConstantTooWide {
                register,
                field,
                name,
                value,
                width: range.width(),
            });
        }
        Ok(value)
    }

    /// Look up `register.field.name` and shift it into place.
    ///
    /// # Errors
    /// See [`constant`](Self::constant).
    pub fn place_const(
        &self,
        register: &'static str,
        field: &'static str,
        name: &'static str,
    ) -> Result<u64, FieldError> {
        let range = self.field(register, field)?;
        Ok(range.place_const(self.constant(register, field, name)?))
    }
}
