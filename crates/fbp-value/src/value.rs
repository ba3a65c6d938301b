//! The tagged-union value type carried by every publish and retained topic.

use crate::flags::ValueFlags;
use std::sync::Arc;

/// A variable-length payload.
///
/// Stored behind an `Arc` so that a `Const` publish (caller guarantees the
/// bytes outlive the value) and a copy made into the engine's arena look
/// identical from the outside: both are cheap to clone and cheap to compare.
/// The arena bookkeeping that enforces FIFO retirement for non-const
/// payloads lives in `fbp-pubsub`, not here.
pub type Bytes = Arc<[u8]>;

/// The payload carried by a [`Value`].
#[derive(Debug, Clone)]
pub enum ValueData {
    Null,
    Str(Arc<str>),
    /// Raw JSON text (not parsed eagerly; metadata consumers parse on demand).
    Json(Arc<str>),
    Bin(Bytes),
    F32(f32),
    F64(f64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
}

impl ValueData {
    /// Byte size of the payload: the string/JSON/binary length, or 0 for scalars.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            ValueData::Null => 0,
            ValueData::Str(s) | ValueData::Json(s) => s.len(),
            ValueData::Bin(b) => b.len(),
            ValueData::F32(_) | ValueData::F64(_) => 0,
            ValueData::U8(_) | ValueData::I8(_) => 0,
            ValueData::U16(_) | ValueData::I16(_) => 0,
            ValueData::U32(_) | ValueData::I32(_) => 0,
            ValueData::U64(_) | ValueData::I64(_) => 0,
        }
    }

    /// True for `Str`/`Json`/`Bin`, the variants whose `Retain` requires `Const`.
    #[must_use]
    pub fn is_variable_length(&self) -> bool {
        matches!(self, ValueData::Str(_) | ValueData::Json(_) | ValueData::Bin(_))
    }

    fn bits_eq(&self, other: &ValueData) -> bool {
        match (self, other) {
            (ValueData::Null, ValueData::Null) => true,
            (ValueData::Str(a), ValueData::Str(b)) | (ValueData::Json(a), ValueData::Json(b)) => {
                a == b
            }
            (ValueData::Bin(a), ValueData::Bin(b)) => a == b,
            (ValueData::F32(a), ValueData::F32(b)) => a.to_bits() == b.to_bits(),
            (ValueData::F64(a), ValueData::F64(b)) => a.to_bits() == b.to_bits(),
            (ValueData::U8(a), ValueData::U8(b)) => a == b,
            (ValueData::U16(a), ValueData::U16(b)) => a == b,
            (ValueData::U32(a), ValueData::U32(b)) => a == b,
            (ValueData::U64(a), ValueData::U64(b)) => a == b,
            (ValueData::I8(a), ValueData::I8(b)) => a == b,
            (ValueData::I16(a), ValueData::I16(b)) => a == b,
            (ValueData::I32(a), ValueData::I32(b)) => a == b,
            (ValueData::I64(a), ValueData::I64(b)) => a == b,
            _ => false,
        }
    }
}

/// A value published to or retained on a topic.
///
/// Equality (used by the dedup rule in the pubsub engine's `process()` loop)
/// compares the payload bits exactly and the flags exactly — it is not a
/// semantic equality, it is the wire-level "would this look identical to a
/// subscriber" equality the spec calls for.
#[derive(Debug, Clone)]
pub struct Value {
    pub data: ValueData,
    pub flags: ValueFlags,
}

impl Value {
    #[must_use]
    pub fn new(data: ValueData, flags: ValueFlags) -> Value {
        Value { data, flags }
    }

    #[must_use]
    pub fn null() -> Value {
        Value::new(ValueData::Null, ValueFlags::NONE)
    }

    /// Build a `Const` `Str` value — the common shape for metadata and
    /// retained string topics that don't need an arena copy.
    #[must_use]
    pub fn str_const(s: impl Into<Arc<str>>, extra: ValueFlags) -> Value {
        Value::new(ValueData::Str(s.into()), ValueFlags::CONST | extra)
    }

    /// Build a `Const` `Json` value from already-serialized text.
    #[must_use]
    pub fn json_const(s: impl Into<Arc<str>>, extra: ValueFlags) -> Value {
        Value::new(ValueData::Json(s.into()), ValueFlags::CONST | extra)
    }

    #[must_use]
    pub fn u32(v: u32, extra: ValueFlags) -> Value {
        Value::new(ValueData::U32(v), extra)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self.data, ValueData::Null)
    }

    /// Dedup equality per §4.3.3: same type, same flags-except-source, same
    /// bytes/scalar bits. There is no "source" field on `Value` itself (the
    /// source subscriber lives on the enqueued `Message`), so this is a
    /// plain flags-and-bits comparison.
    #[must_use]
    pub fn dedup_eq(&self, other: &Value) -> bool {
        self.flags.dedup_eq(other.flags) && self.data.bits_eq(&other.data)
    }

    /// Validate the `Retain` + variable-length + `Const` rule from §4.3.1.
    ///
    /// # Errors
    /// Returns [`crate::FbpError::InvalidParameter`] if a variable-length
    /// payload requests `Retain` without `Const`.
    pub fn validate_retain_const(&self) -> crate::Result<()> {
        if self.flags.retain() && self.data.is_variable_length() && !self.flags.is_const() {
            return Err(crate::FbpError::InvalidParameter(
                "variable-length Retain payload must be Const".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_eq_ignores_nothing_but_matches_identical_values() {
        let a = Value::u32(1, ValueFlags::RETAIN);
        let b = Value::u32(1, ValueFlags::RETAIN);
        let c = Value::u32(2, ValueFlags::RETAIN);
        assert!(a.dedup_eq(&b));
        assert!(!a.dedup_eq(&c));
    }

    #[test]
    fn dedup_eq_distinguishes_flags() {
        let a = Value::u32(1, ValueFlags::RETAIN);
        let b = Value::u32(1, ValueFlags::NONE);
        assert!(!a.dedup_eq(&b));
    }

    #[test]
    fn f64_dedup_eq_uses_bit_pattern_not_float_eq() {
        let nan = Value::new(ValueData::F64(f64::NAN), ValueFlags::NONE);
        let nan2 = Value::new(ValueData::F64(f64::NAN), ValueFlags::NONE);
        assert!(nan.dedup_eq(&nan2), "identical NaN bit patterns must compare equal");
    }

    #[test]
    fn variable_length_retain_requires_const() {
        let v = Value::new(ValueData::Str("x".into()), ValueFlags::RETAIN);
        assert!(v.validate_retain_const().is_err());
        let v = Value::new(ValueData::Str("x".into()), ValueFlags::RETAIN | ValueFlags::CONST);
        assert!(v.validate_retain_const().is_ok());
    }

    #[test]
    fn size_reports_payload_length_for_variable_types() {
        let v = Value::str_const("hello", ValueFlags::NONE);
        assert_eq!(v.data.size(), 5);
        let v = Value::u32(7, ValueFlags::NONE);
        assert_eq!(v.data.size(), 0);
    }
}
