//! Canonical binary encoding of `Serialize` values, the input to state stamps.
//!
//! Every value is written as a tag byte followed by a fixed-width or
//! length-prefixed payload, so the encoding is prefix-free and injective over
//! the serde data model:
//!
//! - `None` and `Some(None)` get distinct tags;
//! - floats are written as their raw bit pattern, so `NaN`, `inf` and `-0.0`
//!   all stay distinct;
//! - integers of every width are written at 128 bits, so `u128::MAX` encodes
//!   like any other value.
//!
//! Map entries are sorted by their encoded key, which keeps `HashMap`
//! iteration order out of the output. Sequences keep their order; a type
//! whose `Serialize` walks an unordered set would leak iteration order, so
//! such sets are not [`Protectable`](crate::stamp::Protectable).

use std::fmt;

use serde::Serialize;
use serde::ser;

mod tag {
    pub const UNIT: u8 = 0x00;
    pub const BOOL: u8 = 0x01;
    pub const INT: u8 = 0x02;
    pub const UINT: u8 = 0x03;
    pub const F32: u8 = 0x04;
    pub const F64: u8 = 0x05;
    pub const CHAR: u8 = 0x06;
    pub const STR: u8 = 0x07;
    pub const BYTES: u8 = 0x08;
    pub const NONE: u8 = 0x09;
    pub const SOME: u8 = 0x0A;
    pub const UNIT_STRUCT: u8 = 0x0B;
    pub const UNIT_VARIANT: u8 = 0x0C;
    pub const NEWTYPE_STRUCT: u8 = 0x0D;
    pub const NEWTYPE_VARIANT: u8 = 0x0E;
    pub const SEQ: u8 = 0x0F;
    pub const TUPLE: u8 = 0x10;
    pub const TUPLE_STRUCT: u8 = 0x11;
    pub const TUPLE_VARIANT: u8 = 0x12;
    pub const MAP: u8 = 0x13;
    pub const STRUCT: u8 = 0x14;
    pub const STRUCT_VARIANT: u8 = 0x15;
}

/// Raised by a value's own `Serialize` impl (or a map missing a key).
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct EncodeError(String);

impl ser::Error for EncodeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

/// Encode `value` canonically.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodeError> {
    value.serialize(Canonical)
}

fn put_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u64).to_le_bytes());
}

fn put_name(out: &mut Vec<u8>, name: &str) {
    put_len(out, name.len());
    out.extend_from_slice(name.as_bytes());
}

fn header(tag: u8, name: &str) -> Vec<u8> {
    let mut out = vec![tag];
    put_name(&mut out, name);
    out
}

fn variant_header(tag: u8, name: &str, index: u32, variant: &str) -> Vec<u8> {
    let mut out = header(tag, name);
    out.extend_from_slice(&index.to_le_bytes());
    put_name(&mut out, variant);
    out
}

struct Canonical;

impl ser::Serializer for Canonical {
    type Ok = Vec<u8>;
    type Error = EncodeError;
    type SerializeSeq = Compound;
    type SerializeTuple = Compound;
    type SerializeTupleStruct = Compound;
    type SerializeTupleVariant = Compound;
    type SerializeMap = MapCompound;
    type SerializeStruct = Compound;
    type SerializeStructVariant = Compound;

    fn serialize_bool(self, v: bool) -> Result<Vec<u8>, EncodeError> {
        Ok(vec![tag::BOOL, u8::from(v)])
    }

    fn serialize_i8(self, v: i8) -> Result<Vec<u8>, EncodeError> {
        self.serialize_i128(v.into())
    }

    fn serialize_i16(self, v: i16) -> Result<Vec<u8>, EncodeError> {
        self.serialize_i128(v.into())
    }

    fn serialize_i32(self, v: i32) -> Result<Vec<u8>, EncodeError> {
        self.serialize_i128(v.into())
    }

    fn serialize_i64(self, v: i64) -> Result<Vec<u8>, EncodeError> {
        self.serialize_i128(v.into())
    }

    fn serialize_i128(self, v: i128) -> Result<Vec<u8>, EncodeError> {
        let mut out = vec![tag::INT];
        out.extend_from_slice(&v.to_le_bytes());
        Ok(out)
    }

    fn serialize_u8(self, v: u8) -> Result<Vec<u8>, EncodeError> {
        self.serialize_u128(v.into())
    }

    fn serialize_u16(self, v: u16) -> Result<Vec<u8>, EncodeError> {
        self.serialize_u128(v.into())
    }

    fn serialize_u32(self, v: u32) -> Result<Vec<u8>, EncodeError> {
        self.serialize_u128(v.into())
    }

    fn serialize_u64(self, v: u64) -> Result<Vec<u8>, EncodeError> {
        self.serialize_u128(v.into())
    }

    fn serialize_u128(self, v: u128) -> Result<Vec<u8>, EncodeError> {
        let mut out = vec![tag::UINT];
        out.extend_from_slice(&v.to_le_bytes());
        Ok(out)
    }

    fn serialize_f32(self, v: f32) -> Result<Vec<u8>, EncodeError> {
        let mut out = vec![tag::F32];
        out.extend_from_slice(&v.to_bits().to_le_bytes());
        Ok(out)
    }

    fn serialize_f64(self, v: f64) -> Result<Vec<u8>, EncodeError> {
        let mut out = vec![tag::F64];
        out.extend_from_slice(&v.to_bits().to_le_bytes());
        Ok(out)
    }

    fn serialize_char(self, v: char) -> Result<Vec<u8>, EncodeError> {
        let mut out = vec![tag::CHAR];
        out.extend_from_slice(&u32::from(v).to_le_bytes());
        Ok(out)
    }

    fn serialize_str(self, v: &str) -> Result<Vec<u8>, EncodeError> {
        Ok(header(tag::STR, v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Vec<u8>, EncodeError> {
        let mut out = vec![tag::BYTES];
        put_len(&mut out, v.len());
        out.extend_from_slice(v);
        Ok(out)
    }

    fn serialize_none(self) -> Result<Vec<u8>, EncodeError> {
        Ok(vec![tag::NONE])
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Vec<u8>, EncodeError> {
        let mut out = vec![tag::SOME];
        out.extend(value.serialize(Canonical)?);
        Ok(out)
    }

    fn serialize_unit(self) -> Result<Vec<u8>, EncodeError> {
        Ok(vec![tag::UNIT])
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Vec<u8>, EncodeError> {
        Ok(header(tag::UNIT_STRUCT, name))
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> Result<Vec<u8>, EncodeError> {
        Ok(variant_header(tag::UNIT_VARIANT, name, variant_index, variant))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Vec<u8>, EncodeError> {
        let mut out = header(tag::NEWTYPE_STRUCT, name);
        out.extend(value.serialize(Canonical)?);
        Ok(out)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Vec<u8>, EncodeError> {
        let mut out = variant_header(tag::NEWTYPE_VARIANT, name, variant_index, variant);
        out.extend(value.serialize(Canonical)?);
        Ok(out)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Compound, EncodeError> {
        Ok(Compound::new(vec![tag::SEQ]))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Compound, EncodeError> {
        Ok(Compound::new(vec![tag::TUPLE]))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Compound, EncodeError> {
        Ok(Compound::new(header(tag::TUPLE_STRUCT, name)))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Compound, EncodeError> {
        Ok(Compound::new(variant_header(
            tag::TUPLE_VARIANT,
            name,
            variant_index,
            variant,
        )))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapCompound, EncodeError> {
        Ok(MapCompound::default())
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<Compound, EncodeError> {
        Ok(Compound::new(header(tag::STRUCT, name)))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Compound, EncodeError> {
        Ok(Compound::new(variant_header(
            tag::STRUCT_VARIANT,
            name,
            variant_index,
            variant,
        )))
    }
}

/// Sequence-shaped output: header, element count, elements in order.
struct Compound {
    out: Vec<u8>,
    body: Vec<u8>,
    count: usize,
}

impl Compound {
    fn new(out: Vec<u8>) -> Self {
        Self {
            out,
            body: Vec::new(),
            count: 0,
        }
    }

    fn push<T: ?Sized + Serialize>(
        &mut self,
        field: Option<&str>,
        value: &T,
    ) -> Result<(), EncodeError> {
        if let Some(field) = field {
            put_name(&mut self.body, field);
        }
        self.body.extend(value.serialize(Canonical)?);
        self.count += 1;
        Ok(())
    }

    fn finish(mut self) -> Vec<u8> {
        put_len(&mut self.out, self.count);
        self.out.extend(self.body);
        self.out
    }
}

impl ser::SerializeSeq for Compound {
    type Ok = Vec<u8>;
    type Error = EncodeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(None, value)
    }

    fn end(self) -> Result<Vec<u8>, EncodeError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for Compound {
    type Ok = Vec<u8>;
    type Error = EncodeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(None, value)
    }

    fn end(self) -> Result<Vec<u8>, EncodeError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for Compound {
    type Ok = Vec<u8>;
    type Error = EncodeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(None, value)
    }

    fn end(self) -> Result<Vec<u8>, EncodeError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for Compound {
    type Ok = Vec<u8>;
    type Error = EncodeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(None, value)
    }

    fn end(self) -> Result<Vec<u8>, EncodeError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for Compound {
    type Ok = Vec<u8>;
    type Error = EncodeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.push(Some(key), value)
    }

    fn end(self) -> Result<Vec<u8>, EncodeError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for Compound {
    type Ok = Vec<u8>;
    type Error = EncodeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.push(Some(key), value)
    }

    fn end(self) -> Result<Vec<u8>, EncodeError> {
        Ok(self.finish())
    }
}

/// Map output: entries sorted by encoded key.
#[derive(Default)]
struct MapCompound {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    key: Option<Vec<u8>>,
}

impl ser::SerializeMap for MapCompound {
    type Ok = Vec<u8>;
    type Error = EncodeError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), EncodeError> {
        self.key = Some(key.serialize(Canonical)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        let key = self
            .key
            .take()
            .ok_or_else(|| EncodeError("map value serialised without a key".into()))?;
        self.entries.push((key, value.serialize(Canonical)?));
        Ok(())
    }

    fn end(mut self) -> Result<Vec<u8>, EncodeError> {
        self.entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let mut out = vec![tag::MAP];
        put_len(&mut out, self.entries.len());
        for (key, value) in self.entries {
            out.extend(key);
            out.extend(value);
        }
        Ok(out)
    }
}
