// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Schema descriptions exchanged in compatible mode.
//!
//! Layout of an encoded [`TypeMeta`]:
//!
//! ```text
//! u64 LE header : bits 0..12 body size (0xfff => + varuint), bit 12 has-fields,
//!                 bits 14..64 integrity hash of the body
//! body          : meta byte (bit 5 by-name, bits 0..5 field count, 31 => + varuint)
//!                 identity (varuint wire id | namespace + type name)
//!                 fields   (header byte, field type, name bytes)*
//! ```

use crate::buffer::{Reader, Writer};
use crate::error::{CodecError, Result};
use crate::meta::meta_string::{
    Encoding, MetaString, FIELD_NAME_DECODER, FIELD_NAME_ENCODER, NAMESPACE_DECODER,
    TYPE_NAME_DECODER,
};
use crate::types::type_id;

const SIZE_MASK: u64 = 0xfff;
const HAS_FIELDS: u64 = 1 << 12;
const HASH_SHIFT: u32 = 14;
const HASH_BITS: u64 = (1 << 50) - 1;

const BY_NAME: u8 = 1 << 5;
const SMALL_FIELD_COUNT: u8 = 0b1_1111;

const FIELD_NULLABLE: u8 = 0b10;
const FIELD_TRACKING: u8 = 0b01;
const SMALL_NAME_SIZE: usize = 0b1111;

/// Encodings a field name may use, indexed by the two high header bits.
pub const FIELD_NAME_ENCODINGS: [Encoding; 4] = [
    Encoding::Utf8,
    Encoding::LowerSpecial,
    Encoding::AllToLowerSpecial,
    Encoding::LowerUpperDigitSpecial,
];

/// Wire type of a struct field, with nested generic parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldType {
    /// Internal kind (user registrations keep only the low byte).
    pub type_id: u32,
    /// The field may be null.
    pub nullable: bool,
    /// The field is written with identity tracking.
    pub tracking: bool,
    /// Element/key/value types for containers.
    pub generics: Vec<FieldType>,
}

impl FieldType {
    /// A non-nullable, untracked leaf type.
    pub const fn leaf(type_id: u32) -> Self {
        Self {
            type_id,
            nullable: false,
            tracking: false,
            generics: Vec::new(),
        }
    }

    /// A container type with nested parameters.
    pub fn with_generics(type_id: u32, generics: Vec<FieldType>) -> Self {
        Self {
            type_id,
            nullable: false,
            tracking: false,
            generics,
        }
    }

    /// Whether a value of this type carries its own type info when written
    /// as a field (dynamic slots always, structs in compatible mode).
    pub const fn carries_type_info(&self, compatible: bool) -> bool {
        self.type_id == type_id::UNKNOWN || (compatible && type_id::is_struct(self.type_id))
    }

    fn write_nested(&self, w: &mut Writer) {
        let flags = (u32::from(self.nullable) << 1) | u32::from(self.tracking);
        w.write_varuint32((self.type_id << 2) | flags);
        self.write_generics(w);
    }

    fn write_generics(&self, w: &mut Writer) {
        for generic in &self.generics {
            generic.write_nested(w);
        }
    }

    fn read_nested(r: &mut Reader<'_>, depth: u32) -> Result<Self> {
        let raw = r.read_varuint32()?;
        let mut field_type = Self {
            type_id: raw >> 2,
            nullable: raw & 0b10 != 0,
            tracking: raw & 0b01 != 0,
            generics: Vec::new(),
        };
        field_type.read_generics(r, depth)?;
        Ok(field_type)
    }

    fn read_generics(&mut self, r: &mut Reader<'_>, depth: u32) -> Result<()> {
        let arity = type_id::generic_arity(self.type_id);
        if arity > 0 && depth >= 32 {
            return Err(CodecError::CorruptTypeMeta("field type nested too deeply"));
        }
        for _ in 0..arity {
            self.generics.push(Self::read_nested(r, depth + 1)?);
        }
        Ok(())
    }
}

/// A named field of a struct schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldInfo {
    name: String,
    field_type: FieldType,
}

impl FieldInfo {
    /// Describe a field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire type.
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }
}

/// How a schema identifies its type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeIdentity {
    /// Registered by number; holds the full wire id.
    Id(u32),
    /// Registered by namespace and name.
    Named {
        /// Namespace, encoded with the namespace alphabet.
        namespace: MetaString,
        /// Type name, encoded with the type-name alphabet.
        type_name: MetaString,
    },
}

/// Schema of a user struct: identity plus ordered fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeMeta {
    identity: TypeIdentity,
    fields: Vec<FieldInfo>,
}

impl TypeMeta {
    /// Assemble a schema.
    pub fn new(identity: TypeIdentity, fields: Vec<FieldInfo>) -> Self {
        Self { identity, fields }
    }

    /// Type identity.
    pub fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Encode header and body.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = self.encode_body()?;
        let hash = body_hash(&body);
        let size = body.len() as u64;
        let mut header = (hash << HASH_SHIFT) | size.min(SIZE_MASK);
        if !self.fields.is_empty() {
            header |= HAS_FIELDS;
        }
        let mut w = Writer::with_capacity(body.len() + 10);
        w.write_u64(header);
        if size >= SIZE_MASK {
            w.write_varuint64(size - SIZE_MASK);
        }
        w.write_bytes(&body);
        Ok(w.into_vec())
    }

    /// Decode one schema, verifying its integrity hash.
    pub fn read_from(r: &mut Reader<'_>) -> Result<Self> {
        let header = r.read_u64()?;
        let mut size = header & SIZE_MASK;
        if size == SIZE_MASK {
            size = size
                .checked_add(r.read_varuint64()?)
                .ok_or(CodecError::CorruptTypeMeta("size overflow"))?;
        }
        let size = usize::try_from(size).map_err(|_| CodecError::LengthTooLarge(size))?;
        let body = r.read_bytes(size)?;
        if body_hash(body) != header >> HASH_SHIFT {
            return Err(CodecError::CorruptTypeMeta("hash mismatch"));
        }
        let meta = Self::decode_body(body)?;
        if meta.fields.is_empty() == (header & HAS_FIELDS != 0) {
            return Err(CodecError::CorruptTypeMeta("field flag disagrees with body"));
        }
        Ok(meta)
    }

    fn encode_body(&self) -> Result<Vec<u8>> {
        let mut w = Writer::default();
        let count = self.fields.len();
        let mut meta = if count >= usize::from(SMALL_FIELD_COUNT) {
            SMALL_FIELD_COUNT
        } else {
            count as u8
        };
        if matches!(self.identity, TypeIdentity::Named { .. }) {
            meta |= BY_NAME;
        }
        w.write_u8(meta);
        if count >= usize::from(SMALL_FIELD_COUNT) {
            w.write_varuint32((count - usize::from(SMALL_FIELD_COUNT)) as u32);
        }
        match &self.identity {
            TypeIdentity::Id(id) => w.write_varuint32(*id),
            TypeIdentity::Named {
                namespace,
                type_name,
            } => {
                write_name(&mut w, namespace)?;
                write_name(&mut w, type_name)?;
            }
        }
        for field in &self.fields {
            write_field(&mut w, field)?;
        }
        Ok(w.into_vec())
    }

    fn decode_body(body: &[u8]) -> Result<Self> {
        let mut r = Reader::new(body);
        let meta = r.read_u8()?;
        let mut count = usize::from(meta & SMALL_FIELD_COUNT);
        if count == usize::from(SMALL_FIELD_COUNT) {
            count += r.read_varuint32()? as usize;
        }
        let identity = if meta & BY_NAME == 0 {
            TypeIdentity::Id(r.read_varuint32()?)
        } else {
            let namespace = read_name(&mut r, |bytes, e| NAMESPACE_DECODER.decode(bytes, e))?;
            let type_name = read_name(&mut r, |bytes, e| TYPE_NAME_DECODER.decode(bytes, e))?;
            TypeIdentity::Named {
                namespace,
                type_name,
            }
        };
        let mut fields = Vec::with_capacity(count.min(r.remaining()));
        for _ in 0..count {
            fields.push(read_field(&mut r)?);
        }
        if r.remaining() != 0 {
            return Err(CodecError::CorruptTypeMeta("trailing bytes in body"));
        }
        Ok(Self { identity, fields })
    }
}

/// Stable 32-bit fingerprint of a field list, used to detect schema drift in
/// schema-consistent mode.
pub fn struct_hash(fields: &[FieldInfo]) -> i32 {
    let mut hasher = blake3::Hasher::new();
    for field in fields {
        hasher.update(field.name.as_bytes());
        hasher.update(&[0]);
        hash_field_type(&mut hasher, &field.field_type);
    }
    let digest = hasher.finalize();
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&digest.as_bytes()[..4]);
    i32::from_le_bytes(raw)
}

fn hash_field_type(hasher: &mut blake3::Hasher, field_type: &FieldType) {
    hasher.update(&field_type.type_id.to_le_bytes());
    hasher.update(&[u8::from(field_type.nullable)]);
    for generic in &field_type.generics {
        hash_field_type(hasher, generic);
    }
}

fn body_hash(body: &[u8]) -> u64 {
    let digest = blake3::hash(body);
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(raw) & HASH_BITS
}

fn write_name(w: &mut Writer, name: &MetaString) -> Result<()> {
    w.write_u8(name.encoding().tag());
    w.write_len_prefixed(name.bytes())
}

fn read_name(
    r: &mut Reader<'_>,
    decode: impl Fn(&[u8], Encoding) -> Result<MetaString>,
) -> Result<MetaString> {
    let encoding = Encoding::from_tag(r.read_u8()?)?;
    let bytes = r.read_len_prefixed()?;
    decode(bytes, encoding)
}

fn write_field(w: &mut Writer, field: &FieldInfo) -> Result<()> {
    let name = FIELD_NAME_ENCODER.encode_with_encodings(&field.name, &FIELD_NAME_ENCODINGS)?;
    let encoding_index = FIELD_NAME_ENCODINGS
        .iter()
        .position(|e| *e == name.encoding())
        .ok_or(CodecError::CorruptTypeMeta("field name encoding"))?;
    let size = name
        .bytes()
        .len()
        .checked_sub(1)
        .ok_or(CodecError::InvalidData("empty field name"))?;
    let ty = &field.field_type;
    let mut header = (encoding_index as u8) << 6;
    header |= (size.min(SMALL_NAME_SIZE) as u8) << 2;
    if ty.nullable {
        header |= FIELD_NULLABLE;
    }
    if ty.tracking {
        header |= FIELD_TRACKING;
    }
    w.write_u8(header);
    if size >= SMALL_NAME_SIZE {
        w.write_varuint32((size - SMALL_NAME_SIZE) as u32);
    }
    w.write_varuint32(ty.type_id);
    ty.write_generics(w);
    w.write_bytes(name.bytes());
    Ok(())
}

fn read_field(r: &mut Reader<'_>) -> Result<FieldInfo> {
    let header = r.read_u8()?;
    let encoding = FIELD_NAME_ENCODINGS[usize::from(header >> 6)];
    let mut size = usize::from((header >> 2) & 0b1111);
    if size == SMALL_NAME_SIZE {
        size += r.read_varuint32()? as usize;
    }
    let mut field_type = FieldType {
        type_id: r.read_varuint32()?,
        nullable: header & FIELD_NULLABLE != 0,
        tracking: header & FIELD_TRACKING != 0,
        generics: Vec::new(),
    };
    field_type.read_generics(r, 0)?;
    let bytes = r.read_bytes(size + 1)?;
    let name = FIELD_NAME_DECODER.decode(bytes, encoding)?;
    Ok(FieldInfo {
        name: name.as_str().to_owned(),
        field_type,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::meta::meta_string::{NAMESPACE_ENCODER, TYPE_NAME_ENCODER};

    fn sample() -> TypeMeta {
        let list_of_strings =
            FieldType::with_generics(type_id::LIST, vec![FieldType::leaf(type_id::STRING)]);
        let mut nullable_name = FieldType::leaf(type_id::STRING);
        nullable_name.nullable = true;
        TypeMeta::new(
            TypeIdentity::Named {
                namespace: NAMESPACE_ENCODER.encode("demo.shop").unwrap(),
                type_name: TYPE_NAME_ENCODER.encode("Order").unwrap(),
            },
            vec![
                FieldInfo::new("id", FieldType::leaf(type_id::INT64)),
                FieldInfo::new("customerName", nullable_name),
                FieldInfo::new("tags", list_of_strings),
                FieldInfo::new("a_really_long_field_name_over_fifteen", FieldType::leaf(type_id::BOOL)),
            ],
        )
    }

    #[test]
    fn encodes_and_decodes_named_schema() {
        let meta = sample();
        let bytes = meta.to_bytes().unwrap();
        let mut r = Reader::new(&bytes);
        let back = TypeMeta::read_from(&mut r).unwrap();
        assert_eq!(r.remaining(), 0);
        assert_eq!(back.fields(), meta.fields());
        match back.identity() {
            TypeIdentity::Named {
                namespace,
                type_name,
            } => {
                assert_eq!(namespace.as_str(), "demo.shop");
                assert_eq!(type_name.as_str(), "Order");
            }
            TypeIdentity::Id(_) => panic!("expected named identity"),
        }
    }

    #[test]
    fn id_schema_without_fields() {
        let meta = TypeMeta::new(TypeIdentity::Id(type_id::user(3, type_id::COMPATIBLE_STRUCT)), vec![]);
        let bytes = meta.to_bytes().unwrap();
        let back = TypeMeta::read_from(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn corrupted_body_fails_hash_check() {
        let mut bytes = sample().to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert_eq!(
            TypeMeta::read_from(&mut Reader::new(&bytes)),
            Err(CodecError::CorruptTypeMeta("hash mismatch"))
        );
    }

    #[test]
    fn many_fields_use_extended_count() {
        let fields = (0..40)
            .map(|i| FieldInfo::new(format!("f{i}"), FieldType::leaf(type_id::INT32)))
            .collect();
        let meta = TypeMeta::new(TypeIdentity::Id(type_id::user(1, type_id::COMPATIBLE_STRUCT)), fields);
        let bytes = meta.to_bytes().unwrap();
        assert_eq!(TypeMeta::read_from(&mut Reader::new(&bytes)).unwrap(), meta);
    }

    #[test]
    fn struct_hash_tracks_layout() {
        let a = vec![FieldInfo::new("x", FieldType::leaf(type_id::INT32))];
        let b = vec![FieldInfo::new("x", FieldType::leaf(type_id::INT64))];
        let c = vec![FieldInfo::new("y", FieldType::leaf(type_id::INT32))];
        assert_eq!(struct_hash(&a), struct_hash(&a.clone()));
        assert_ne!(struct_hash(&a), struct_hash(&b));
        assert_ne!(struct_hash(&a), struct_hash(&c));
    }
}
