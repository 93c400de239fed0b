// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-frame deduplication of struct schemas and identifier strings.
//!
//! Both caches assign dense indices in first-seen order. The first
//! occurrence carries the full payload; later ones are back-references.

use std::any::TypeId;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::buffer::{Reader, Writer};
use crate::error::{CodecError, Result};
use crate::meta::{Encoding, MetaString, MetaStringDecoder, TypeMeta};

/// Write-side TypeMeta index: Rust type -> index.
#[derive(Debug, Default)]
pub struct MetaWriter {
    indices: FxHashMap<TypeId, u32>,
}

impl MetaWriter {
    /// Emit `(index << 1)` plus the encoded schema on first use, or
    /// `(index << 1) | 1` afterwards.
    pub fn write(&mut self, w: &mut Writer, ty: TypeId, encoded: &[u8]) -> Result<()> {
        if let Some(&index) = self.indices.get(&ty) {
            w.write_varuint32((index << 1) | 1);
            return Ok(());
        }
        let index = u32::try_from(self.indices.len())
            .map_err(|_| CodecError::LengthTooLarge(self.indices.len() as u64))?;
        self.indices.insert(ty, index);
        trace!(index, len = encoded.len(), "type meta assigned");
        w.write_varuint32(index << 1);
        w.write_bytes(encoded);
        Ok(())
    }

    /// Schemas written in this frame.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if no schema has been written.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Forget every index.
    pub fn reset(&mut self) {
        self.indices.clear();
    }
}

/// Read-side TypeMeta table indexed like the write side.
#[derive(Debug, Default)]
pub struct MetaReader {
    metas: Vec<Rc<TypeMeta>>,
}

impl MetaReader {
    /// Read a marker and, for a fresh index, the schema it introduces.
    pub fn read(&mut self, r: &mut Reader<'_>) -> Result<Rc<TypeMeta>> {
        let marker = r.read_varuint32()?;
        let index = marker >> 1;
        let next = self.next_index();
        if marker & 1 == 1 {
            return self
                .metas
                .get(index as usize)
                .cloned()
                .ok_or(CodecError::InvalidMetaIndex { index, next });
        }
        if index > next {
            return Err(CodecError::InvalidMetaIndex { index, next });
        }
        let meta = Rc::new(TypeMeta::read_from(r)?);
        if index == next {
            self.metas.push(Rc::clone(&meta));
        } else {
            self.metas[index as usize] = Rc::clone(&meta);
        }
        trace!(index, "type meta decoded");
        Ok(meta)
    }

    fn next_index(&self) -> u32 {
        u32::try_from(self.metas.len()).unwrap_or(u32::MAX)
    }

    /// Schemas decoded in this frame.
    pub fn len(&self) -> usize {
        self.metas.len()
    }

    /// Returns `true` if no schema has been decoded.
    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    /// Drop every schema.
    pub fn reset(&mut self) {
        self.metas.clear();
    }
}

/// Write-side MetaString index.
#[derive(Debug, Default)]
pub struct MetaStringWriter {
    indices: FxHashMap<MetaString, u32>,
}

impl MetaStringWriter {
    /// Emit `len << 1`, encoding byte and bytes on first use, or
    /// `(index << 1) | 1` afterwards.
    pub fn write(&mut self, w: &mut Writer, s: &MetaString) -> Result<()> {
        if let Some(&index) = self.indices.get(s) {
            w.write_varuint32((index << 1) | 1);
            return Ok(());
        }
        let index = u32::try_from(self.indices.len())
            .map_err(|_| CodecError::LengthTooLarge(self.indices.len() as u64))?;
        self.indices.insert(s.clone(), index);
        let len = u32::try_from(s.bytes().len())
            .map_err(|_| CodecError::MetaStringTooLong(s.bytes().len()))?;
        w.write_varuint32(len << 1);
        if len > 0 {
            w.write_u8(s.encoding().tag());
            w.write_bytes(s.bytes());
        }
        Ok(())
    }

    /// Forget every index.
    pub fn reset(&mut self) {
        self.indices.clear();
    }
}

/// Read-side MetaString table.
#[derive(Debug, Default)]
pub struct MetaStringReader {
    strings: Vec<MetaString>,
}

impl MetaStringReader {
    /// Read a fresh string or resolve a back-reference.
    pub fn read(&mut self, r: &mut Reader<'_>, decoder: MetaStringDecoder) -> Result<MetaString> {
        let header = r.read_varuint32()?;
        if header & 1 == 1 {
            let index = header >> 1;
            return self
                .strings
                .get(index as usize)
                .cloned()
                .ok_or(CodecError::InvalidMetaStringIndex {
                    index,
                    len: u32::try_from(self.strings.len()).unwrap_or(u32::MAX),
                });
        }
        let len = (header >> 1) as usize;
        let s = if len == 0 {
            decoder.decode(&[], Encoding::Utf8)?
        } else {
            let encoding = Encoding::from_tag(r.read_u8()?)?;
            decoder.decode(r.read_bytes(len)?, encoding)?
        };
        self.strings.push(s.clone());
        Ok(s)
    }

    /// Drop every string.
    pub fn reset(&mut self) {
        self.strings.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::meta::{
        FieldInfo, FieldType, TypeIdentity, NAMESPACE_DECODER, NAMESPACE_ENCODER,
    };
    use crate::types::type_id;

    fn meta_bytes() -> Vec<u8> {
        TypeMeta::new(
            TypeIdentity::Id(type_id::user(1, type_id::COMPATIBLE_STRUCT)),
            vec![FieldInfo::new("x", FieldType::leaf(type_id::INT32))],
        )
        .to_bytes()
        .unwrap()
    }

    #[test]
    fn type_meta_written_once_then_referenced() {
        let encoded = meta_bytes();
        let mut writer = MetaWriter::default();
        let mut w = Writer::default();
        writer.write(&mut w, TypeId::of::<u8>(), &encoded).unwrap();
        writer.write(&mut w, TypeId::of::<u8>(), &encoded).unwrap();
        let bytes = w.into_vec();
        assert_eq!(bytes.len(), 1 + encoded.len() + 1);

        let mut reader = MetaReader::default();
        let mut r = Reader::new(&bytes);
        let first = reader.read(&mut r).unwrap();
        let second = reader.read(&mut r).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn gapped_or_unknown_indices_are_rejected() {
        let mut w = Writer::default();
        w.write_varuint32(2 << 1);
        w.write_bytes(&meta_bytes());
        let bytes = w.into_vec();
        assert_eq!(
            MetaReader::default().read(&mut Reader::new(&bytes)).unwrap_err(),
            CodecError::InvalidMetaIndex { index: 2, next: 0 }
        );

        let back_ref = [0b1u8];
        assert_eq!(
            MetaReader::default()
                .read(&mut Reader::new(&back_ref))
                .unwrap_err(),
            CodecError::InvalidMetaIndex { index: 0, next: 0 }
        );
    }

    #[test]
    fn meta_strings_dedup_within_frame() {
        let ns = NAMESPACE_ENCODER.encode("demo.shop").unwrap();
        let empty = NAMESPACE_ENCODER.encode("").unwrap();
        let mut writer = MetaStringWriter::default();
        let mut w = Writer::default();
        writer.write(&mut w, &ns).unwrap();
        writer.write(&mut w, &empty).unwrap();
        writer.write(&mut w, &ns).unwrap();
        let bytes = w.into_vec();

        let mut reader = MetaStringReader::default();
        let mut r = Reader::new(&bytes);
        assert_eq!(reader.read(&mut r, NAMESPACE_DECODER).unwrap().as_str(), "demo.shop");
        assert_eq!(reader.read(&mut r, NAMESPACE_DECODER).unwrap().as_str(), "");
        assert_eq!(reader.read(&mut r, NAMESPACE_DECODER).unwrap().as_str(), "demo.shop");
        assert_eq!(r.remaining(), 0);
    }
}
