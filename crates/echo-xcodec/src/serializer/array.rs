// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Packed primitive arrays: varuint byte length, then the elements
//! little-endian with no per-element header.

use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, Result};
use crate::serializer::{Serializer, TypeKind};
use crate::types::type_id;

macro_rules! packed_array {
    ($($elem:ty => $id:expr;)*) => {
        $(
            impl Serializer for Box<[$elem]> {
                fn type_kind() -> TypeKind {
                    TypeKind::Builtin($id)
                }

                fn default_value() -> Self {
                    Box::default()
                }

                fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
                    let byte_len = self.len() * std::mem::size_of::<$elem>();
                    let byte_len = u32::try_from(byte_len)
                        .map_err(|_| CodecError::LengthTooLarge(byte_len as u64))?;
                    let w = ctx.writer();
                    w.write_varuint32(byte_len);
                    for value in self.iter() {
                        w.write_bytes(&value.to_le_bytes());
                    }
                    Ok(())
                }

                fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
                    const WIDTH: usize = std::mem::size_of::<$elem>();
                    let bytes = ctx.reader().read_len_prefixed()?;
                    if bytes.len() % WIDTH != 0 {
                        return Err(CodecError::InvalidData("array byte length is not a multiple of the element width"));
                    }
                    Ok(bytes
                        .chunks_exact(WIDTH)
                        .map(|chunk| {
                            let mut raw = [0u8; WIDTH];
                            raw.copy_from_slice(chunk);
                            <$elem>::from_le_bytes(raw)
                        })
                        .collect())
                }
            }
        )*
    };
}

packed_array! {
    i8 => type_id::INT8_ARRAY;
    i16 => type_id::INT16_ARRAY;
    i32 => type_id::INT32_ARRAY;
    i64 => type_id::INT64_ARRAY;
    f32 => type_id::FLOAT32_ARRAY;
    f64 => type_id::FLOAT64_ARRAY;
}

impl Serializer for Box<[bool]> {
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::BOOL_ARRAY)
    }

    fn default_value() -> Self {
        Box::default()
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        let bytes: Vec<u8> = self.iter().map(|b| u8::from(*b)).collect();
        ctx.writer().write_len_prefixed(&bytes)
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        Ok(ctx.reader().read_len_prefixed()?.iter().map(|b| *b != 0).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::Engine;

    #[test]
    fn arrays_are_packed() {
        let mut engine = Engine::default();
        let values: Box<[i16]> = vec![1, -1, 256].into_boxed_slice();
        let bytes = engine.serialize(&values).unwrap();
        assert_eq!(bytes, vec![0x02, 6, 1, 0, 0xff, 0xff, 0, 1]);
        assert_eq!(engine.deserialize::<Box<[i16]>>(&bytes).unwrap(), values);

        let flags: Box<[bool]> = vec![true, false, true].into_boxed_slice();
        let bytes = engine.serialize(&flags).unwrap();
        assert_eq!(engine.deserialize::<Box<[bool]>>(&bytes).unwrap(), flags);
    }

    #[test]
    fn ragged_byte_length_is_rejected() {
        let mut engine = Engine::default();
        assert!(matches!(
            engine.deserialize::<Box<[i32]>>(&[0x02, 3, 1, 2, 3]),
            Err(CodecError::InvalidData(_))
        ));
    }
}
