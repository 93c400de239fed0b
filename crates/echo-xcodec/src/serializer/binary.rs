// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Opaque byte payloads (`BINARY`): varuint length, then the bytes.

use bytes::Bytes;

use crate::context::{ReadContext, WriteContext};
use crate::error::Result;
use crate::resolver::RefSlot;
use crate::serializer::{Serializer, TypeKind};
use crate::types::type_id;

impl Serializer for Bytes {
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::BINARY)
    }

    fn is_canonicalizable_type() -> bool {
        true
    }

    fn default_value() -> Self {
        Self::new()
    }

    fn to_ref_slot(&self) -> Option<RefSlot> {
        Some(RefSlot::new(self.clone()))
    }

    fn from_ref_slot(slot: &RefSlot) -> Option<Self> {
        slot.downcast_ref::<Self>().cloned()
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.writer().write_len_prefixed(self)
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        Ok(Self::copy_from_slice(ctx.reader().read_len_prefixed()?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::Engine;

    #[test]
    fn binary_is_length_prefixed() {
        let mut engine = Engine::default();
        let value = Bytes::from_static(b"\x00\xffxy");
        let bytes = engine.serialize(&value).unwrap();
        assert_eq!(bytes, vec![0x02, 4, 0x00, 0xff, b'x', b'y']);
        assert_eq!(engine.deserialize::<Bytes>(&bytes).unwrap(), value);
    }
}
