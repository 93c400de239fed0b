// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier and schema metadata.

pub mod meta_string;
pub mod type_meta;

pub use meta_string::{
    Encoding, MetaString, MetaStringDecoder, MetaStringEncoder, FIELD_NAME_DECODER,
    FIELD_NAME_ENCODER, NAMESPACE_DECODER, NAMESPACE_ENCODER, TYPE_NAME_DECODER,
    TYPE_NAME_ENCODER,
};
pub use type_meta::{struct_hash, FieldInfo, FieldType, TypeIdentity, TypeMeta};
