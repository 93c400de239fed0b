// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! echo-xcodec: cross-language binary serialization for Echo.
//!
//! Values travel as self-contained frames: a header byte, then the value
//! with optional reference flags and type info. The codec supports shared
//! and cyclic references (`track_ref`), schema evolution with on-wire
//! struct schemas (`compatible`), compact identifier encoding, dynamically
//! typed slots and user extension types.
//!
//! ```
//! use echo_xcodec::{impl_struct_serializer, Config, Engine};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Pose {
//!     name: String,
//!     joints: Vec<f32>,
//! }
//!
//! impl_struct_serializer!(Pose { name: String, joints: Vec<f32> });
//!
//! let config = Config::builder().compatible(true).build().unwrap();
//! let mut engine = Engine::new(config);
//! engine.register::<Pose>(100).unwrap();
//!
//! let pose = Pose { name: "rest".into(), joints: vec![0.0, 0.5] };
//! let bytes = engine.serialize(&pose).unwrap();
//! assert_eq!(engine.deserialize::<Pose>(&bytes).unwrap(), pose);
//! ```
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]
// Wire widths are fixed by the format; narrowing casts are range-checked at
// the call sites that can overflow.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

pub mod buffer;
mod config;
mod context;
mod engine;
mod error;
pub mod meta;
pub mod resolver;
pub mod serializer;
mod thread_local;
pub mod types;

pub use config::{Config, ConfigBuilder, DEFAULT_MAX_DEPTH};
pub use context::{ReadContext, ReadState, ReadTypeInfo, WriteContext, WriteState};
pub use engine::Engine;
pub use error::{CodecError, Result};
pub use meta::{FieldInfo, FieldType, TypeMeta};
pub use resolver::{TypeInfo, TypeResolver};
pub use serializer::{
    read_compatible_fields, read_field, read_matching_field, read_struct_data, read_union_payload,
    write_field, write_struct_data, write_union_payload, DynValue, EnumSerializer, Ext,
    ExtSerializer, Serializer, Stack, StructSerializer, TypeKind, UnionSerializer, VarInt32,
    VarInt64,
};
pub use thread_local::ThreadLocalEngine;
pub use types::RefMode;
