// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for echo-xcodec.
#![forbid(unsafe_code)]
//!
//! This crate provides the sample models and engine setups used across the
//! codec's integration tests and benchmarks.
//!
//! # Modules
//!
//! - [`engine`] - Engine builder with the common configurations
//! - [`frames`] - Raw frame construction for decoder tests
//! - [`hashes`] - Frame digests
//! - [`models`] - Sample structs, enum, union, cyclic node and ext type

pub mod engine;
pub mod frames;
pub mod hashes;
pub mod models;

pub use engine::EngineTestBuilder;
pub use frames::FrameBuilder;
pub use hashes::frame_digest;
pub use models::{
    ring, sample_person, unlink, Address, Color, Node, PackedRgb, Person, PersonV2, Rgb, Shape,
};
