// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Type registrations and the per-frame tables that resolve references,
//! schemas and identifier strings.

mod meta_resolver;
mod ref_resolver;
mod type_resolver;

pub use meta_resolver::{MetaReader, MetaStringReader, MetaStringWriter, MetaWriter};
pub use ref_resolver::{CanonicalCache, RefReader, RefSlot, RefWriter};
pub use type_resolver::{TypeInfo, TypeResolver, MAX_USER_ID};
