// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Unordered unique elements (`SET`).

use std::collections::{BTreeSet, HashSet};
use std::hash::{BuildHasher, Hash};

use crate::config::Config;
use crate::context::{ReadContext, WriteContext};
use crate::error::Result;
use crate::meta::FieldType;
use crate::resolver::TypeResolver;
use crate::serializer::collection::{read_elements, write_elements};
use crate::serializer::{Serializer, TypeKind};
use crate::types::type_id;

fn set_field_type<T: Serializer>(resolver: &TypeResolver, config: &Config) -> Result<FieldType> {
    Ok(FieldType::with_generics(
        type_id::SET,
        vec![T::field_type(resolver, config)?],
    ))
}

impl<T, S> Serializer for HashSet<T, S>
where
    T: Serializer + Eq + Hash,
    S: BuildHasher + Default + 'static,
{
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::SET)
    }

    fn default_value() -> Self {
        Self::default()
    }

    fn field_type(resolver: &TypeResolver, config: &Config) -> Result<FieldType> {
        set_field_type::<T>(resolver, config)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        write_elements(ctx, self.iter())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        Ok(read_elements::<T>(ctx)?.into_iter().collect())
    }
}

impl<T: Serializer + Ord> Serializer for BTreeSet<T> {
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::SET)
    }

    fn default_value() -> Self {
        Self::new()
    }

    fn field_type(resolver: &TypeResolver, config: &Config) -> Result<FieldType> {
        set_field_type::<T>(resolver, config)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        write_elements(ctx, self.iter())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        Ok(read_elements::<T>(ctx)?.into_iter().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::Engine;
    use rustc_hash::FxHashSet;

    #[test]
    fn sets_round_trip_with_any_hasher() {
        let mut engine = Engine::default();
        let ordered: BTreeSet<String> = ["b", "a", "c"].into_iter().map(String::from).collect();
        let bytes = engine.serialize(&ordered).unwrap();
        assert_eq!(engine.deserialize::<BTreeSet<String>>(&bytes).unwrap(), ordered);

        let hashed: FxHashSet<i64> = [-1, 0, 1 << 40].into_iter().collect();
        let bytes = engine.serialize(&hashed).unwrap();
        assert_eq!(engine.deserialize::<FxHashSet<i64>>(&bytes).unwrap(), hashed);
        let std_set = engine.deserialize::<HashSet<i64>>(&bytes).unwrap();
        assert_eq!(std_set.len(), 3);
    }
}
