// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Key/value maps (`MAP`).
//!
//! Layout: varuint count; for a non-empty map a key header byte and a value
//! header byte (collection bits), the shared key then value type info when
//! the headers call for it, then the entries as key, value.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use crate::config::Config;
use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, Result};
use crate::meta::FieldType;
use crate::resolver::TypeResolver;
use crate::serializer::collection::{
    read_element, read_shared_type_info, write_element, write_shared_type_info, ElementPlan,
};
use crate::serializer::{Serializer, TypeKind};
use crate::types::type_id;

/// Write a run of entries.
pub fn write_entries<'v, K, V, I>(ctx: &mut WriteContext<'_>, entries: I) -> Result<()>
where
    K: Serializer + 'v,
    V: Serializer + 'v,
    I: ExactSizeIterator<Item = (&'v K, &'v V)> + Clone,
{
    let count = entries.len();
    let count = u32::try_from(count).map_err(|_| CodecError::LengthTooLarge(count as u64))?;
    ctx.writer().write_varuint32(count);
    if count == 0 {
        return Ok(());
    }
    let keys = entries.clone().map(|(k, _)| k);
    let values = entries.clone().map(|(_, v)| v);
    let key_plan = ElementPlan::for_write(ctx.config(), keys.clone());
    let value_plan = ElementPlan::for_write(ctx.config(), values.clone());
    ctx.writer().write_u8(key_plan.header());
    ctx.writer().write_u8(value_plan.header());
    write_shared_type_info(ctx, key_plan, keys)?;
    write_shared_type_info(ctx, value_plan, values)?;
    for (key, value) in entries {
        write_element(ctx, key_plan, key)?;
        write_element(ctx, value_plan, value)?;
    }
    Ok(())
}

/// Read a run written by [`write_entries`], handing each entry to `insert`.
pub fn read_entries<K: Serializer, V: Serializer>(
    ctx: &mut ReadContext<'_>,
    mut insert: impl FnMut(K, V),
) -> Result<()> {
    let count = ctx.reader().read_varuint32()?;
    if count == 0 {
        return Ok(());
    }
    let key_plan = ElementPlan::from_header(ctx.reader().read_u8()?)?;
    let value_plan = ElementPlan::from_header(ctx.reader().read_u8()?)?;
    let key_info = read_shared_type_info::<K>(ctx, key_plan)?;
    let value_info = read_shared_type_info::<V>(ctx, value_plan)?;
    for _ in 0..count {
        let key = read_element(ctx, key_plan, key_info.as_ref())?;
        let value = read_element(ctx, value_plan, value_info.as_ref())?;
        insert(key, value);
    }
    Ok(())
}

fn map_field_type<K: Serializer, V: Serializer>(resolver: &TypeResolver, config: &Config) -> Result<FieldType> {
    Ok(FieldType::with_generics(
        type_id::MAP,
        vec![K::field_type(resolver, config)?, V::field_type(resolver, config)?],
    ))
}

impl<K, V, S> Serializer for HashMap<K, V, S>
where
    K: Serializer + Eq + Hash,
    V: Serializer,
    S: BuildHasher + Default + 'static,
{
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::MAP)
    }

    fn default_value() -> Self {
        Self::default()
    }

    fn field_type(resolver: &TypeResolver, config: &Config) -> Result<FieldType> {
        map_field_type::<K, V>(resolver, config)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        write_entries(ctx, self.iter())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let mut map = Self::default();
        read_entries(ctx, |k, v| {
            map.insert(k, v);
        })?;
        Ok(map)
    }
}

impl<K: Serializer + Ord, V: Serializer> Serializer for BTreeMap<K, V> {
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::MAP)
    }

    fn default_value() -> Self {
        Self::new()
    }

    fn field_type(resolver: &TypeResolver, config: &Config) -> Result<FieldType> {
        map_field_type::<K, V>(resolver, config)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        write_entries(ctx, self.iter())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let mut map = Self::new();
        read_entries(ctx, |k, v| {
            map.insert(k, v);
        })?;
        Ok(map)
    }
}
