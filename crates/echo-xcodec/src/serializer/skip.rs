// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Consuming values the reader has no slot for.
//!
//! Compatible-mode readers skip remote fields they do not know. The walk is
//! driven by the remote [`FieldType`], by type info found in the stream, or
//! by a locally registered codec when the stream carries nothing else.
//! Values whose layout cannot be derived from any of those fail with
//! [`CodecError::UnsupportedSkip`].

use crate::context::{ReadContext, ReadTypeInfo};
use crate::error::{CodecError, Result};
use crate::meta::FieldType;
use crate::serializer::collection::ElementPlan;
use crate::serializer::DynValue;
use crate::types::{type_id, RefFlag, RefMode};

/// How the type of a skipped value is known.
#[derive(Debug)]
enum Shape<'t> {
    Declared(&'t FieldType),
    Inline,
    Known(ReadTypeInfo),
}

/// Skip one field value described by `field_type`.
pub fn skip_field(ctx: &mut ReadContext<'_>, field_type: &FieldType) -> Result<()> {
    let mode = RefMode::for_slot(field_type.nullable, field_type.tracking);
    let shape = if field_type.carries_type_info(ctx.config().compatible()) {
        Shape::Inline
    } else {
        Shape::Declared(field_type)
    };
    skip_value(ctx, mode, &shape)
}

fn skip_value(ctx: &mut ReadContext<'_>, mode: RefMode, shape: &Shape<'_>) -> Result<()> {
    if mode == RefMode::None {
        return skip_body(ctx, shape, false).map(drop);
    }
    let raw = ctx.reader().read_i8()?;
    match RefFlag::from_i8(raw)? {
        RefFlag::Null => Ok(()),
        RefFlag::NotNullValue => skip_body(ctx, shape, false).map(drop),
        // the target may be an ancestor still pending; only the id is consumed
        RefFlag::Ref if mode == RefMode::Tracking => ctx.reader().read_varuint32().map(drop),
        // later fields may point back at this value, so a locally known
        // type is decoded and kept in its slot
        RefFlag::RefValue if mode == RefMode::Tracking => {
            let id = ctx.refs().begin()?;
            let kept = skip_body(ctx, shape, true)?;
            ctx.bind_skipped(id, kept)
        }
        RefFlag::Ref | RefFlag::RefValue => Err(CodecError::InvalidRefFlag(raw)),
    }
}

/// Consume one payload. With `keep`, a value whose type resolves to a local
/// registration is decoded and returned instead of discarded.
fn skip_body(ctx: &mut ReadContext<'_>, shape: &Shape<'_>, keep: bool) -> Result<Option<DynValue>> {
    ctx.enter()?;
    let kept = match shape {
        Shape::Declared(field_type) if keep && type_id::generic_arity(field_type.type_id) == 0 => {
            let info = ReadTypeInfo::declared(ctx.resolver(), field_type.type_id);
            skip_typed(ctx, &info, keep)?
        }
        Shape::Declared(field_type) => {
            skip_payload(ctx, field_type.type_id, &field_type.generics)?;
            None
        }
        Shape::Inline => {
            let info = ctx.read_type_info()?;
            skip_typed(ctx, &info, keep)?
        }
        Shape::Known(info) => skip_typed(ctx, info, keep)?,
    };
    ctx.leave();
    Ok(kept)
}

fn skip_typed(ctx: &mut ReadContext<'_>, info: &ReadTypeInfo, keep: bool) -> Result<Option<DynValue>> {
    if keep {
        if let Ok(local) = info.local() {
            return local.read_any(ctx, info).map(Some);
        }
    }
    if let Some(meta) = info.type_meta().cloned() {
        for field in meta.fields() {
            skip_field(ctx, field.field_type())?;
        }
        return Ok(None);
    }
    let kind = info.kind();
    if type_id::is_struct(kind) || matches!(kind, type_id::EXT | type_id::NAMED_EXT) {
        let local = info.local().map_err(|_| CodecError::UnsupportedSkip(kind))?;
        return local.read_any(ctx, info).map(|_| None);
    }
    skip_payload(ctx, kind, &[]).map(|()| None)
}

fn skip_payload(ctx: &mut ReadContext<'_>, kind: u32, generics: &[FieldType]) -> Result<()> {
    let r = ctx.reader();
    match kind {
        type_id::NONE => Ok(()),
        type_id::BOOL | type_id::INT8 | type_id::UINT8 => r.read_bytes(1).map(drop),
        type_id::INT16 | type_id::UINT16 | type_id::FLOAT16 => r.read_bytes(2).map(drop),
        type_id::INT32 | type_id::UINT32 | type_id::FLOAT32 | type_id::DATE => r.read_bytes(4).map(drop),
        type_id::INT64 | type_id::UINT64 | type_id::FLOAT64 | type_id::TIMESTAMP => {
            r.read_bytes(8).map(drop)
        }
        type_id::VARINT32 => r.read_varint32().map(drop),
        type_id::VARINT64 => r.read_varint64().map(drop),
        type_id::DURATION => {
            r.read_varint64()?;
            r.read_bytes(4).map(drop)
        }
        type_id::STRING => {
            let header = r.read_varuint64()?;
            let len = usize::try_from(header >> 2).map_err(|_| CodecError::LengthTooLarge(header >> 2))?;
            r.read_bytes(len).map(drop)
        }
        type_id::BINARY
        | type_id::BOOL_ARRAY
        | type_id::INT8_ARRAY
        | type_id::INT16_ARRAY
        | type_id::INT32_ARRAY
        | type_id::INT64_ARRAY
        | type_id::FLOAT32_ARRAY
        | type_id::FLOAT64_ARRAY => r.read_len_prefixed().map(drop),
        type_id::ENUM | type_id::NAMED_ENUM => r.read_varuint32().map(drop),
        type_id::UNION | type_id::TYPED_UNION | type_id::NAMED_UNION => {
            r.read_varuint32()?;
            skip_value(ctx, RefMode::NullOnly, &Shape::Inline)
        }
        type_id::LIST | type_id::SET => skip_elements(ctx, generics.first()),
        type_id::MAP => skip_entries(ctx, generics.first(), generics.get(1)),
        other => Err(CodecError::UnsupportedSkip(other)),
    }
}

/// Read the element header and shared type info of a run and decide how
/// each element's type is known.
fn run_shape<'t>(
    ctx: &mut ReadContext<'_>,
    plan: ElementPlan,
    declared: Option<&'t FieldType>,
) -> Result<Shape<'t>> {
    if plan.per_element_type_info() {
        return Ok(Shape::Inline);
    }
    if !plan.declared() {
        return Ok(Shape::Known(ctx.read_type_info()?));
    }
    let declared = declared.ok_or(CodecError::UnsupportedSkip(type_id::UNKNOWN))?;
    if declared.carries_type_info(ctx.config().compatible()) {
        Ok(Shape::Known(ctx.read_type_info()?))
    } else {
        Ok(Shape::Declared(declared))
    }
}

fn skip_elements(ctx: &mut ReadContext<'_>, element: Option<&FieldType>) -> Result<()> {
    let count = ctx.reader().read_varuint32()?;
    if count == 0 {
        return Ok(());
    }
    let plan = ElementPlan::from_header(ctx.reader().read_u8()?)?;
    let shape = run_shape(ctx, plan, element)?;
    for _ in 0..count {
        skip_value(ctx, plan.ref_mode(), &shape)?;
    }
    Ok(())
}

fn skip_entries(ctx: &mut ReadContext<'_>, key: Option<&FieldType>, value: Option<&FieldType>) -> Result<()> {
    let count = ctx.reader().read_varuint32()?;
    if count == 0 {
        return Ok(());
    }
    let key_plan = ElementPlan::from_header(ctx.reader().read_u8()?)?;
    let value_plan = ElementPlan::from_header(ctx.reader().read_u8()?)?;
    let key_shape = run_shape(ctx, key_plan, key)?;
    let value_shape = run_shape(ctx, value_plan, value)?;
    for _ in 0..count {
        skip_value(ctx, key_plan.ref_mode(), &key_shape)?;
        skip_value(ctx, value_plan.ref_mode(), &value_shape)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;
    use std::rc::Rc;

    use chrono::{NaiveDate, TimeDelta};

    use super::*;
    use crate::buffer::Reader;
    use crate::context::ReadState;
    use crate::resolver::TypeResolver;
    use crate::serializer::{DynValue, EnumSerializer, UnionSerializer};
    use crate::{impl_enum_serializer, impl_struct_serializer, impl_union_serializer, Config, Engine};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Inner {
        label: String,
        weight: f32,
    }

    impl_struct_serializer!(Inner { label: String, weight: f32 });

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    enum Level {
        #[default]
        Low,
        High,
    }

    impl EnumSerializer for Level {
        fn ordinal(&self) -> u32 {
            *self as u32
        }

        fn from_ordinal(ordinal: u32) -> Option<Self> {
            match ordinal {
                0 => Some(Self::Low),
                1 => Some(Self::High),
                _ => None,
            }
        }
    }

    impl_enum_serializer!(Level);

    #[derive(Debug, Clone, PartialEq)]
    enum Payload {
        Count(i32),
        Text(String),
    }

    impl Default for Payload {
        fn default() -> Self {
            Self::Count(0)
        }
    }

    impl UnionSerializer for Payload {
        fn case_index(&self) -> u32 {
            match self {
                Self::Count(_) => 0,
                Self::Text(_) => 1,
            }
        }

        fn write_case(&self, ctx: &mut crate::WriteContext<'_>) -> Result<()> {
            match self {
                Self::Count(v) => crate::write_union_payload(ctx, v),
                Self::Text(v) => crate::write_union_payload(ctx, v),
            }
        }

        fn read_case(ctx: &mut ReadContext<'_>, index: u32) -> Result<Self> {
            match index {
                0 => crate::read_union_payload(ctx).map(Self::Count),
                1 => crate::read_union_payload(ctx).map(Self::Text),
                _ => Err(crate::serializer::union::invalid_case::<Self>(index)),
            }
        }
    }

    impl_union_serializer!(Payload);

    #[derive(Debug, Default, Clone)]
    struct Wide {
        id: i64,
        tags: Vec<String>,
        scores: HashMap<String, i32>,
        inner: Inner,
        inners: Vec<Inner>,
        loose: Vec<DynValue>,
        level: Level,
        payload: Payload,
        gap: TimeDelta,
        day: NaiveDate,
        samples: Box<[f32]>,
        maybe: Option<String>,
        tail: String,
    }

    impl_struct_serializer!(Wide {
        id: i64,
        tags: Vec<String>,
        scores: HashMap<String, i32>,
        inner: Inner,
        inners: Vec<Inner>,
        loose: Vec<DynValue>,
        level: Level,
        payload: Payload,
        gap: TimeDelta,
        day: NaiveDate,
        samples: Box<[f32]>,
        maybe: Option<String>,
        tail: String,
    });

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Narrow {
        id: i64,
        tail: String,
    }

    impl_struct_serializer!(Narrow { id: i64, tail: String });

    fn compatible(track_ref: bool) -> Config {
        Config::builder()
            .compatible(true)
            .track_ref(track_ref)
            .build()
            .unwrap()
    }

    fn wide() -> Wide {
        let inner = Inner {
            label: "core".into(),
            weight: 0.5,
        };
        Wide {
            id: 42,
            tags: vec!["a".into(), "bb".into()],
            scores: [("x".to_owned(), 1)].into_iter().collect(),
            inner: inner.clone(),
            inners: vec![inner.clone(), inner],
            loose: vec![Rc::new(3i32) as DynValue, Rc::new(String::from("three")) as DynValue],
            level: Level::High,
            payload: Payload::Text("p".into()),
            gap: TimeDelta::milliseconds(-1_500),
            day: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            samples: vec![1.0, 2.0].into_boxed_slice(),
            maybe: None,
            tail: "end".into(),
        }
    }

    fn register_all(engine: &mut Engine) {
        engine.register::<Inner>(2).unwrap();
        engine.register::<Level>(3).unwrap();
        engine.register::<Payload>(4).unwrap();
    }

    // ── 1. Every wire kind is skippable ───────────────────────────────

    #[test]
    fn reader_skips_unknown_fields_of_every_kind() {
        let mut writer = Engine::new(compatible(false));
        register_all(&mut writer);
        writer.register::<Wide>(1).unwrap();
        let bytes = writer.serialize(&wide()).unwrap();

        let mut reader = Engine::new(compatible(false));
        register_all(&mut reader);
        reader.register::<Narrow>(1).unwrap();
        let back = reader.deserialize::<Narrow>(&bytes).unwrap();
        assert_eq!(
            back,
            Narrow {
                id: 42,
                tail: "end".into(),
            }
        );
    }

    #[test]
    fn unknown_nested_struct_is_skipped_through_its_schema() {
        let mut writer = Engine::new(compatible(false));
        register_all(&mut writer);
        writer.register::<Wide>(1).unwrap();
        let bytes = writer.serialize(&wide()).unwrap();

        // the reader never registered Inner, Level or Payload
        let mut reader = Engine::new(compatible(false));
        reader.register::<Narrow>(1).unwrap();
        let back = reader.deserialize::<Narrow>(&bytes).unwrap();
        assert_eq!(back.tail, "end");
    }

    // ── 2. Tracked values ─────────────────────────────────────────────

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Pair {
        first: Rc<String>,
        second: Rc<String>,
    }

    impl_struct_serializer!(Pair { first: Rc<String>, second: Rc<String> });

    #[derive(Debug, Default, Clone, PartialEq)]
    struct FirstOnly {
        first: Rc<String>,
    }

    impl_struct_serializer!(FirstOnly { first: Rc<String> });

    #[test]
    fn skipped_back_reference_consumes_only_its_id() {
        let shared = Rc::new(String::from("shared"));
        let pair = Pair {
            first: Rc::clone(&shared),
            second: shared,
        };
        let mut writer = Engine::new(compatible(true));
        writer.register::<Pair>(1).unwrap();
        let bytes = writer.serialize(&pair).unwrap();

        let mut reader = Engine::new(compatible(true));
        reader.register::<FirstOnly>(1).unwrap();
        let back = reader.deserialize::<FirstOnly>(&bytes).unwrap();
        assert_eq!(back.first.as_str(), "shared");
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct SecondOnly {
        second: Rc<String>,
    }

    impl_struct_serializer!(SecondOnly { second: Rc<String> });

    #[test]
    fn skipped_identity_stays_resolvable() {
        let shared = Rc::new(String::from("shared"));
        let pair = Pair {
            first: Rc::clone(&shared),
            second: shared,
        };
        let mut writer = Engine::new(compatible(true));
        writer.register::<Pair>(1).unwrap();
        let bytes = writer.serialize(&pair).unwrap();

        let mut reader = Engine::new(compatible(true));
        reader.register::<SecondOnly>(1).unwrap();
        let back = reader.deserialize::<SecondOnly>(&bytes).unwrap();
        assert_eq!(back.second.as_str(), "shared");
    }

    // ── 3. Unsupported layouts ────────────────────────────────────────

    #[test]
    fn ext_field_without_local_codec_cannot_be_skipped() {
        let config = compatible(false);
        let resolver = TypeResolver::new(&config);
        let mut state = ReadState::default();
        let bytes = [1u8, 2, 3];
        let mut ctx = ReadContext::new(&config, &resolver, Reader::new(&bytes), &mut state);
        assert_eq!(
            skip_field(&mut ctx, &FieldType::leaf(type_id::EXT)),
            Err(CodecError::UnsupportedSkip(type_id::EXT))
        );
    }

    #[test]
    fn declared_list_without_element_type_cannot_be_skipped() {
        let config = compatible(false);
        let resolver = TypeResolver::new(&config);
        let mut state = ReadState::default();
        // count 1, header DECL_ELEMENT_TYPE | SAME_TYPE, one i32
        let bytes = [1u8, 0x0c, 7, 0, 0, 0];
        let mut ctx = ReadContext::new(&config, &resolver, Reader::new(&bytes), &mut state);
        assert_eq!(
            skip_field(&mut ctx, &FieldType::leaf(type_id::LIST)),
            Err(CodecError::UnsupportedSkip(type_id::UNKNOWN))
        );
    }

    #[test]
    fn declared_list_with_element_type_is_skipped() {
        let config = compatible(false);
        let resolver = TypeResolver::new(&config);
        let mut state = ReadState::default();
        let bytes = [2u8, 0x0c, 7, 0, 0, 0, 8, 0, 0, 0];
        let mut ctx = ReadContext::new(&config, &resolver, Reader::new(&bytes), &mut state);
        let list = FieldType::with_generics(type_id::LIST, vec![FieldType::leaf(type_id::INT32)]);
        skip_field(&mut ctx, &list).unwrap();
        assert_eq!(ctx.reader().remaining(), 0);
    }
}
