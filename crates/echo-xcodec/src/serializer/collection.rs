// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared element protocol for lists, sets and maps.
//!
//! A non-empty run of elements is preceded by one header byte:
//!
//! | bit | meaning                                                     |
//! |-----|-------------------------------------------------------------|
//! | 0   | elements are written with full ref tracking                 |
//! | 1   | at least one element is null (elements carry a null flag)   |
//! | 2   | the element type is declared statically                     |
//! | 3   | every element has the same runtime type                     |
//!
//! When the run is homogeneous and the type is not implied by the
//! declaration, its type info is written once after the header instead of
//! once per element.

use crate::config::Config;
use crate::context::{ReadContext, ReadTypeInfo, WriteContext};
use crate::error::{CodecError, Result};
use crate::serializer::{read_value, InfoSource, Serializer, TypeKind};
use crate::types::{collection, RefMode};

/// Encoding decisions for one run of elements, derived from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementPlan {
    header: u8,
}

impl ElementPlan {
    /// Inspect the elements about to be written.
    pub fn for_write<'v, T, I>(config: &Config, elements: I) -> Self
    where
        T: Serializer + 'v,
        I: Iterator<Item = &'v T> + Clone,
    {
        let mut header = 0;
        if config.track_ref() && T::is_reference_trackable_type() {
            header |= collection::TRACKING_REF;
        }
        if T::is_nullable_type() && elements.clone().any(T::is_none) {
            header |= collection::HAS_NULL;
        }
        let declared = T::type_kind() != TypeKind::Dynamic;
        if declared {
            header |= collection::DECL_ELEMENT_TYPE | collection::SAME_TYPE;
        } else {
            let mut present = elements.filter(|e| !e.is_none());
            if let Some(first) = present.next() {
                let ty = first.runtime_type();
                if present.all(|e| e.runtime_type() == ty) {
                    header |= collection::SAME_TYPE;
                }
            }
        }
        Self { header }
    }

    /// Parse a header read from the stream.
    pub fn from_header(header: u8) -> Result<Self> {
        let known = collection::TRACKING_REF
            | collection::HAS_NULL
            | collection::DECL_ELEMENT_TYPE
            | collection::SAME_TYPE;
        if header & !known != 0 {
            return Err(CodecError::InvalidData("unknown collection header bits"));
        }
        Ok(Self { header })
    }

    /// Header byte.
    pub fn header(self) -> u8 {
        self.header
    }

    fn has(self, bit: u8) -> bool {
        self.header & bit != 0
    }

    /// Elements are tracked one by one.
    pub fn tracking(self) -> bool {
        self.has(collection::TRACKING_REF)
    }

    /// Elements carry a null flag.
    pub fn has_null(self) -> bool {
        self.has(collection::HAS_NULL)
    }

    /// The element type is known from the declaration.
    pub fn declared(self) -> bool {
        self.has(collection::DECL_ELEMENT_TYPE)
    }

    /// All elements share one runtime type.
    pub fn same_type(self) -> bool {
        self.has(collection::SAME_TYPE)
    }

    /// Ref mode applied to every element.
    pub fn ref_mode(self) -> RefMode {
        if self.tracking() {
            RefMode::Tracking
        } else if self.has_null() {
            RefMode::NullOnly
        } else {
            RefMode::None
        }
    }

    /// Whether one shared type info follows the header.
    pub fn shared_type_info<T: Serializer>(self, config: &Config) -> bool {
        self.same_type() && (!self.declared() || T::requires_type_info(config))
    }

    /// Whether each element carries its own type info.
    pub fn per_element_type_info(self) -> bool {
        !self.same_type()
    }

    /// Whether decoded elements go through the canonical cache.
    pub fn canonicalize<T: Serializer>(self, config: &Config) -> bool {
        !self.tracking()
            && config.track_ref()
            && config.canonicalize()
            && T::is_canonicalizable_type()
    }
}

/// Write the header and the shared type info of a non-empty run.
pub fn write_plan<'v, T, I>(ctx: &mut WriteContext<'_>, elements: I) -> Result<ElementPlan>
where
    T: Serializer + 'v,
    I: Iterator<Item = &'v T> + Clone,
{
    let plan = ElementPlan::for_write(ctx.config(), elements.clone());
    ctx.writer().write_u8(plan.header());
    write_shared_type_info(ctx, plan, elements)?;
    Ok(plan)
}

/// Write the type info shared by a homogeneous run, if `plan` calls for it.
pub fn write_shared_type_info<'v, T, I>(ctx: &mut WriteContext<'_>, plan: ElementPlan, elements: I) -> Result<()>
where
    T: Serializer + 'v,
    I: Iterator<Item = &'v T>,
{
    if !plan.shared_type_info::<T>(ctx.config()) {
        return Ok(());
    }
    let mut present = elements.filter(|e| !e.is_none());
    match present.next() {
        Some(first) => first.write_type_info(ctx),
        None => ctx.write_static_type_info::<T>(),
    }
}

/// Read the header and the shared type info of a non-empty run.
pub fn read_plan<T: Serializer>(ctx: &mut ReadContext<'_>) -> Result<(ElementPlan, Option<ReadTypeInfo>)> {
    let plan = ElementPlan::from_header(ctx.reader().read_u8()?)?;
    let info = read_shared_type_info::<T>(ctx, plan)?;
    Ok((plan, info))
}

/// Read the type info shared by a homogeneous run, if `plan` calls for it.
pub fn read_shared_type_info<T: Serializer>(
    ctx: &mut ReadContext<'_>,
    plan: ElementPlan,
) -> Result<Option<ReadTypeInfo>> {
    if plan.shared_type_info::<T>(ctx.config()) {
        T::read_type_info(ctx).map(Some)
    } else {
        Ok(None)
    }
}

/// Write one element under `plan`.
pub fn write_element<T: Serializer>(ctx: &mut WriteContext<'_>, plan: ElementPlan, value: &T) -> Result<()> {
    value.write(ctx, plan.ref_mode(), plan.per_element_type_info())
}

/// Read one element under `plan`.
pub fn read_element<T: Serializer>(
    ctx: &mut ReadContext<'_>,
    plan: ElementPlan,
    info: Option<&ReadTypeInfo>,
) -> Result<T> {
    let start = ctx.reader().position();
    let source = match info {
        Some(info) => InfoSource::Known(info),
        None if plan.per_element_type_info() => InfoSource::Inline,
        None => InfoSource::Absent,
    };
    let value: T = read_value(ctx, plan.ref_mode(), source)?;
    if plan.canonicalize::<T>(ctx.config()) && !value.is_none() {
        return Ok(ctx.canonicalize(value, start));
    }
    Ok(value)
}

/// Write `count`, then (for a non-empty run) the header and the elements.
pub fn write_elements<'v, T, I>(ctx: &mut WriteContext<'_>, elements: I) -> Result<()>
where
    T: Serializer + 'v,
    I: ExactSizeIterator<Item = &'v T> + Clone,
{
    let count = elements.len();
    let count = u32::try_from(count).map_err(|_| CodecError::LengthTooLarge(count as u64))?;
    ctx.writer().write_varuint32(count);
    if count == 0 {
        return Ok(());
    }
    let plan = write_plan(ctx, elements.clone())?;
    for value in elements {
        write_element(ctx, plan, value)?;
    }
    Ok(())
}

/// Read a run written by [`write_elements`].
pub fn read_elements<T: Serializer>(ctx: &mut ReadContext<'_>) -> Result<Vec<T>> {
    let count = ctx.reader().read_varuint32()? as usize;
    if count == 0 {
        return Ok(Vec::new());
    }
    let (plan, info) = read_plan::<T>(ctx)?;
    let mut out = Vec::with_capacity(count.min(ctx.reader().remaining()));
    for _ in 0..count {
        out.push(read_element(ctx, plan, info.as_ref())?);
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{Config, Engine};

    // ── 1. Header bits ────────────────────────────────────────────────

    #[test]
    fn declared_homogeneous_list_is_compact() {
        let mut engine = Engine::default();
        let bytes = engine.serialize(&vec![1i32, 2, 3]).unwrap();
        assert_eq!(bytes.len(), 15);
        assert_eq!(&bytes[..3], &[0x02, 3, 0x0c]);
        assert_eq!(&bytes[3..7], &[1, 0, 0, 0]);
        assert_eq!(engine.deserialize::<Vec<i32>>(&bytes).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn nulls_and_tracking_set_their_bits() {
        let config = Config::default();
        let values = [Some(1u8), None];
        let plan = ElementPlan::for_write(&config, values.iter());
        assert!(plan.has_null() && plan.declared() && plan.same_type());
        assert_eq!(plan.ref_mode(), RefMode::NullOnly);

        let tracking = Config::builder().track_ref(true).build().unwrap();
        let shared = [Rc::new(1u8)];
        let plan = ElementPlan::for_write(&tracking, shared.iter());
        assert!(plan.tracking());
        assert_eq!(plan.ref_mode(), RefMode::Tracking);
        assert!(!plan.canonicalize::<Rc<u8>>(&tracking));

        let text: [Rc<str>; 1] = [Rc::from("a")];
        let plan = ElementPlan::for_write(&tracking, text.iter());
        assert!(!plan.tracking());
        assert!(plan.canonicalize::<Rc<str>>(&tracking));
    }

    #[test]
    fn unknown_header_bits_are_rejected() {
        assert!(ElementPlan::from_header(0x10).is_err());
        assert_eq!(ElementPlan::from_header(0x0c).unwrap().ref_mode(), RefMode::None);
    }

    // ── 2. Canonicalization ───────────────────────────────────────────

    #[test]
    fn equal_immutable_elements_share_one_instance_under_tracking() {
        let values: Vec<Rc<str>> = vec![Rc::from("dup"), Rc::from("dup"), Rc::from("solo")];
        let mut engine = Engine::new(Config::builder().track_ref(true).build().unwrap());
        let bytes = engine.serialize(&values).unwrap();
        let back = engine.deserialize::<Vec<Rc<str>>>(&bytes).unwrap();
        assert!(Rc::ptr_eq(&back[0], &back[1]));
        assert!(!Rc::ptr_eq(&back[0], &back[2]));

        let mut plain = Engine::default();
        let bytes = plain.serialize(&values).unwrap();
        let back = plain.deserialize::<Vec<Rc<str>>>(&bytes).unwrap();
        assert_eq!(back[0], back[1]);
        assert!(!Rc::ptr_eq(&back[0], &back[1]));
    }

    #[test]
    fn canonicalization_can_be_switched_off() {
        let values: Vec<Rc<str>> = vec![Rc::from("dup"), Rc::from("dup")];
        let config = Config::builder()
            .track_ref(true)
            .canonicalize(false)
            .build()
            .unwrap();
        let mut engine = Engine::new(config);
        let bytes = engine.serialize(&values).unwrap();
        let back = engine.deserialize::<Vec<Rc<str>>>(&bytes).unwrap();
        assert!(!Rc::ptr_eq(&back[0], &back[1]));
    }

    #[test]
    fn huge_count_does_not_preallocate() {
        let mut engine = Engine::default();
        let bytes = [0x02, 0xff, 0xff, 0xff, 0xff, 0x0f, 0x0c];
        assert!(matches!(
            engine.deserialize::<Vec<i32>>(&bytes),
            Err(CodecError::Truncated { .. })
        ));
    }
}
