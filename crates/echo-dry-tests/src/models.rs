// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sample user types with hand-written codecs.
//!
//! These stand in for generated code: structs go through
//! [`impl_struct_serializer!`], enums and unions implement their mapping
//! traits by hand, and [`Rgb`] is a foreign type carried by an ext codec.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use echo_xcodec::serializer::union::invalid_case;
use echo_xcodec::{
    impl_enum_serializer, impl_struct_serializer, impl_union_serializer, read_union_payload,
    write_union_payload, CodecError, EnumSerializer, ExtSerializer, ReadContext, UnionSerializer,
    WriteContext,
};

/// User id of [`Address`].
pub const ADDRESS_ID: u32 = 100;
/// User id of [`Person`] and of its evolved form [`PersonV2`].
pub const PERSON_ID: u32 = 101;
/// User id of [`Color`].
pub const COLOR_ID: u32 = 102;
/// User id of [`Shape`].
pub const SHAPE_ID: u32 = 103;
/// User id of [`Node`].
pub const NODE_ID: u32 = 104;
/// User id of the [`Rgb`] ext codec.
pub const RGB_ID: u32 = 105;

/// Namespace used by name-based registrations.
pub const NAMESPACE: &str = "echo.test";

/// Postal address.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Address {
    /// Street line.
    pub street: String,
    /// City.
    pub city: String,
    /// Optional postal code.
    pub zip: Option<String>,
}

impl_struct_serializer!(Address {
    street: String,
    city: String,
    zip: Option<String>,
});

/// A fieldless enum.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Ordinal 0.
    #[default]
    Red,
    /// Ordinal 1.
    Green,
    /// Ordinal 2.
    Blue,
}

impl EnumSerializer for Color {
    fn ordinal(&self) -> u32 {
        *self as u32
    }

    fn from_ordinal(ordinal: u32) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Red),
            1 => Some(Self::Green),
            2 => Some(Self::Blue),
            _ => None,
        }
    }
}

impl_enum_serializer!(Color);

/// The schema-evolution baseline.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Person {
    /// Display name.
    pub name: String,
    /// Age in years.
    pub age: i32,
    /// Contact address, absent when unknown.
    pub email: Option<String>,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Home address.
    pub address: Address,
    /// Preferred color.
    pub favorite: Color,
    /// Named scores.
    pub scores: BTreeMap<String, f64>,
}

impl_struct_serializer!(Person {
    name: String,
    age: i32,
    email: Option<String>,
    tags: Vec<String>,
    address: Address,
    favorite: Color,
    scores: BTreeMap<String, f64>,
});

/// A later revision of [`Person`]: `email` and `tags` were dropped,
/// `nickname` and `active` were added, `age` widened to `i64`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PersonV2 {
    /// Display name.
    pub name: String,
    /// Age in years, now 64-bit.
    pub age: i64,
    /// Home address.
    pub address: Address,
    /// New optional field.
    pub nickname: Option<String>,
    /// Preferred color.
    pub favorite: Color,
    /// New flag.
    pub active: bool,
    /// Named scores.
    pub scores: BTreeMap<String, f64>,
}

impl_struct_serializer!(PersonV2 {
    name: String,
    age: i64,
    address: Address,
    nickname: Option<String>,
    favorite: Color,
    active: bool,
    scores: BTreeMap<String, f64>,
});

/// A tagged union.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Case 0: radius.
    Circle(f64),
    /// Case 1: corner coordinates.
    Polygon(Vec<f64>),
    /// Case 2: a text label, possibly absent.
    Label(Option<String>),
}

impl Default for Shape {
    fn default() -> Self {
        Self::Circle(0.0)
    }
}

impl UnionSerializer for Shape {
    fn case_index(&self) -> u32 {
        match self {
            Self::Circle(_) => 0,
            Self::Polygon(_) => 1,
            Self::Label(_) => 2,
        }
    }

    fn write_case(&self, ctx: &mut WriteContext<'_>) -> echo_xcodec::Result<()> {
        match self {
            Self::Circle(r) => write_union_payload(ctx, r),
            Self::Polygon(points) => write_union_payload(ctx, points),
            Self::Label(text) => write_union_payload(ctx, text),
        }
    }

    fn read_case(ctx: &mut ReadContext<'_>, index: u32) -> echo_xcodec::Result<Self> {
        match index {
            0 => read_union_payload(ctx).map(Self::Circle),
            1 => read_union_payload(ctx).map(Self::Polygon),
            2 => read_union_payload(ctx).map(Self::Label),
            _ => Err(invalid_case::<Self>(index)),
        }
    }
}

impl_union_serializer!(Shape);

/// Singly linked node; with reference tracking the links may form cycles.
#[derive(Default)]
pub struct Node {
    /// Payload.
    pub value: i32,
    /// Successor.
    pub next: Option<Rc<RefCell<Node>>>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // successors are elided so cyclic lists print finitely
        f.debug_struct("Node")
            .field("value", &self.value)
            .field("linked", &self.next.is_some())
            .finish()
    }
}

impl_struct_serializer!(Node {
    value: i32,
    next: Option<Rc<RefCell<Node>>>,
});

/// Build a cyclic list `0 -> 1 -> ... -> len-1 -> 0`. Call [`unlink`] when
/// done so the cycle is freed.
pub fn ring(len: i32) -> Rc<RefCell<Node>> {
    let head = Rc::new(RefCell::new(Node { value: 0, next: None }));
    let mut tail = Rc::clone(&head);
    for value in 1..len {
        let node = Rc::new(RefCell::new(Node { value, next: None }));
        tail.borrow_mut().next = Some(Rc::clone(&node));
        tail = node;
    }
    tail.borrow_mut().next = Some(Rc::clone(&head));
    head
}

/// Break every link reachable from `head`.
pub fn unlink(head: &Rc<RefCell<Node>>) {
    let mut cursor = head.borrow_mut().next.take();
    while let Some(node) = cursor {
        cursor = node.borrow_mut().next.take();
    }
}

/// A foreign color type without a [`Serializer`](echo_xcodec::Serializer).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

/// Ext codec packing [`Rgb`] into one varuint.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedRgb;

impl ExtSerializer<Rgb> for PackedRgb {
    fn write(&self, value: &Rgb, ctx: &mut WriteContext<'_>) -> echo_xcodec::Result<()> {
        let packed = (u32::from(value.r) << 16) | (u32::from(value.g) << 8) | u32::from(value.b);
        ctx.writer().write_varuint32(packed);
        Ok(())
    }

    fn read(&self, ctx: &mut ReadContext<'_>) -> echo_xcodec::Result<Rgb> {
        let [high, r, g, b] = ctx.reader().read_varuint32()?.to_be_bytes();
        if high != 0 {
            return Err(CodecError::InvalidData("rgb out of range"));
        }
        Ok(Rgb { r, g, b })
    }
}

/// A fully populated [`Person`].
pub fn sample_person() -> Person {
    Person {
        name: "Ada Lovelace".into(),
        age: 36,
        email: Some("ada@example.org".into()),
        tags: vec!["math".into(), "engines".into()],
        address: Address {
            street: "12 St James's Square".into(),
            city: "London".into(),
            zip: None,
        },
        favorite: Color::Blue,
        scores: [("analysis".to_owned(), 9.5), ("poetry".to_owned(), 7.0)]
            .into_iter()
            .collect(),
    }
}
