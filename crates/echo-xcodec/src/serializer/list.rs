// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ordered sequences (`LIST`): `Vec`, `VecDeque`, `LinkedList` and [`Stack`].

use std::collections::{LinkedList, VecDeque};

use crate::config::Config;
use crate::context::{ReadContext, WriteContext};
use crate::error::Result;
use crate::meta::FieldType;
use crate::resolver::TypeResolver;
use crate::serializer::collection::{read_elements, write_elements};
use crate::serializer::{Serializer, TypeKind};
use crate::types::type_id;

/// A LIFO stack. Elements are stored and encoded bottom-first, so a decoded
/// stack pops in the same order as the original.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Stack<T> {
    items: Vec<T>,
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Stack<T> {
    /// An empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push onto the top.
    pub fn push(&mut self, value: T) {
        self.items.push(value);
    }

    /// Pop the top element.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Borrow the top element.
    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate bottom to top.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> From<Vec<T>> for Stack<T> {
    /// The last element of `items` becomes the top.
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<'a, T> IntoIterator for &'a Stack<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> FromIterator<T> for Stack<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

macro_rules! list_codec {
    ($($container:ident => $from_vec:expr;)*) => {
        $(
            impl<T: Serializer> Serializer for $container<T> {
                fn type_kind() -> TypeKind {
                    TypeKind::Builtin(type_id::LIST)
                }

                fn default_value() -> Self {
                    Self::default()
                }

                fn field_type(resolver: &TypeResolver, config: &Config) -> Result<FieldType> {
                    Ok(FieldType::with_generics(
                        type_id::LIST,
                        vec![T::field_type(resolver, config)?],
                    ))
                }

                fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
                    write_elements(ctx, self.iter())
                }

                fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
                    let from_vec: fn(Vec<T>) -> Self = $from_vec;
                    read_elements(ctx).map(from_vec)
                }
            }
        )*
    };
}

list_codec! {
    Vec => std::convert::identity;
    VecDeque => VecDeque::from;
    LinkedList => |items| items.into_iter().collect();
    Stack => Stack::from;
}
