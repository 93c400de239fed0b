// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Calendar and time payloads.
//!
//! * `DATE`: i32 days since 1970-01-01.
//! * `TIMESTAMP`: i64 microseconds since the epoch (UTC, sub-microsecond
//!   precision is dropped).
//! * `DURATION`: zigzag varint64 seconds, then i32 nanoseconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};

use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, Result};
use crate::serializer::{Serializer, TypeKind};
use crate::types::type_id;

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

impl Serializer for NaiveDate {
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::DATE)
    }

    fn default_value() -> Self {
        epoch()
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        let days = self.signed_duration_since(epoch()).num_days();
        let days = i32::try_from(days).map_err(|_| CodecError::InvalidData("date out of range"))?;
        ctx.writer().write_i32(days);
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let days = ctx.reader().read_i32()?;
        epoch()
            .checked_add_signed(TimeDelta::days(i64::from(days)))
            .ok_or(CodecError::InvalidData("date out of range"))
    }
}

impl Serializer for NaiveDateTime {
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::TIMESTAMP)
    }

    fn default_value() -> Self {
        Self::default()
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.writer().write_i64(self.and_utc().timestamp_micros());
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let micros = ctx.reader().read_i64()?;
        DateTime::from_timestamp_micros(micros)
            .map(|dt| dt.naive_utc())
            .ok_or(CodecError::InvalidData("timestamp out of range"))
    }
}

impl Serializer for TimeDelta {
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::DURATION)
    }

    fn default_value() -> Self {
        Self::zero()
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        let w = ctx.writer();
        w.write_varint64(self.num_seconds());
        w.write_i32(self.subsec_nanos());
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let r = ctx.reader();
        let secs = r.read_varint64()?;
        let nanos = r.read_i32()?;
        // nanos share the sign of the whole duration
        if nanos.unsigned_abs() >= 1_000_000_000 {
            return Err(CodecError::InvalidData("duration nanos out of range"));
        }
        Self::try_seconds(secs)
            .and_then(|whole| whole.checked_add(&Self::nanoseconds(i64::from(nanos))))
            .ok_or(CodecError::InvalidData("duration out of range"))
    }
}
