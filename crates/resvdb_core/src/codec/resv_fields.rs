//! Reservation fixed-field mapper.
//!
//! # Responsibility
//! - Name the bins a reservation record is stored under.
//! - Produce the base-field writes for a save batch.
//! - Decode a stored record into a `ResvInfo`.
//!
//! # Invariants
//! - Missing integer bins decode to `UNSET_INT`, never to zero.
//! - A missing queue decodes to an empty string.
//! - A bin of the wrong type is invalid data, not a default.

use super::attr_codec::decode_attrs;
use super::{CodecError, CodecResult};
use crate::model::resv::{ResvInfo, UNSET_INT};
use crate::store::{Operation, Record, Value};

pub const BIN_QUEUE: &str = "ri_queue";
pub const BIN_STATE: &str = "ri_state";
pub const BIN_SUBSTATE: &str = "ri_substate";
pub const BIN_STIME: &str = "ri_stime";
pub const BIN_ETIME: &str = "ri_etime";
pub const BIN_DURATION: &str = "ri_duration";
pub const BIN_TACTIVE: &str = "ri_tactive";
pub const BIN_SVRFLAGS: &str = "ri_svrflags";
pub const BIN_SAVETM: &str = "ri_savetm";
pub const BIN_CREATTM: &str = "ri_creattm";
pub const BIN_ATTRIBUTES: &str = "attributes";

/// Writes for the eight caller-owned scalar fields.
pub fn base_field_writes(resv: &ResvInfo) -> Vec<Operation> {
    vec![
        Operation::write(BIN_QUEUE, resv.queue.as_str()),
        Operation::write(BIN_STATE, resv.state),
        Operation::write(BIN_SUBSTATE, resv.substate),
        Operation::write(BIN_STIME, resv.stime),
        Operation::write(BIN_ETIME, resv.etime),
        Operation::write(BIN_DURATION, resv.duration),
        Operation::write(BIN_TACTIVE, resv.tactive),
        Operation::write(BIN_SVRFLAGS, resv.svrflags),
    ]
}

/// Decodes every stored field of `record` into `resv`.
///
/// `resv.resvid` is left as-is; identity comes from the caller or the scan key.
pub fn decode_resv(record: &Record, resv: &mut ResvInfo) -> CodecResult<()> {
    resv.queue = str_field(record, BIN_QUEUE)?;
    resv.state = int_field(record, BIN_STATE)?;
    resv.substate = int_field(record, BIN_SUBSTATE)?;
    resv.stime = int_field(record, BIN_STIME)?;
    resv.etime = int_field(record, BIN_ETIME)?;
    resv.duration = int_field(record, BIN_DURATION)?;
    resv.tactive = int_field(record, BIN_TACTIVE)?;
    resv.svrflags = int_field(record, BIN_SVRFLAGS)?;
    resv.savetm = int_field(record, BIN_SAVETM)?;
    resv.creattm = int_field(record, BIN_CREATTM)?;
    resv.attrs = decode_attrs(record.bin(BIN_ATTRIBUTES))?;
    resv.generation = record.generation;
    Ok(())
}

/// Reads the stored save timestamp, `UNSET_INT` when absent.
pub fn stored_savetm(record: &Record) -> CodecResult<i64> {
    int_field(record, BIN_SAVETM)
}

fn int_field(record: &Record, bin: &'static str) -> CodecResult<i64> {
    match record.bin(bin) {
        None | Some(Value::Nil) => Ok(UNSET_INT),
        Some(Value::Int(value)) => Ok(*value),
        Some(other) => Err(CodecError::FieldType {
            bin,
            expected: "integer",
            found: other.type_name(),
        }),
    }
}

fn str_field(record: &Record, bin: &'static str) -> CodecResult<String> {
    match record.bin(bin) {
        None | Some(Value::Nil) => Ok(String::new()),
        Some(Value::Str(value)) => Ok(value.clone()),
        Some(other) => Err(CodecError::FieldType {
            bin,
            expected: "string",
            found: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{base_field_writes, decode_resv, BIN_QUEUE, BIN_STATE};
    use crate::codec::CodecError;
    use crate::model::resv::{ResvInfo, UNSET_INT};
    use crate::store::{Operation, Record, StoreKey, Value, ValueMap};

    fn record(bins: ValueMap) -> Record {
        Record {
            key: StoreKey::new("pbs", "resv", "R1.server"),
            bins,
            generation: 1,
        }
    }

    #[test]
    fn base_writes_cover_eight_scalars() {
        let mut resv = ResvInfo::new("R1.server", "workq");
        resv.state = 2;
        let writes = base_field_writes(&resv);
        assert_eq!(writes.len(), 8);
        assert_eq!(writes[0], Operation::write(BIN_QUEUE, "workq"));
        assert_eq!(writes[1], Operation::write(BIN_STATE, 2_i64));
    }

    #[test]
    fn missing_fields_decode_to_sentinels() {
        let mut resv = ResvInfo::for_load("R1.server");
        decode_resv(&record(ValueMap::new()), &mut resv).unwrap();

        assert_eq!(resv.resvid, "R1.server");
        assert_eq!(resv.queue, "");
        assert_eq!(resv.state, UNSET_INT);
        assert_eq!(resv.svrflags, UNSET_INT);
        assert_eq!(resv.savetm, UNSET_INT);
        assert_eq!(resv.generation, 1);
        assert!(resv.attrs.is_empty());
    }

    #[test]
    fn zero_is_distinct_from_unset() {
        let mut bins = ValueMap::new();
        bins.insert(BIN_STATE.to_string(), Value::Int(0));
        let mut resv = ResvInfo::for_load("R1.server");
        decode_resv(&record(bins), &mut resv).unwrap();
        assert_eq!(resv.state, 0);
        assert_eq!(resv.substate, UNSET_INT);
    }

    #[test]
    fn wrong_bin_type_is_rejected() {
        let mut bins = ValueMap::new();
        bins.insert(BIN_STATE.to_string(), Value::from("two"));
        let mut resv = ResvInfo::for_load("R1.server");
        let err = decode_resv(&record(bins), &mut resv).unwrap_err();
        assert_eq!(
            err,
            CodecError::FieldType {
                bin: BIN_STATE,
                expected: "integer",
                found: "string",
            }
        );
    }
}
