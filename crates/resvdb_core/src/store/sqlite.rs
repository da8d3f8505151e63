//! SQLite-backed `KvStore`.
//!
//! # Responsibility
//! - Persist each record as one row holding its bins as a JSON document.
//! - Apply operate batches inside a single SQLite transaction.
//! - Stream scans row by row through a prepared statement.
//!
//! # Invariants
//! - Connections handed to this store have migrations applied (`kv_records`).
//! - A failed batch leaves the stored record untouched (transaction rollback on
//!   drop).

use super::{
    validate_bin_name, validate_key, KvStore, Operation, Query, Record, RecordExists, StoreError,
    StoreKey, StoreResult, Value, ValueMap, WritePolicy,
};
use log::{debug, warn};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::time::Instant;

/// Key-value store over the `kv_records` table of an opened connection.
pub struct SqliteKvStore<'conn> {
    conn: &'conn Connection,
    namespace: String,
}

impl<'conn> SqliteKvStore<'conn> {
    pub fn new(conn: &'conn Connection, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
        }
    }

    fn read_record(&self, key: &StoreKey) -> StoreResult<Option<(ValueMap, u32)>> {
        let row = self
            .conn
            .query_row(
                "SELECT bins, generation
                 FROM kv_records
                 WHERE namespace = ?1 AND set_name = ?2 AND user_key = ?3;",
                params![key.namespace, key.set, key.user_key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)),
            )
            .optional()?;

        match row {
            Some((document, generation)) => Ok(Some((decode_bins(&document)?, generation))),
            None => Ok(None),
        }
    }
}

impl KvStore for SqliteKvStore<'_> {
    fn namespace(&self) -> &str {
        self.namespace.as_str()
    }

    fn operate(
        &self,
        key: &StoreKey,
        ops: &[Operation],
        policy: &WritePolicy,
    ) -> StoreResult<Record> {
        validate_key(key)?;
        if ops.is_empty() {
            return Err(StoreError::Parameter("operation batch is empty".to_string()));
        }
        for op in ops {
            validate_bin_name(op.bin())?;
        }

        let tx = self.conn.unchecked_transaction()?;
        let (mut bins, generation) = match self.read_record(key)? {
            Some((bins, generation)) => (bins, generation.saturating_add(1)),
            None if policy.exists == RecordExists::UpdateOnly => {
                return Err(StoreError::RecordNotFound(key.clone()));
            }
            None => (ValueMap::new(), 1),
        };

        for op in ops {
            apply_operation(&mut bins, op)?;
        }

        tx.execute(
            "INSERT INTO kv_records (namespace, set_name, user_key, bins, generation)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (namespace, set_name, user_key) DO UPDATE SET
                bins = excluded.bins,
                generation = excluded.generation,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                key.namespace,
                key.set,
                key.user_key,
                encode_bins(&bins)?,
                generation
            ],
        )?;
        tx.commit()?;

        Ok(Record {
            key: key.clone(),
            bins: ValueMap::new(),
            generation,
        })
    }

    fn get(&self, key: &StoreKey) -> StoreResult<Record> {
        validate_key(key)?;
        match self.read_record(key)? {
            Some((bins, generation)) => Ok(Record {
                key: key.clone(),
                bins,
                generation,
            }),
            None => Err(StoreError::RecordNotFound(key.clone())),
        }
    }

    fn remove(&self, key: &StoreKey) -> StoreResult<()> {
        validate_key(key)?;
        let changed = self.conn.execute(
            "DELETE FROM kv_records
             WHERE namespace = ?1 AND set_name = ?2 AND user_key = ?3;",
            params![key.namespace, key.set, key.user_key],
        )?;
        if changed == 0 {
            return Err(StoreError::RecordNotFound(key.clone()));
        }
        Ok(())
    }

    fn query_foreach(
        &self,
        query: &Query,
        callback: &mut dyn FnMut(Record) -> bool,
    ) -> StoreResult<()> {
        let started_at = Instant::now();
        let mut sql = String::from(
            "SELECT user_key, bins, generation
             FROM kv_records
             WHERE namespace = ?1 AND set_name = ?2",
        );
        let mut bind_values = vec![
            SqlValue::Text(query.namespace.clone()),
            SqlValue::Text(query.set.clone()),
        ];

        if let Some(filter) = &query.filter {
            // Bin names are restricted to `[A-Za-z0-9_]`, so inlining the JSON
            // path is safe and lets SQLite use the expression index.
            validate_bin_name(&filter.bin)?;
            sql.push_str(&format!(
                " AND json_type(bins, '$.{bin}') = 'integer'
                  AND json_extract(bins, '$.{bin}') BETWEEN ?3 AND ?4",
                bin = filter.bin
            ));
            bind_values.push(SqlValue::Integer(filter.begin));
            bind_values.push(SqlValue::Integer(filter.end));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut delivered = 0_u64;

        while let Some(row) = rows.next()? {
            let user_key: String = row.get(0)?;
            let document: String = row.get(1)?;
            let generation: u32 = row.get(2)?;
            let record = Record {
                key: StoreKey::new(query.namespace.as_str(), query.set.as_str(), user_key),
                bins: decode_bins(&document)?,
                generation,
            };
            delivered += 1;
            if !callback(record) {
                debug!(
                    "event=kv_query module=store status=stopped set={} rows={} duration_ms={}",
                    query.set,
                    delivered,
                    started_at.elapsed().as_millis()
                );
                return Ok(());
            }
        }

        debug!(
            "event=kv_query module=store status=ok set={} rows={} duration_ms={}",
            query.set,
            delivered,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }
}

fn apply_operation(bins: &mut ValueMap, op: &Operation) -> StoreResult<()> {
    match op {
        Operation::Write { bin, value } if value.is_nil() => {
            bins.remove(bin);
        }
        Operation::Write { bin, value } => {
            bins.insert(bin.clone(), value.clone());
        }
        Operation::MapPutItems { bin, items } => match bins.get_mut(bin) {
            // An empty string is the legacy cleared-attributes marker.
            Some(slot @ Value::Str(_)) if slot.as_str() == Some("") => {
                *slot = Value::Map(items.clone());
            }
            Some(Value::Map(existing)) => {
                existing.extend(items.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Some(other) => {
                return Err(StoreError::BinIncompatibleType {
                    bin: bin.clone(),
                    found: other.type_name(),
                });
            }
            None => {
                bins.insert(bin.clone(), Value::Map(items.clone()));
            }
        },
    }
    Ok(())
}

fn encode_bins(bins: &ValueMap) -> StoreResult<String> {
    serde_json::to_string(bins).map_err(|err| StoreError::Corrupt(err.to_string()))
}

fn decode_bins(document: &str) -> StoreResult<ValueMap> {
    serde_json::from_str(document).map_err(|err| {
        warn!("event=kv_decode module=store status=error error={err}");
        StoreError::Corrupt(err.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::apply_operation;
    use crate::store::{Operation, StoreError, Value, ValueMap};

    fn items(pairs: &[(&str, &str)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn nil_write_removes_bin() {
        let mut bins = ValueMap::new();
        bins.insert("attributes".to_string(), Value::Map(ValueMap::new()));
        apply_operation(&mut bins, &Operation::write("attributes", Value::Nil)).unwrap();
        assert!(bins.is_empty());
    }

    #[test]
    fn map_put_items_merges_without_dropping_keys() {
        let mut bins = ValueMap::new();
        apply_operation(
            &mut bins,
            &Operation::map_put_items("attributes", items(&[("a", "1"), ("b", "2")])),
        )
        .unwrap();
        apply_operation(
            &mut bins,
            &Operation::map_put_items("attributes", items(&[("b", "3"), ("c", "4")])),
        )
        .unwrap();

        let merged = bins["attributes"].as_map().unwrap();
        assert_eq!(merged, &items(&[("a", "1"), ("b", "3"), ("c", "4")]));
    }

    #[test]
    fn map_put_items_replaces_cleared_marker() {
        let mut bins = ValueMap::new();
        bins.insert("attributes".to_string(), Value::from(""));
        apply_operation(
            &mut bins,
            &Operation::map_put_items("attributes", items(&[("a", "1")])),
        )
        .unwrap();
        assert_eq!(bins["attributes"], Value::Map(items(&[("a", "1")])));
    }

    #[test]
    fn map_put_items_on_scalar_bin_fails() {
        let mut bins = ValueMap::new();
        bins.insert("attributes".to_string(), Value::from("set"));
        let err = apply_operation(
            &mut bins,
            &Operation::map_put_items("attributes", items(&[("a", "1")])),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::BinIncompatibleType { found: "string", .. }));
        assert_eq!(err.code(), 12);
    }
}
