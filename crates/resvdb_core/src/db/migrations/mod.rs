//! Schema steps for the record table.
//!
//! Each step is applied inside one transaction together with its
//! `user_version` bump, then the record table is checked before the
//! connection is handed to the store.

use crate::store::{StoreError, StoreResult};
use log::{info, warn};
use rusqlite::{Connection, Transaction};

const RECORD_TABLE: &str = "kv_records";

struct SchemaStep {
    version: u32,
    label: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        label: "record_table",
        sql: include_str!("0001_init.sql"),
    },
    SchemaStep {
        version: 2,
        label: "savetm_index",
        sql: include_str!("0002_savetm_index.sql"),
    },
];

/// Newest schema version this build writes.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Brings `conn` to `latest_version()`.
///
/// # Errors
/// - `SchemaTooNew` when the file was written by a newer build.
/// - `Corrupt` when the version claims a record table that is missing.
pub fn apply_migrations(conn: &mut Connection) -> StoreResult<()> {
    let found = current_user_version(conn)?;
    let supported = latest_version();
    if found > supported {
        warn!(
            "event=db_migrate module=db status=error found={} supported={}",
            found, supported
        );
        return Err(StoreError::SchemaTooNew { found, supported });
    }

    let pending: Vec<&SchemaStep> = STEPS.iter().filter(|step| step.version > found).collect();
    if !pending.is_empty() {
        let tx = conn.transaction()?;
        for step in &pending {
            run_step(&tx, step)?;
        }
        tx.commit()?;
        info!(
            "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
            found,
            supported,
            pending.len()
        );
    }

    ensure_record_table(conn)
}

/// Reads the schema version stored in `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> StoreResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

fn run_step(tx: &Transaction<'_>, step: &SchemaStep) -> StoreResult<()> {
    tx.execute_batch(step.sql)?;
    // PRAGMA does not take bound parameters.
    tx.execute_batch(&format!("PRAGMA user_version = {};", step.version))?;
    info!(
        "event=db_migrate_step module=db status=ok version={} step={}",
        step.version, step.label
    );
    Ok(())
}

fn ensure_record_table(conn: &Connection) -> StoreResult<()> {
    let present: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [RECORD_TABLE],
        |row| row.get(0),
    )?;
    if !present {
        return Err(StoreError::Corrupt(format!(
            "schema version {} is recorded but table `{RECORD_TABLE}` is missing",
            current_user_version(conn)?
        )));
    }
    Ok(())
}
