//! The edit ledger.
//!
//! Every mutation of a tracked table writes ledger rows through the helpers
//! below, on the same connection (and so inside the same transaction) as the
//! mutation itself. Ledger rows are only ever inserted.

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{Connection, params};
use serde::Serialize;

use super::query::{Column, Table};
use super::record::{format_datetime, value_to_string};
use crate::error::{Error, Result};

/// `column` value marking the creation of an item.
pub const CREATED: &str = "CREATED";
/// `column` value marking the deletion of an item.
pub const DELETED: &str = "DELETED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub column: &'static str,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// The applied changes of one update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diff {
    pub table: &'static str,
    pub item_id: i64,
    pub changes: Vec<Change>,
}

impl Diff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Names of the changed fields, in patch order.
    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        self.changes.iter().map(|c| c.column).collect()
    }
}

/// Items removed by a delete, including cascaded ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Deletion {
    pub citations: Vec<i64>,
    pub data: Vec<i64>,
    /// Number of ledger rows written.
    pub edits: usize,
}

fn insert_edit(
    conn: &Connection,
    actor_id: i64,
    table: Table,
    item_id: i64,
    column: Option<&str>,
    old_value: Option<&str>,
    new_value: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO edits (user_id, datetime, \"table\", item_id, \"column\", old_value, new_value)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            actor_id,
            format_datetime(&Utc::now()),
            table.name(),
            item_id,
            column,
            old_value,
            new_value,
        ],
    )?;
    Ok(())
}

pub(crate) fn record_created(conn: &Connection, actor_id: i64, table: Table, item_id: i64) -> Result<()> {
    insert_edit(conn, actor_id, table, item_id, Some(CREATED), None, None)
}

pub(crate) fn record_deleted(
    conn: &Connection,
    actor_id: i64,
    table: Table,
    item_id: i64,
    summary: &str,
) -> Result<()> {
    insert_edit(conn, actor_id, table, item_id, Some(DELETED), Some(summary), None)
}

pub(crate) fn record_change(
    conn: &Connection,
    actor_id: i64,
    table: Table,
    item_id: i64,
    change: &Change,
) -> Result<()> {
    insert_edit(
        conn,
        actor_id,
        table,
        item_id,
        Some(change.column),
        change.old_value.as_deref(),
        change.new_value.as_deref(),
    )
}

/// Applies the columns of `patch` that differ from `current` (a full row of
/// `table`) and writes one ledger row per applied column.
pub(crate) fn apply_patch(
    conn: &Connection,
    actor_id: i64,
    table: Table,
    item_id: i64,
    current: &[Value],
    patch: &[(Column, Value)],
) -> Result<Diff> {
    let columns = table.columns();
    let mut changes = Vec::new();

    for (column, new_value) in patch {
        let index = columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| {
                Error::InvalidReference(format!(
                    "'{}' is not a column of table '{}'",
                    column.name,
                    table.name()
                ))
            })?;
        let old_value = current
            .get(index)
            .ok_or_else(|| Error::Decode(column.name.to_string()))?;

        if old_value == new_value {
            continue;
        }

        conn.execute(
            &format!(
                "UPDATE \"{}\" SET \"{}\" = ?1 WHERE id = ?2",
                table.sql_name(),
                column.name
            ),
            params![new_value, item_id],
        )?;

        let change = Change {
            column: column.name,
            old_value: value_to_string(old_value),
            new_value: value_to_string(new_value),
        };
        record_change(conn, actor_id, table, item_id, &change)?;
        changes.push(change);
    }

    Ok(Diff {
        table: table.name(),
        item_id,
        changes,
    })
}
