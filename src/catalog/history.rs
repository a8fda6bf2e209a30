use rusqlite::types::Value;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::query::{Table, edit, user};
use crate::store::{Order, Query, Row, Store};

pub const HISTORY_HEADINGS: [&str; 7] = [
    "User Name",
    "Timestamp",
    "Table",
    "Item Id",
    "Column",
    "Old Value",
    "New Value",
];

/// A ledger row with the name of the user who made the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    pub user_name: String,
    pub timestamp: String,
    pub table: String,
    pub item_id: i64,
    pub column: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

fn history_query() -> Query {
    Query::new(Table::Edit)
        .select(user::NAME)
        .select(edit::DATETIME)
        .select(edit::TABLE)
        .select(edit::ITEM_ID)
        .select(edit::COLUMN)
        .select(edit::OLD_VALUE)
        .select(edit::NEW_VALUE)
        .order_by(edit::ID, Order::Desc)
}

fn text(value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s.clone())),
        _ => Err(Error::Decode("history".to_string())),
    }
}

fn decode(row: &Row) -> Result<HistoryRow> {
    let [name, datetime, table, item_id, column, old_value, new_value] = row.as_slice() else {
        return Err(Error::Decode("history".to_string()));
    };
    let Value::Integer(item_id) = item_id else {
        return Err(Error::Decode("item_id".to_string()));
    };

    Ok(HistoryRow {
        user_name: text(name)?.unwrap_or_default(),
        timestamp: text(datetime)?.unwrap_or_default(),
        table: text(table)?.unwrap_or_default(),
        item_id: *item_id,
        column: text(column)?,
        old_value: text(old_value)?,
        new_value: text(new_value)?,
    })
}

/// Ledger rows for one item, newest first.
pub fn item_history(store: &dyn Store, table: Table, item_id: i64) -> Result<Vec<HistoryRow>> {
    let query = history_query()
        .eq(edit::TABLE, table.name().to_string())
        .eq(edit::ITEM_ID, item_id);
    store.select(&query)?.iter().map(decode).collect()
}

/// The whole ledger, newest first.
pub fn all_edits(store: &dyn Store) -> Result<Vec<HistoryRow>> {
    store.select(&history_query())?.iter().map(decode).collect()
}
