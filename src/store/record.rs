use chrono::{DateTime, Utc};
use rusqlite::types::Value;

use super::Store;
use super::query::{Column, Query, Table};
use crate::error::{Error, Result};
use crate::types::{Attr, Citation, Data, Edit, Role, User};

/// A result row, one value per output column.
pub type Row = Vec<Value>;

/// A type that can be decoded from a full row of its table.
pub trait Record: Sized {
    const TABLE: Table;

    fn from_row(row: &[Value]) -> Result<Self>;

    /// A query over this record's table returning whole rows.
    #[must_use]
    fn query() -> Query {
        Query::new(Self::TABLE)
    }
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Renders a stored value the way the ledger records it.
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s.clone()),
        Value::Blob(b) => Some(format!("<{} bytes>", b.len())),
    }
}

/// Sequential reader over the cells of a row.
struct Cells<'a> {
    columns: &'static [Column],
    values: &'a [Value],
    pos: usize,
}

impl<'a> Cells<'a> {
    fn new(table: Table, values: &'a [Value]) -> Result<Self> {
        let columns = table.columns();
        if values.len() != columns.len() {
            return Err(Error::Decode(format!(
                "{}: expected {} cells, got {}",
                table.name(),
                columns.len(),
                values.len()
            )));
        }
        Ok(Self {
            columns,
            values,
            pos: 0,
        })
    }

    fn next(&mut self) -> (&'static str, &'a Value) {
        let name = self.columns[self.pos].name;
        let value = &self.values[self.pos];
        self.pos += 1;
        (name, value)
    }

    fn int(&mut self) -> Result<i64> {
        match self.next() {
            (_, Value::Integer(i)) => Ok(*i),
            (name, _) => Err(Error::Decode(name.to_string())),
        }
    }

    fn text(&mut self) -> Result<String> {
        match self.next() {
            (_, Value::Text(s)) => Ok(s.clone()),
            (name, _) => Err(Error::Decode(name.to_string())),
        }
    }

    fn opt_text(&mut self) -> Result<Option<String>> {
        match self.next() {
            (_, Value::Text(s)) => Ok(Some(s.clone())),
            (_, Value::Null) => Ok(None),
            (name, _) => Err(Error::Decode(name.to_string())),
        }
    }
}

impl Record for User {
    const TABLE: Table = Table::User;

    fn from_row(row: &[Value]) -> Result<Self> {
        let mut cells = Cells::new(Self::TABLE, row)?;
        Ok(User {
            id: cells.int()?,
            name: cells.text()?,
            role: Role::from_rank(cells.int()?)?,
            email: cells.text()?,
            password_hash: cells.text()?,
        })
    }
}

impl Record for Citation {
    const TABLE: Table = Table::Citation;

    fn from_row(row: &[Value]) -> Result<Self> {
        let mut cells = Cells::new(Self::TABLE, row)?;
        Ok(Citation {
            id: cells.int()?,
            creator_id: cells.int()?,
            authors: cells.text()?,
            year: cells.int()?,
            journal: cells.text()?,
            doi: cells.text()?,
            ads: cells.text()?,
        })
    }
}

impl Record for Data {
    const TABLE: Table = Table::Data;

    fn from_row(row: &[Value]) -> Result<Self> {
        let mut cells = Cells::new(Self::TABLE, row)?;
        Ok(Data {
            id: cells.int()?,
            citation_id: cells.int()?,
            creator_id: cells.int()?,
            sample_type: cells.text()?,
            element: cells.text()?,
        })
    }
}

impl Record for Edit {
    const TABLE: Table = Table::Edit;

    fn from_row(row: &[Value]) -> Result<Self> {
        let mut cells = Cells::new(Self::TABLE, row)?;
        Ok(Edit {
            id: cells.int()?,
            user_id: cells.int()?,
            timestamp: parse_datetime(&cells.text()?),
            table: cells.text()?,
            item_id: cells.int()?,
            column: cells.opt_text()?,
            old_value: cells.opt_text()?,
            new_value: cells.opt_text()?,
        })
    }
}

impl Record for Attr {
    const TABLE: Table = Table::Attrs;

    fn from_row(row: &[Value]) -> Result<Self> {
        let mut cells = Cells::new(Self::TABLE, row)?;
        Ok(Attr {
            id: cells.int()?,
            key: cells.text()?,
            value: cells.text()?,
        })
    }
}

/// Typed reads on top of [`Store::select`].
pub trait StoreExt: Store {
    /// All rows matching the query, decoded as `T`. The query must select
    /// exactly the columns of `T`'s table.
    fn get_all<T: Record>(&self, query: &Query) -> Result<Vec<T>> {
        if query.output_columns() != T::TABLE.columns() {
            return Err(Error::InvalidReference(format!(
                "query does not select '{}' rows",
                T::TABLE.name()
            )));
        }
        self.select(query)?
            .iter()
            .map(|row| T::from_row(row))
            .collect()
    }

    /// Exactly one row; fails with `NotFound` on zero rows and
    /// `MultipleResults` on more than one.
    fn get_one<T: Record>(&self, query: &Query) -> Result<T> {
        self.get_one_or_none(query)?.ok_or(Error::NotFound)
    }

    /// One row or none; fails with `MultipleResults` on more than one.
    fn get_one_or_none<T: Record>(&self, query: &Query) -> Result<Option<T>> {
        let mut rows = self.get_all::<T>(query)?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            _ => Err(Error::MultipleResults),
        }
    }

    /// Values of a single-column query.
    fn get_column(&self, query: &Query) -> Result<Vec<Value>> {
        if query.output_columns().len() != 1 {
            return Err(Error::InvalidReference(
                "query must select exactly one column".to_string(),
            ));
        }
        Ok(self
            .select(query)?
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect())
    }

    /// Text values of a single-column query, skipping nulls.
    fn get_strings(&self, query: &Query) -> Result<Vec<String>> {
        Ok(self
            .get_column(query)?
            .iter()
            .filter_map(value_to_string)
            .collect())
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
