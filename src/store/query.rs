//! Typed query descriptors.
//!
//! Every persisted table enumerates its columns as [`Column`] constants tagged
//! with their owning [`Table`]. A [`Query`] names a default table, an optional
//! list of output selections and a list of filters; any column from another
//! table pulls in a join derived from the static foreign-key relations.
//! Names such as `"User.name"` are parsed onto the same descriptors.

use rusqlite::types::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    User,
    Citation,
    Data,
    Edit,
    Attrs,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::User,
        Table::Citation,
        Table::Data,
        Table::Edit,
        Table::Attrs,
    ];

    /// Entity name, as recorded in the ledger's `table` column.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Table::User => "User",
            Table::Citation => "Citation",
            Table::Data => "Data",
            Table::Edit => "Edit",
            Table::Attrs => "Attrs",
        }
    }

    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Table::User => "users",
            Table::Citation => "citations",
            Table::Data => "data",
            Table::Edit => "edits",
            Table::Attrs => "attrs",
        }
    }

    /// All columns in storage order.
    #[must_use]
    pub const fn columns(self) -> &'static [Column] {
        match self {
            Table::User => user::ALL,
            Table::Citation => citation::ALL,
            Table::Data => data::ALL,
            Table::Edit => edit::ALL,
            Table::Attrs => attrs::ALL,
        }
    }

    pub fn parse(name: &str) -> Result<Table> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| Error::InvalidReference(format!("'{name}' is not a valid table")))
    }

    pub fn column(self, name: &str) -> Result<Column> {
        self.columns()
            .iter()
            .copied()
            .find(|c| c.name == name)
            .ok_or_else(|| {
                Error::InvalidReference(format!(
                    "'{name}' is not a column of table '{}'",
                    self.name()
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Column {
    pub table: Table,
    pub name: &'static str,
}

impl Column {
    #[must_use]
    pub const fn new(table: Table, name: &'static str) -> Self {
        Self { table, name }
    }

    fn qualified(self) -> String {
        format!("\"{}\".\"{}\"", self.table.sql_name(), self.name)
    }
}

pub mod user {
    use super::{Column, Table};

    pub const ID: Column = Column::new(Table::User, "id");
    pub const NAME: Column = Column::new(Table::User, "name");
    pub const AUTH_LEVEL: Column = Column::new(Table::User, "auth_level");
    pub const EMAIL: Column = Column::new(Table::User, "email");
    pub const PASSWORD: Column = Column::new(Table::User, "password");

    pub const ALL: &[Column] = &[ID, NAME, AUTH_LEVEL, EMAIL, PASSWORD];
}

pub mod citation {
    use super::{Column, Table};

    pub const ID: Column = Column::new(Table::Citation, "id");
    pub const CREATOR_ID: Column = Column::new(Table::Citation, "creator_id");
    pub const AUTHORS: Column = Column::new(Table::Citation, "authors");
    pub const YEAR: Column = Column::new(Table::Citation, "year");
    pub const JOURNAL: Column = Column::new(Table::Citation, "journal");
    pub const DOI: Column = Column::new(Table::Citation, "doi");
    pub const ADS: Column = Column::new(Table::Citation, "ads");

    pub const ALL: &[Column] = &[ID, CREATOR_ID, AUTHORS, YEAR, JOURNAL, DOI, ADS];
}

pub mod data {
    use super::{Column, Table};

    pub const ID: Column = Column::new(Table::Data, "id");
    pub const CITATION_ID: Column = Column::new(Table::Data, "citation_id");
    pub const CREATOR_ID: Column = Column::new(Table::Data, "creator_id");
    pub const SAMPLE_TYPE: Column = Column::new(Table::Data, "sample_type");
    pub const ELEMENT: Column = Column::new(Table::Data, "element");

    pub const ALL: &[Column] = &[ID, CITATION_ID, CREATOR_ID, SAMPLE_TYPE, ELEMENT];
}

pub mod edit {
    use super::{Column, Table};

    pub const ID: Column = Column::new(Table::Edit, "id");
    pub const USER_ID: Column = Column::new(Table::Edit, "user_id");
    pub const DATETIME: Column = Column::new(Table::Edit, "datetime");
    pub const TABLE: Column = Column::new(Table::Edit, "table");
    pub const ITEM_ID: Column = Column::new(Table::Edit, "item_id");
    pub const COLUMN: Column = Column::new(Table::Edit, "column");
    pub const OLD_VALUE: Column = Column::new(Table::Edit, "old_value");
    pub const NEW_VALUE: Column = Column::new(Table::Edit, "new_value");

    pub const ALL: &[Column] = &[
        ID, USER_ID, DATETIME, TABLE, ITEM_ID, COLUMN, OLD_VALUE, NEW_VALUE,
    ];
}

pub mod attrs {
    use super::{Column, Table};

    pub const ID: Column = Column::new(Table::Attrs, "id");
    pub const KEY: Column = Column::new(Table::Attrs, "key");
    pub const VALUE: Column = Column::new(Table::Attrs, "value");

    pub const ALL: &[Column] = &[ID, KEY, VALUE];
}

/// Longest membership list bound as one parameter per value. Longer lists
/// travel as a single JSON array so no query approaches SQLite's variable cap.
const INLINE_LIST_LIMIT: usize = 500;

fn json_list(values: &[Value]) -> Result<String> {
    let items = values
        .iter()
        .map(|value| match value {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Integer(i) => Ok(serde_json::Value::from(*i)),
            Value::Real(f) => Ok(serde_json::Value::from(*f)),
            Value::Text(s) => Ok(serde_json::Value::from(s.as_str())),
            Value::Blob(_) => Err(Error::InvalidReference(
                "binary values cannot be listed".to_string(),
            )),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(serde_json::Value::Array(items).to_string())
}

/// Foreign key -> referenced key.
const RELATIONS: &[(Column, Column)] = &[
    (data::CITATION_ID, citation::ID),
    (data::CREATOR_ID, user::ID),
    (citation::CREATOR_ID, user::ID),
    (edit::USER_ID, user::ID),
];

fn relation(from: Table, to: Table) -> Result<(Column, Column)> {
    RELATIONS
        .iter()
        .copied()
        .find(|(fk, pk)| {
            (fk.table == from && pk.table == to) || (fk.table == to && pk.table == from)
        })
        .ok_or_else(|| {
            Error::InvalidReference(format!(
                "no relation between '{}' and '{}'",
                from.name(),
                to.name()
            ))
        })
}

/// An output of a query: a whole entity or a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Entity(Table),
    Column(Column),
}

impl Selection {
    /// Resolves a field name against a default table.
    ///
    /// `year` is a column of the default table, `User` is a whole entity and
    /// `User.name` is a column of another (joined) table.
    pub fn resolve(default: Table, name: &str) -> Result<Selection> {
        if let Some((table, column)) = name.split_once('.') {
            let table = Table::parse(table)?;
            return table.column(column).map(Selection::Column);
        }

        match name.chars().next() {
            Some(c) if c.is_lowercase() => default.column(name).map(Selection::Column),
            Some(_) => Table::parse(name).map(Selection::Entity),
            None => Err(Error::InvalidReference("empty field name".to_string())),
        }
    }

    #[must_use]
    pub fn table(self) -> Table {
        match self {
            Selection::Entity(table) => table,
            Selection::Column(column) => column.table,
        }
    }

    fn columns(self) -> Vec<Column> {
        match self {
            Selection::Entity(table) => table.columns().to_vec(),
            Selection::Column(column) => vec![column],
        }
    }
}

impl From<Column> for Selection {
    fn from(column: Column) -> Self {
        Selection::Column(column)
    }
}

impl From<Table> for Selection {
    fn from(table: Table) -> Self {
        Selection::Entity(table)
    }
}

/// A sparse filter argument as it arrives from a form.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Missing,
    Scalar(Value),
    List(Vec<Value>),
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Scalar(Value::Text(s.to_string()))
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Scalar(Value::Text(s))
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Scalar(Value::Integer(i))
    }
}

impl From<Vec<String>> for Arg {
    fn from(items: Vec<String>) -> Self {
        Arg::List(items.into_iter().map(Value::Text).collect())
    }
}

impl From<&[String]> for Arg {
    fn from(items: &[String]) -> Self {
        Arg::List(items.iter().cloned().map(Value::Text).collect())
    }
}

impl From<Vec<&str>> for Arg {
    fn from(items: Vec<&str>) -> Self {
        Arg::List(items.into_iter().map(|s| Value::Text(s.to_string())).collect())
    }
}

impl From<Vec<i64>> for Arg {
    fn from(items: Vec<i64>) -> Self {
        Arg::List(items.into_iter().map(Value::Integer).collect())
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::Missing, Into::into)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(Column, Value),
    In(Column, Vec<Value>),
}

impl Filter {
    fn column(&self) -> Column {
        match self {
            Filter::Eq(column, _) | Filter::In(column, _) => *column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct Query {
    table: Table,
    selections: Vec<Selection>,
    filters: Vec<Filter>,
    distinct: bool,
    order: Vec<(Column, Order)>,
}

impl Query {
    /// A query over `table` returning whole rows of that table.
    #[must_use]
    pub fn new(table: Table) -> Self {
        Self {
            table,
            selections: Vec::new(),
            filters: Vec::new(),
            distinct: false,
            order: Vec::new(),
        }
    }

    #[must_use]
    pub fn select(mut self, selection: impl Into<Selection>) -> Self {
        self.selections.push(selection.into());
        self
    }

    /// Adds outputs by name, e.g. `["User.name", "datetime"]`.
    pub fn select_names(mut self, names: &[&str]) -> Result<Self> {
        for name in names {
            self.selections.push(Selection::resolve(self.table, name)?);
        }
        Ok(self)
    }

    /// Exact match. A `Null` value matches missing values.
    #[must_use]
    pub fn eq(mut self, column: Column, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column, value.into()));
        self
    }

    /// Membership. An empty set matches nothing.
    #[must_use]
    pub fn any_of<V: Into<Value>>(mut self, column: Column, values: impl IntoIterator<Item = V>) -> Self {
        self.filters
            .push(Filter::In(column, values.into_iter().map(Into::into).collect()));
        self
    }

    /// Sparse form filter: a non-empty list filters by membership, any other
    /// non-empty value by equality, and a missing value, empty string or
    /// empty list leaves the query unfiltered.
    #[must_use]
    pub fn matching(self, column: Column, arg: impl Into<Arg>) -> Self {
        match arg.into() {
            Arg::Missing => self,
            Arg::List(values) if values.is_empty() => self,
            Arg::List(values) => self.any_of(column, values),
            Arg::Scalar(Value::Text(s)) if s.is_empty() => self,
            Arg::Scalar(Value::Null) => self,
            Arg::Scalar(value) => self.eq(column, value),
        }
    }

    /// Adds a filter by key. `name_eq` always filters by equality,
    /// `name_in` always by membership, and a bare `name` follows
    /// [`Query::matching`].
    pub fn filter(self, key: &str, arg: impl Into<Arg>) -> Result<Self> {
        let arg = arg.into();

        if let Some(name) = key.strip_suffix("_eq") {
            let column = self.filter_column(name)?;
            let value = match arg {
                Arg::Missing => Value::Null,
                Arg::Scalar(value) => value,
                Arg::List(_) => {
                    return Err(Error::InvalidReference(format!(
                        "'{key}' expects a single value"
                    )));
                }
            };
            return Ok(self.eq(column, value));
        }

        if let Some(name) = key.strip_suffix("_in") {
            let column = self.filter_column(name)?;
            let values = match arg {
                Arg::Missing => Vec::new(),
                Arg::Scalar(value) => vec![value],
                Arg::List(values) => values,
            };
            return Ok(self.any_of(column, values));
        }

        let column = self.filter_column(key)?;
        Ok(self.matching(column, arg))
    }

    fn filter_column(&self, name: &str) -> Result<Column> {
        match Selection::resolve(self.table, name)? {
            Selection::Column(column) => Ok(column),
            Selection::Entity(table) => Err(Error::InvalidReference(format!(
                "cannot filter on entity '{}'",
                table.name()
            ))),
        }
    }

    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: Column, order: Order) -> Self {
        self.order.push((column, order));
        self
    }

    fn outputs(&self) -> Vec<Selection> {
        if self.selections.is_empty() {
            vec![Selection::Entity(self.table)]
        } else {
            self.selections.clone()
        }
    }

    /// Columns produced by each result row, in order.
    #[must_use]
    pub fn output_columns(&self) -> Vec<Column> {
        self.outputs().into_iter().flat_map(Selection::columns).collect()
    }

    /// Renders the query as SQL with positional parameters.
    pub fn to_sql(&self) -> Result<(String, Vec<Value>)> {
        let mut joined: Vec<Table> = Vec::new();
        let referenced = self
            .outputs()
            .into_iter()
            .map(Selection::table)
            .chain(self.filters.iter().map(|f| f.column().table))
            .chain(self.order.iter().map(|(c, _)| c.table));
        for table in referenced {
            if table != self.table && !joined.contains(&table) {
                joined.push(table);
            }
        }

        let columns: Vec<String> = self
            .output_columns()
            .into_iter()
            .map(Column::qualified)
            .collect();

        let mut sql = format!(
            "SELECT {}{} FROM \"{}\"",
            if self.distinct { "DISTINCT " } else { "" },
            columns.join(", "),
            self.table.sql_name()
        );

        for table in joined {
            let (fk, pk) = relation(self.table, table)?;
            sql.push_str(&format!(
                " JOIN \"{}\" ON {} = {}",
                table.sql_name(),
                fk.qualified(),
                pk.qualified()
            ));
        }

        let mut params = Vec::new();
        let mut clauses = Vec::new();
        for filter in &self.filters {
            match filter {
                Filter::Eq(column, Value::Null) => {
                    clauses.push(format!("{} IS NULL", column.qualified()));
                }
                Filter::Eq(column, value) => {
                    clauses.push(format!("{} = ?", column.qualified()));
                    params.push(value.clone());
                }
                Filter::In(_, values) if values.is_empty() => clauses.push("0 = 1".to_string()),
                Filter::In(column, values) if values.len() > INLINE_LIST_LIMIT => {
                    clauses.push(format!(
                        "{} IN (SELECT value FROM json_each(?))",
                        column.qualified()
                    ));
                    params.push(Value::Text(json_list(values)?));
                }
                Filter::In(column, values) => {
                    let placeholders = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{} IN ({placeholders})", column.qualified()));
                    params.extend(values.iter().cloned());
                }
            }
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|(column, order)| {
                    let dir = match order {
                        Order::Asc => "ASC",
                        Order::Desc => "DESC",
                    };
                    format!("{} {dir}", column.qualified())
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        Ok((sql, params))
    }
}
