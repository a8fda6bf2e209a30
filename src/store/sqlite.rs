use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use super::Store;
use super::ledger::{self, Change, Deletion, Diff};
use super::query::{Column, Query, Table, citation, data, user};
use super::record::{Record, Row, format_datetime, parse_datetime};
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Maps a UNIQUE violation to `AlreadyExists` naming the offending field.
/// Other constraint failures stay database errors.
fn unique_violation(field: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Error::AlreadyExists(field.to_string())
        }
        e => Error::from(e),
    }
}

fn select_rows(conn: &Connection, query: &Query) -> Result<Vec<Row>> {
    let (sql, values) = query.to_sql()?;
    let width = query.output_columns().len();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
        (0..width)
            .map(|i| row.get::<_, Value>(i))
            .collect::<std::result::Result<Row, _>>()
    })?;

    let rows = rows.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn row_by_id(conn: &Connection, table: Table, id: i64) -> Result<Row> {
    let query = Query::new(table).eq(table.column("id")?, id);
    let mut rows = select_rows(conn, &query)?;
    match rows.len() {
        0 => Err(Error::NotFound),
        1 => Ok(rows.remove(0)),
        _ => Err(Error::MultipleResults),
    }
}

fn insert_user(conn: &Connection, new: &NewUser, role: Role) -> Result<User> {
    conn.execute(
        "INSERT INTO users (name, auth_level, email, password) VALUES (?1, ?2, ?3, ?4)",
        params![new.name, role.rank(), new.email, new.password_hash],
    )
    .map_err(unique_violation("email"))?;
    let id = conn.last_insert_rowid();

    // Self-registration has no other actor, so the account records its own creation.
    ledger::record_created(conn, id, Table::User, id)?;

    Ok(User {
        id,
        name: new.name.clone(),
        role,
        email: new.email.clone(),
        password_hash: new.password_hash.clone(),
    })
}

fn citation_patch(patch: &CitationPatch) -> Vec<(Column, Value)> {
    let mut columns = Vec::new();
    if let Some(authors) = &patch.authors {
        columns.push((citation::AUTHORS, Value::Text(authors.clone())));
    }
    if let Some(year) = patch.year {
        columns.push((citation::YEAR, Value::Integer(year)));
    }
    if let Some(journal) = &patch.journal {
        columns.push((citation::JOURNAL, Value::Text(journal.clone())));
    }
    if let Some(doi) = &patch.doi {
        columns.push((citation::DOI, Value::Text(doi.clone())));
    }
    if let Some(ads) = &patch.ads {
        columns.push((citation::ADS, Value::Text(ads.clone())));
    }
    columns
}

fn data_patch(patch: &DataPatch) -> Vec<(Column, Value)> {
    let mut columns = Vec::new();
    if let Some(sample_type) = &patch.sample_type {
        columns.push((data::SAMPLE_TYPE, Value::Text(sample_type.clone())));
    }
    if let Some(element) = &patch.element {
        columns.push((data::ELEMENT, Value::Text(element.clone())));
    }
    columns
}

fn data_summary(row: &Data) -> String {
    format!("{} {} (citation {})", row.sample_type, row.element, row.citation_id)
}

fn delete_data_row(conn: &Connection, actor_id: i64, row: &Data) -> Result<()> {
    conn.execute("DELETE FROM data WHERE id = ?1", params![row.id])?;
    ledger::record_deleted(conn, actor_id, Table::Data, row.id, &data_summary(row))
}

fn get_session(conn: &Connection, sql: &str, key: &str) -> Result<Option<Session>> {
    conn.query_row(sql, params![key], |row| {
        Ok(Session {
            id: row.get(0)?,
            token_hash: row.get(1)?,
            token_lookup: row.get(2)?,
            user_id: row.get(3)?,
            created_at: parse_datetime(&row.get::<_, String>(4)?),
            expires_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
            last_used_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
        })
    })
    .optional()
    .map_err(Error::from)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn select(&self, query: &Query) -> Result<Vec<Row>> {
        select_rows(&self.conn(), query)
    }

    // Attribute operations

    fn get_attr(&self, key: &str) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM attrs WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::from)
    }

    fn set_attr(&self, key: &str, value: &str) -> Result<String> {
        self.conn().execute(
            "INSERT INTO attrs (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(value.to_string())
    }

    // User operations

    fn create_user(&self, new: &NewUser, role: Role) -> Result<User> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let user = insert_user(&tx, new, role)?;
        tx.commit()?;
        Ok(user)
    }

    fn signup_user(&self, new: &NewUser, signup_key: Option<&str>) -> Result<User> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let current: Option<String> = tx
            .query_row(
                "SELECT value FROM attrs WHERE key = ?1",
                params![super::SIGNUP_KEY],
                |row| row.get(0),
            )
            .optional()?;

        let role = match (signup_key, current.as_deref()) {
            (Some(given), Some(current)) if given == current => Role::Verified,
            _ => Role::Unverified,
        };

        let user = insert_user(&tx, new, role)?;
        tx.commit()?;
        Ok(user)
    }

    fn update_user_role(&self, actor: &User, user_id: i64, role: Role) -> Result<Diff> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let current = row_by_id(&tx, Table::User, user_id)?;
        let diff = ledger::apply_patch(
            &tx,
            actor.id,
            Table::User,
            user_id,
            &current,
            &[(user::AUTH_LEVEL, Value::Integer(role.rank()))],
        )?;
        tx.commit()?;
        Ok(diff)
    }

    fn update_password(&self, actor: &User, user_id: i64, password_hash: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE users SET password = ?1 WHERE id = ?2",
            params![password_hash, user_id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }

        // Hashes stay out of the ledger; the row only records that a change happened.
        let change = Change {
            column: user::PASSWORD.name,
            old_value: None,
            new_value: None,
        };
        ledger::record_change(&tx, actor.id, Table::User, user_id, &change)?;

        tx.commit()?;
        Ok(())
    }

    fn has_admin(&self) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE auth_level >= ?1",
            params![Role::Admin.rank()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Citation operations

    fn create_citation(&self, actor: &User, new: &NewCitation) -> Result<Citation> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO citations (creator_id, authors, year, journal, doi, ads)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.creator_id,
                new.authors,
                new.year,
                new.journal,
                new.doi,
                new.ads,
            ],
        )
        .map_err(unique_violation("doi"))?;
        let id = tx.last_insert_rowid();
        ledger::record_created(&tx, actor.id, Table::Citation, id)?;

        tx.commit()?;

        Ok(Citation {
            id,
            creator_id: new.creator_id,
            authors: new.authors.clone(),
            year: new.year,
            journal: new.journal.clone(),
            doi: new.doi.clone(),
            ads: new.ads.clone(),
        })
    }

    fn update_citation(&self, actor: &User, id: i64, patch: &CitationPatch) -> Result<Diff> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let current = row_by_id(&tx, Table::Citation, id)?;
        let diff = ledger::apply_patch(
            &tx,
            actor.id,
            Table::Citation,
            id,
            &current,
            &citation_patch(patch),
        )
        .map_err(|e| match e {
            Error::Database(e) => unique_violation("doi")(e),
            e => e,
        })?;
        tx.commit()?;
        Ok(diff)
    }

    fn delete_citation(&self, actor: &User, id: i64) -> Result<Deletion> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let citation = Citation::from_row(&row_by_id(&tx, Table::Citation, id)?)?;
        let rows = select_rows(&tx, &Data::query().eq(data::CITATION_ID, id))?
            .iter()
            .map(|row| Data::from_row(row))
            .collect::<Result<Vec<_>>>()?;

        let mut deletion = Deletion::default();
        for row in &rows {
            delete_data_row(&tx, actor.id, row)?;
            deletion.data.push(row.id);
            deletion.edits += 1;
        }

        tx.execute("DELETE FROM citations WHERE id = ?1", params![id])?;
        ledger::record_deleted(&tx, actor.id, Table::Citation, id, &citation.doi)?;
        deletion.citations.push(id);
        deletion.edits += 1;

        tx.commit()?;
        Ok(deletion)
    }

    // Data operations

    fn create_data(&self, actor: &User, rows: &[NewData]) -> Result<Vec<Data>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut created = Vec::with_capacity(rows.len());

        for new in rows {
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT id FROM citations WHERE id = ?1",
                    params![new.citation_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(Error::NotFound);
            }

            tx.execute(
                "INSERT INTO data (citation_id, creator_id, sample_type, element)
                 VALUES (?1, ?2, ?3, ?4)",
                params![new.citation_id, new.creator_id, new.sample_type, new.element],
            )?;
            let id = tx.last_insert_rowid();
            ledger::record_created(&tx, actor.id, Table::Data, id)?;

            created.push(Data {
                id,
                citation_id: new.citation_id,
                creator_id: new.creator_id,
                sample_type: new.sample_type.clone(),
                element: new.element.clone(),
            });
        }

        tx.commit()?;
        Ok(created)
    }

    fn update_data(&self, actor: &User, id: i64, patch: &DataPatch) -> Result<Diff> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let current = row_by_id(&tx, Table::Data, id)?;
        let diff = ledger::apply_patch(&tx, actor.id, Table::Data, id, &current, &data_patch(patch))?;
        tx.commit()?;
        Ok(diff)
    }

    fn delete_data(&self, actor: &User, id: i64) -> Result<Deletion> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let row = Data::from_row(&row_by_id(&tx, Table::Data, id)?)?;
        delete_data_row(&tx, actor.id, &row)?;

        tx.commit()?;
        Ok(Deletion {
            citations: Vec::new(),
            data: vec![id],
            edits: 1,
        })
    }

    // Session operations

    fn create_session(&self, session: &Session) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO sessions (id, token_hash, token_lookup, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.id,
                session.token_hash,
                session.token_lookup,
                session.user_id,
                format_datetime(&session.created_at),
                session.expires_at.as_ref().map(format_datetime),
            ],
        );

        result.map(|_| ()).map_err(unique_violation("token_lookup"))
    }

    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>> {
        get_session(
            &self.conn(),
            "SELECT id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at
             FROM sessions WHERE token_lookup = ?1",
            lookup,
        )
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_session_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE sessions SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&chrono::Utc::now()), id],
        )?;
        Ok(())
    }
}
