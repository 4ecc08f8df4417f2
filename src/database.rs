//! Database initialization and table definitions
//!
//! This module handles the setup of the embedded redb database, defines the
//! tables, and provides the small JSON helpers the catalog and circulation
//! modules build on. Every mutation in the service runs inside a single
//! write transaction; redb serializes writers, so a read-check-mutate
//! sequence cannot interleave with another one.

use rand::{distr::Alphanumeric, Rng};
use redb::{Database, ReadableTable, Table, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::error::LibraryResult;

/// Book catalog
///
/// Key: book id
/// Value: JSON-serialized Book
pub const TABLE_BOOKS: TableDefinition<&str, &str> = TableDefinition::new("books_v1");

/// Physical copies, grouped by book
///
/// Key: composite `"{book_id}:{copy_id}"`, so all copies of one book sit in
/// a single key range
/// Value: JSON-serialized BookCopy
pub const TABLE_COPIES: TableDefinition<&str, &str> = TableDefinition::new("book_copies_v1");

/// Issue requests
///
/// Key: request id
/// Value: JSON-serialized IssueRequest
pub const TABLE_REQUESTS: TableDefinition<&str, &str> = TableDefinition::new("issue_requests_v1");

/// Secondary index of issue requests per user
///
/// Key: `"{user_id}:{requested_at_micros}:{request_id}"`
/// Value: request id
///
/// The timestamp keeps a user's requests in chronological order.
pub const TABLE_USER_REQUESTS: TableDefinition<&str, &str> =
    TableDefinition::new("user_requests_v1");

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe reference to the embedded database
    pub db: Arc<Database>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        AppState {
            db: Arc::new(db),
            config: Arc::new(config),
        }
    }
}

/// Creates or opens the database file and makes sure every table exists
///
/// # Example
///
/// ```no_run
/// # use bookdesk::database::init_db;
/// let db = init_db("library.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_BOOKS)?;
        write_txn.open_table(TABLE_COPIES)?;
        write_txn.open_table(TABLE_REQUESTS)?;
        write_txn.open_table(TABLE_USER_REQUESTS)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Random 12-character alphanumeric identifier
pub fn new_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

/// Composite key `"{group}:{id}"`
pub fn group_key(group: &str, id: &str) -> String {
    format!("{}:{}", group, id)
}

pub(crate) fn load<T, R>(table: &R, key: &str) -> LibraryResult<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static str>,
{
    match table.get(key)? {
        Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
        None => Ok(None),
    }
}

pub(crate) fn store<T: Serialize>(
    table: &mut Table<'_, &'static str, &'static str>,
    key: &str,
    value: &T,
) -> LibraryResult<()> {
    let json = serde_json::to_string(value)?;
    table.insert(key, json.as_str())?;
    Ok(())
}

/// Raw values of every key starting with `"{group}:"`, in key order
pub(crate) fn group_values<R>(table: &R, group: &str) -> LibraryResult<Vec<String>>
where
    R: ReadableTable<&'static str, &'static str>,
{
    // '{' sorts right after ':', so this bounds the group's key range
    let start_key = format!("{}:", group);
    let end_key = format!("{}:{{", group);

    let mut values = Vec::new();
    for entry in table.range(start_key.as_str()..end_key.as_str())? {
        let (_, value) = entry?;
        values.push(value.value().to_string());
    }
    Ok(values)
}

/// Deserialized records of one key group
pub(crate) fn load_group<T, R>(table: &R, group: &str) -> LibraryResult<Vec<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static str>,
{
    group_values(table, group)?
        .iter()
        .map(|json| serde_json::from_str(json).map_err(Into::into))
        .collect()
}

pub(crate) fn load_all<T, R>(table: &R) -> LibraryResult<Vec<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static str>,
{
    let mut records = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        records.push(serde_json::from_str(value.value())?);
    }
    Ok(records)
}
