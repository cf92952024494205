//! Query execution seam between collectors and the database.
//!
//! Collectors never assume a fixed result schema: every call returns the
//! column names the server actually sent, and values are looked up by name.
//! Columns that are missing on a given server version simply yield nothing.

use anyhow::{Result, anyhow};
use futures::future::BoxFuture;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Executor, MySqlPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info_span};
use tracing_futures::Instrument as _;

/// Anything that can run a status query and hand back raw text rows.
pub trait QueryExecutor: Send + Sync {
    /// Execute `sql` and return every row.
    fn query<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<RowSet>>;
}

/// Column names of one result set, in server order, with a name index.
#[derive(Debug, Default)]
struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // First occurrence wins when a server repeats a column name.
            index.entry(name.clone()).or_insert(i);
        }
        Self { names, index }
    }
}

/// Rows returned by one query. Values are raw text, `None` for SQL `NULL`.
#[derive(Clone, Debug, Default)]
pub struct RowSet {
    columns: Arc<Columns>,
    rows: Vec<RawRow>,
}

impl RowSet {
    /// Empty result set with the given column names.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Arc::new(Columns::new(columns.into_iter().map(Into::into).collect())),
            rows: Vec::new(),
        }
    }

    /// Append a row. Values are matched to columns by position.
    #[must_use]
    pub fn with_row<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.push_row(values.into_iter().map(|v| v.map(Into::into)).collect());
        self
    }

    fn push_row(&mut self, values: Vec<Option<String>>) {
        self.rows.push(RawRow {
            columns: Arc::clone(&self.columns),
            values,
        });
    }

    fn from_mysql_rows(rows: &[MySqlRow]) -> Self {
        let Some(first) = rows.first() else {
            return Self::default();
        };

        let mut set = Self::new(first.columns().iter().map(|c| c.name().to_string()));

        for row in rows {
            let values = (0..row.len())
                .map(|idx| match row.try_get_unchecked::<Option<String>, _>(idx) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!(column = idx, error = %e, "could not decode column as text");
                        None
                    }
                })
                .collect();
            set.push_row(values);
        }

        set
    }

    /// Column names in the order the server returned them.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns.names
    }

    #[must_use]
    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One result row, addressable by column name.
#[derive(Clone, Debug)]
pub struct RawRow {
    columns: Arc<Columns>,
    values: Vec<Option<String>>,
}

impl RawRow {
    /// Value of `column`, `None` when the column does not exist in this
    /// result set or is `NULL`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .index
            .get(column)
            .and_then(|&idx| self.values.get(idx))
            .and_then(Option::as_deref)
    }

    /// First column of `candidates` present in the row, or `""`.
    ///
    /// Used for label values, which degrade to empty rather than failing.
    #[must_use]
    pub fn get_or_empty(&self, candidates: &[&str]) -> &str {
        candidates
            .iter()
            .find_map(|c| self.get(c))
            .unwrap_or_default()
    }

    /// `(column, value)` pairs in server order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let value = self.values.get(idx).and_then(Option::as_deref);
                (name.as_str(), value)
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl QueryExecutor for MySqlPool {
    fn query<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<RowSet>> {
        Box::pin(async move {
            let span = info_span!(
                "db.query",
                db.system = "mysql",
                db.statement = sql,
                otel.kind = "client"
            );

            // A plain &str runs through the text protocol, so every value
            // decodes as a string regardless of its column type.
            let rows = self.fetch_all(sql).instrument(span).await?;

            Ok(RowSet::from_mysql_rows(&rows))
        })
    }
}

/// Run the first query variant the server accepts.
///
/// Each query is tried as-is; if it fails, each suffix is appended in turn.
/// Returns the last error when no combination succeeds. Nothing is cached, so
/// a server upgrade or failover is picked up on the next scrape.
///
/// # Errors
///
/// Returns the last execution error if every combination fails.
pub async fn query_with_fallback(
    db: &dyn QueryExecutor,
    queries: &[&str],
    suffixes: &[&str],
) -> Result<RowSet> {
    let mut last_err = anyhow!("no query to execute");

    for query in queries {
        match db.query(query).await {
            Ok(rows) => return Ok(rows),
            Err(e) => {
                debug!(query, error = %e, "query failed, trying suffixes");
                last_err = e;
            }
        }

        for suffix in suffixes {
            let sql = format!("{query}{suffix}");
            match db.query(&sql).await {
                Ok(rows) => return Ok(rows),
                Err(e) => {
                    debug!(query = %sql, error = %e, "query variant failed");
                    last_err = e;
                }
            }
        }
    }

    Err(last_err)
}
