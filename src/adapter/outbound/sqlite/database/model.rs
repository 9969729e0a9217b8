//! Database model types for Diesel ORM.

use diesel::prelude::*;

use super::schema::load_test;
use crate::domain::Row;

/// Columns read back by the workload.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = load_test)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LoadRow {
    pub id: i64,
    pub thread_id: String,
    pub random_data: Option<String>,
}

impl From<LoadRow> for Row {
    fn from(row: LoadRow) -> Self {
        Self {
            id: row.id,
            worker: row.thread_id,
            payload: row.random_data.unwrap_or_default(),
        }
    }
}

/// A row to insert.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = load_test)]
pub struct NewLoadRow<'a> {
    pub thread_id: &'a str,
    pub value_col: String,
    pub random_data: &'a str,
    pub created_at: String,
}

impl<'a> NewLoadRow<'a> {
    #[must_use]
    pub fn new(worker: &'a str, payload: &'a str, created_at: String) -> Self {
        Self {
            thread_id: worker,
            value_col: format!("TEST_{worker}"),
            random_data: payload,
            created_at,
        }
    }
}

#[derive(QueryableByName)]
pub struct LastInsertRowId {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    #[diesel(column_name = "id")]
    pub id: i64,
}
