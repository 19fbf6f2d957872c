use std::future::Future;

use sqlx::{Database, Pool, Row};

use crate::schema::ColumnDescriptor;

/// A trait that encapsulates everything driftwood needs from a database backend.
///
/// The seed tracker, the migrator and the schema differ are generic over this
/// trait; each backend supplies placeholder style, identifier quoting,
/// connection setup and column introspection.
pub trait SqlDialect: Database + Sized + Send + Sync {
    /// Human readable backend name used in log output.
    const BACKEND: &'static str;

    /// Returns the placeholder for the `n`-th parameter in a query (e.g., "?" or "$1").
    fn placeholder(n: usize) -> String;

    /// Quotes an identifier (table/column name).
    fn quote_identifier(ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    /// Wraps an expression so it decodes as text on this backend.
    fn cast_to_text(expr: &str) -> String {
        format!("CAST({} AS TEXT)", expr)
    }

    /// Opens a pool for `url`.
    fn connect(url: &str) -> impl Future<Output = Result<Pool<Self>, sqlx::Error>> + Send;

    /// Executes one statement with text parameters; returns affected rows.
    fn execute(
        pool: &Pool<Self>,
        sql: &str,
        params: &[&str],
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;

    /// Runs a query whose selected columns all decode as nullable text.
    fn fetch_text_rows(
        pool: &Pool<Self>,
        sql: &str,
        params: &[&str],
    ) -> impl Future<Output = Result<Vec<Vec<Option<String>>>, sqlx::Error>> + Send;

    /// Lists the live columns of `table` in ordinal order. An absent table yields no rows.
    fn table_columns(
        pool: &Pool<Self>,
        table: &str,
    ) -> impl Future<Output = Result<Vec<ColumnDescriptor>, sqlx::Error>> + Send;
}

macro_rules! text_io {
    () => {
        async fn execute(
            pool: &Pool<Self>,
            sql: &str,
            params: &[&str],
        ) -> Result<u64, sqlx::Error> {
            if params.is_empty() {
                // unprepared, so statements the server cannot prepare still run
                return Ok(sqlx::Executor::execute(pool, sql).await?.rows_affected());
            }
            let mut query = sqlx::query::<Self>(sql);
            for param in params {
                query = query.bind(*param);
            }
            Ok(query.execute(pool).await?.rows_affected())
        }

        async fn fetch_text_rows(
            pool: &Pool<Self>,
            sql: &str,
            params: &[&str],
        ) -> Result<Vec<Vec<Option<String>>>, sqlx::Error> {
            let mut query = sqlx::query::<Self>(sql);
            for param in params {
                query = query.bind(*param);
            }
            let rows = query.fetch_all(pool).await?;
            rows.iter()
                .map(|row| {
                    (0..row.len())
                        .map(|i| row.try_get::<Option<String>, _>(i))
                        .collect()
                })
                .collect()
        }
    };
}

#[cfg(any(feature = "mysql", feature = "postgres"))]
fn cell(row: &mut [Option<String>], i: usize) -> Option<String> {
    row.get_mut(i).and_then(Option::take)
}

#[cfg(feature = "sqlite")]
impl SqlDialect for sqlx::Sqlite {
    const BACKEND: &'static str = "sqlite";

    fn placeholder(_n: usize) -> String {
        "?".to_owned()
    }

    async fn connect(url: &str) -> Result<Pool<Self>, sqlx::Error> {
        use std::str::FromStr;

        let options = sqlx::sqlite::SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // in-memory databases are per connection
        sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
    }

    text_io!();

    async fn table_columns(
        pool: &Pool<Self>,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>, sqlx::Error> {
        let pragma_sql = format!("PRAGMA table_info({})", Self::quote_identifier(table));
        let rows: Vec<(i64, String, String, i64, Option<String>, i64)> =
            sqlx::query_as(&pragma_sql).fetch_all(pool).await?;

        Ok(rows
            .into_iter()
            .map(|(_cid, name, sql_type, notnull, default_value, pk)| {
                let is_pk = pk > 0;
                ColumnDescriptor {
                    name,
                    sql_type,
                    nullable: !is_pk && notnull == 0,
                    default_value,
                    key: if is_pk { "PRI".to_owned() } else { String::new() },
                    extra: String::new(),
                }
            })
            .collect())
    }
}

#[cfg(feature = "mysql")]
impl SqlDialect for sqlx::MySql {
    const BACKEND: &'static str = "mysql";

    fn placeholder(_n: usize) -> String {
        "?".to_owned()
    }

    fn cast_to_text(expr: &str) -> String {
        format!("CAST({} AS CHAR)", expr)
    }

    async fn connect(url: &str) -> Result<Pool<Self>, sqlx::Error> {
        sqlx::mysql::MySqlPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
    }

    text_io!();

    async fn table_columns(
        pool: &Pool<Self>,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>, sqlx::Error> {
        let sql = format!(
            "SELECT {}, {}, {}, {}, {}, {} FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION",
            Self::cast_to_text("COLUMN_NAME"),
            Self::cast_to_text("COLUMN_TYPE"),
            Self::cast_to_text("IS_NULLABLE"),
            Self::cast_to_text("COLUMN_KEY"),
            Self::cast_to_text("COLUMN_DEFAULT"),
            Self::cast_to_text("EXTRA"),
        );
        let rows = Self::fetch_text_rows(pool, &sql, &[table]).await?;
        Ok(rows
            .into_iter()
            .map(|mut row| ColumnDescriptor {
                name: cell(&mut row, 0).unwrap_or_default(),
                sql_type: cell(&mut row, 1).unwrap_or_default(),
                nullable: cell(&mut row, 2).is_some_and(|v| v.eq_ignore_ascii_case("YES")),
                key: cell(&mut row, 3).unwrap_or_default(),
                default_value: cell(&mut row, 4),
                extra: cell(&mut row, 5).unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(feature = "postgres")]
impl SqlDialect for sqlx::Postgres {
    const BACKEND: &'static str = "postgres";

    fn placeholder(n: usize) -> String {
        format!("${}", n)
    }

    fn quote_identifier(ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    async fn connect(url: &str) -> Result<Pool<Self>, sqlx::Error> {
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
    }

    text_io!();

    async fn table_columns(
        pool: &Pool<Self>,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>, sqlx::Error> {
        let primary_keys = Self::fetch_text_rows(
            pool,
            "SELECT a.attname::text FROM pg_index i JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) WHERE i.indrelid = to_regclass($1) AND i.indisprimary",
            &[table],
        )
        .await?
        .into_iter()
        .filter_map(|mut row| cell(&mut row, 0))
        .collect::<Vec<_>>();

        let rows = Self::fetch_text_rows(
            pool,
            "SELECT column_name::text, \
             CASE WHEN character_maximum_length IS NOT NULL \
                  THEN data_type::text || '(' || character_maximum_length::text || ')' \
                  ELSE data_type::text END, \
             is_nullable::text, column_default::text \
             FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 ORDER BY ordinal_position",
            &[table],
        )
        .await?;

        Ok(rows
            .into_iter()
            .map(|mut row| {
                let name = cell(&mut row, 0).unwrap_or_default();
                let is_pk = primary_keys.contains(&name);
                ColumnDescriptor {
                    sql_type: cell(&mut row, 1).unwrap_or_default(),
                    nullable: !is_pk && cell(&mut row, 2).is_some_and(|v| v == "YES"),
                    default_value: cell(&mut row, 3),
                    key: if is_pk { "PRI".to_owned() } else { String::new() },
                    extra: String::new(),
                    name,
                }
            })
            .collect())
    }
}
