use sqlx::Pool;

use crate::dialect::SqlDialect;
use crate::diff::{ChangeDescriptor, diff_table};
use crate::error::{DriftError, DriftResult};
use crate::model::ModelDef;

/// Metadata about a live database column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// The name of the column.
    pub name: String,
    /// The SQL type as reported by the database (e.g., "varchar(100)", "INTEGER").
    pub sql_type: String,
    /// Whether the column can contain NULL values.
    pub nullable: bool,
    /// The default as reported by the database, if any.
    pub default_value: Option<String>,
    /// Key flag (`PRI`, `UNI`, `MUL` or empty).
    pub key: String,
    /// Extra flags such as `auto_increment`.
    pub extra: String,
}

/// Diffs declared models against the live schema behind a pool.
pub struct SchemaDiffer<DB: SqlDialect> {
    pool: Pool<DB>,
}

impl<DB: SqlDialect> SchemaDiffer<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }

    /// Introspects one table. An absent table yields an empty list.
    pub async fn live_columns(&self, table: &str) -> DriftResult<Vec<ColumnDescriptor>> {
        DB::table_columns(&self.pool, table)
            .await
            .map_err(|err| DriftError::introspection(table, err))
    }

    /// Changes needed to bring `model`'s table in line with its declaration.
    pub async fn diff_model(&self, model: &ModelDef) -> DriftResult<Vec<ChangeDescriptor>> {
        let columns = self.live_columns(&model.table).await?;
        if columns.is_empty() {
            tracing::debug!(table = %model.table, "table not found; treating as empty");
        }
        let changes = diff_table(&model.table, &model.descriptors(), &columns);
        tracing::info!(
            operation = "schema_diff",
            backend = DB::BACKEND,
            model = %model.name,
            table = %model.table,
            changes = changes.len(),
            "driftwood diff"
        );
        Ok(changes)
    }

    /// Diffs every model in order and concatenates the results.
    pub async fn diff_models(&self, models: &[ModelDef]) -> DriftResult<Vec<ChangeDescriptor>> {
        let mut changes = Vec::new();
        for model in models {
            println!(">> Analyzing {} model...", model.name);
            changes.extend(self.diff_model(model).await?);
        }
        println!("[INFO] Total changes detected: {}", changes.len());
        Ok(changes)
    }
}
