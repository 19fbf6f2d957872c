pub use sqlx;

pub mod prelude {
    pub use crate::{
        DriftError, DriftResult, FieldDef, FieldType, MigrationScript, MigrationWriter, ModelDef,
        ModelSchema, SchemaDiffer, SeedOrchestrator, Settings, SqlDialect,
    };
}

pub mod config;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod migrator;
pub mod model;
pub mod schema;
pub mod seed;
pub mod sqlgen;
pub mod statements;
pub mod types;
pub mod version;
pub mod writer;

#[doc(hidden)]
pub mod test_utils;

pub use config::Settings;
pub use dialect::SqlDialect;
pub use diff::{AUDIT_COLUMNS, ChangeDescriptor, ChangeKind, diff_table, is_type_compatible};
pub use error::{DriftError, DriftResult};
pub use migrator::{Migration, Migrator, load_migrations};
pub use model::{FieldDef, FieldKind, FieldTag, ModelDef, ModelFieldDescriptor, ModelSchema};
pub use schema::{ColumnDescriptor, SchemaDiffer};
pub use seed::{
    ApplyReport, ManualReport, SeedCatalog, SeedOrchestrator, SeedPhase, SeedStatus, SeedTracker,
};
pub use types::{FieldType, map_type};
pub use writer::{MigrationScript, MigrationWriter, WrittenMigration};

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct BlogArticle;

    impl ModelSchema for BlogArticle {
        fn model_def() -> ModelDef {
            ModelDef::new("BlogArticle", "blog_article")
                .field(FieldDef::scalar("id", FieldType::UInt64).tag("primary_key"))
                .field(FieldDef::scalar("title", FieldType::String).tag("size:200"))
        }
    }

    #[test]
    fn schema_models_collects_definitions() {
        let models = schema_models![BlogArticle];
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].table, "blog_article");
        let descriptors = models[0].descriptors();
        assert_eq!(descriptors[1].db_name, "title");
        assert_eq!(descriptors[1].size_hint, Some(200));
    }
}
