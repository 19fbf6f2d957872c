use driftwood_core::diff::ChangeKind;
use driftwood_core::model::{FieldKind, ModelSchema};
use driftwood_core::test_utils::MockDatabase;
use driftwood_core::types::FieldType;
use driftwood_core::{SchemaDiffer, schema_models};
use driftwood_macros::Model;

#[allow(dead_code)]
#[derive(Model, Debug)]
struct Audit {
    created_by: Option<String>,
    #[driftwood(tag = "size:64")]
    updated_by: String,
}

#[allow(dead_code)]
#[derive(Model, Debug)]
#[has_many(Comment)]
struct BlogArticle {
    #[driftwood(tag = "primary_key")]
    id: u64,
    #[driftwood(tag = "size:200")]
    title: String,
    #[serde(rename = "body_text")]
    content: String,
    views: Option<i32>,
    published_at: Option<chrono::NaiveDateTime>,
    #[driftwood(embed)]
    audit: Audit,
    #[has_many(Comment)]
    comments: Vec<Comment>,
    #[driftwood(ignore)]
    cached_score: f64,
}

#[allow(dead_code)]
#[derive(Model, Debug)]
#[driftwood(table = "blog_comments")]
struct Comment {
    id: i64,
    #[driftwood(column = "article_ref")]
    article_id: u64,
    #[belongs_to(BlogArticle)]
    article: Option<Box<BlogArticle>>,
}

#[test]
fn derive_model_generates_definition() {
    let def = BlogArticle::model_def();
    assert_eq!(def.name, "BlogArticle");
    assert_eq!(def.table, "blog_article");

    let names: Vec<&str> = def.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["id", "title", "content", "views", "published_at", "audit", "comments"]
    );
    assert_eq!(def.fields[6].kind, FieldKind::Collection);
}

#[test]
fn derive_model_flattens_embedded_fields() {
    let descriptors = BlogArticle::model_def().descriptors();
    let columns: Vec<&str> = descriptors.iter().map(|d| d.db_name.as_str()).collect();
    assert_eq!(
        columns,
        vec![
            "id",
            "title",
            "body_text",
            "views",
            "published_at",
            "created_by",
            "updated_by"
        ]
    );
    assert_eq!(descriptors[1].size_hint, Some(200));
    assert!(!descriptors[1].nullable);
    assert!(descriptors[3].nullable);
    assert_eq!(
        descriptors[4].declared_type,
        FieldType::Nullable(Box::new(FieldType::Timestamp))
    );
}

#[test]
fn derive_model_honours_table_and_column_overrides() {
    let def = Comment::model_def();
    assert_eq!(def.table, "blog_comments");
    let descriptors = def.descriptors();
    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[1].db_name, "article_ref");
    assert_eq!(def.fields[2].kind, FieldKind::OptionalRef);
}

#[allow(dead_code)]
#[derive(Model, Debug)]
struct Tag {
    id: i64,
    name: String,
}

#[allow(dead_code)]
#[derive(Model, Debug)]
struct TaggedArticle {
    id: i64,
    tag_id: i64,
    tag: Tag,
    previous_tag: Option<Tag>,
    published_at: chrono::NaiveDateTime,
}

#[test]
fn model_typed_fields_are_relationships() {
    let def = TaggedArticle::model_def();
    assert_eq!(def.fields[2].kind, FieldKind::Composite);
    assert_eq!(def.fields[3].kind, FieldKind::OptionalRef);

    let columns: Vec<String> = def.descriptors().into_iter().map(|d| d.db_name).collect();
    assert_eq!(columns, vec!["id", "tag_id", "published_at"]);
}

#[tokio::test]
async fn derived_models_diff_against_sqlite() {
    let db = MockDatabase::new_sqlite().await.unwrap();
    driftwood_core::sqlx::query(
        "CREATE TABLE blog_comments (id INTEGER PRIMARY KEY, article_ref BIGINT UNSIGNED, spam_score REAL, updated_at DATETIME)",
    )
    .execute(db.pool())
    .await
    .unwrap();
    let differ = SchemaDiffer::new(db.into_pool());

    let changes = differ
        .diff_models(&schema_models![BlogArticle, Comment])
        .await
        .unwrap();
    let article_adds = changes
        .iter()
        .filter(|c| c.table == "blog_article" && c.kind == ChangeKind::AddColumn)
        .count();
    assert_eq!(article_adds, 7);

    let comment_changes: Vec<_> = changes
        .iter()
        .filter(|c| c.table == "blog_comments" && c.kind != ChangeKind::ModifyColumn)
        .collect();
    assert_eq!(comment_changes.len(), 1);
    assert_eq!(comment_changes[0].kind, ChangeKind::DropColumn);
    assert_eq!(comment_changes[0].column, "spam_score");
}
