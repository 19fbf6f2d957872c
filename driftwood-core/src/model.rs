use crate::types::FieldType;

/// How a declared field takes part in the table layout.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A plain column.
    Scalar(FieldType),
    /// A mixed-in block whose fields are flattened into the parent table.
    Embedded(Vec<FieldDef>),
    /// `Vec<T>`, maps and sets: a has-many relationship.
    Collection,
    /// A nested record that is not flattened: a belongs-to relationship.
    Composite,
    /// `Option<Box<T>>` or an optional relation to a record.
    OptionalRef,
}

/// One declared field of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// The field name as written in the model.
    pub name: String,
    /// Column, embedded block or relationship.
    pub kind: FieldKind,
    /// Explicit column name annotation.
    pub column: Option<String>,
    /// Serialization name, possibly carrying trailing options (`"title,omitempty"`).
    pub serde_name: Option<String>,
    /// `;`-separated annotation string, e.g. `"size:200;not null"`.
    pub tag: String,
}

impl FieldDef {
    pub fn scalar(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::with_kind(name, FieldKind::Scalar(field_type))
    }

    pub fn embedded(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self::with_kind(name, FieldKind::Embedded(fields))
    }

    pub fn relation(name: impl Into<String>, kind: FieldKind) -> Self {
        Self::with_kind(name, kind)
    }

    fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            column: None,
            serde_name: None,
            tag: String::new(),
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn serde_name(mut self, name: impl Into<String>) -> Self {
        self.serde_name = Some(name.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Column name: explicit annotation, then serialization name, then snake_case.
    pub fn db_name(&self) -> String {
        let tag = FieldTag::parse(&self.tag);
        if let Some(column) = self.column.as_ref().or(tag.column.as_ref()) {
            return column.trim().to_owned();
        }
        if let Some(serde_name) = self.serde_name.as_deref() {
            let stripped = serde_name.split(',').next().unwrap_or_default().trim();
            if !stripped.is_empty() && stripped != "-" {
                return stripped.to_owned();
            }
        }
        to_snake_case(&self.name)
    }
}

/// A model's declared table layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDef {
    /// Model (struct) name.
    pub name: String,
    /// Table the model is stored in.
    pub table: String,
    /// Declared fields in declaration order.
    pub fields: Vec<FieldDef>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Replaces the table name, e.g. to apply a configured prefix.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Flattens embedded blocks, drops relationships and unnamed columns.
    pub fn descriptors(&self) -> Vec<ModelFieldDescriptor> {
        let mut out = Vec::new();
        collect_descriptors(&self.fields, &mut out);
        out
    }
}

fn collect_descriptors(fields: &[FieldDef], out: &mut Vec<ModelFieldDescriptor>) {
    for field in fields {
        match &field.kind {
            FieldKind::Embedded(inner) => collect_descriptors(inner, out),
            FieldKind::Collection | FieldKind::Composite | FieldKind::OptionalRef => {}
            FieldKind::Scalar(field_type) => {
                let db_name = field.db_name();
                if db_name.is_empty() || db_name == "-" {
                    continue;
                }
                let tag = FieldTag::parse(&field.tag);
                out.push(ModelFieldDescriptor {
                    logical_name: field.name.clone(),
                    db_name,
                    declared_type: field_type.clone(),
                    size_hint: tag.size,
                    nullable: field_type.is_nullable() && !tag.not_null,
                    default_literal: tag.default,
                    comment: tag.comment,
                });
            }
        }
    }
}

/// A retained model field in comparable form.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFieldDescriptor {
    pub logical_name: String,
    /// Never empty and never `-`.
    pub db_name: String,
    pub declared_type: FieldType,
    pub size_hint: Option<u32>,
    pub nullable: bool,
    pub default_literal: Option<String>,
    pub comment: Option<String>,
}

/// Parsed field annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTag {
    pub not_null: bool,
    pub primary_key: bool,
    pub index: bool,
    pub unique: bool,
    pub size: Option<u32>,
    pub default: Option<String>,
    pub comment: Option<String>,
    pub column: Option<String>,
}

impl FieldTag {
    /// Parses `;`-separated tokens. Unknown tokens are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut tag = FieldTag::default();
        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            if part.eq_ignore_ascii_case("not null") {
                tag.not_null = true;
            } else if part.eq_ignore_ascii_case("primary_key") {
                tag.primary_key = true;
                tag.not_null = true;
            } else if part.eq_ignore_ascii_case("index") {
                tag.index = true;
            } else if part.eq_ignore_ascii_case("unique") {
                tag.unique = true;
            } else if let Some(size) = part.strip_prefix("size:") {
                if let Ok(size) = size.trim().parse::<u32>() {
                    tag.size = Some(size).filter(|s| *s > 0);
                }
            } else if let Some(default) = part.strip_prefix("default:") {
                tag.default = Some(default.to_owned());
            } else if let Some(comment) = part.strip_prefix("comment:") {
                tag.comment = Some(comment.to_owned());
            } else if let Some(column) = part.strip_prefix("column:") {
                tag.column = Some(column.trim().to_owned());
            }
        }
        tag
    }
}

/// A type that can describe its own table layout.
///
/// Usually implemented with `#[derive(Model)]`.
pub trait ModelSchema {
    fn model_def() -> ModelDef;
}

/// Field classification helpers for `#[derive(Model)]`.
///
/// `(&KindOf::<T>::new()).record_kind(optional)` resolves to [`ModelRecord`]
/// when `T: ModelSchema` and to [`PlainColumn`] otherwise, so a field typed as
/// another model becomes a relationship instead of a column.
#[doc(hidden)]
pub mod field_kind {
    use std::marker::PhantomData;

    use super::{FieldKind, ModelSchema};

    pub struct KindOf<T: ?Sized>(PhantomData<T>);

    impl<T: ?Sized> KindOf<T> {
        #[allow(clippy::new_without_default)]
        pub const fn new() -> Self {
            Self(PhantomData)
        }
    }

    pub trait ModelRecord {
        fn record_kind(&self, optional: bool) -> Option<FieldKind> {
            Some(if optional {
                FieldKind::OptionalRef
            } else {
                FieldKind::Composite
            })
        }
    }

    impl<T: ModelSchema + ?Sized> ModelRecord for KindOf<T> {}

    pub trait PlainColumn {
        fn record_kind(&self, _optional: bool) -> Option<FieldKind> {
            None
        }
    }

    impl<T: ?Sized> PlainColumn for &KindOf<T> {}
}

/// Helper macro to collect model definitions from multiple models.
#[macro_export]
macro_rules! schema_models {
    ($($model:ty),+ $(,)?) => {
        vec![$(<$model as $crate::model::ModelSchema>::model_def()),+]
    };
}

/// `ArticleTag` -> `article_tag`, `UserID` -> `user_id`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p == '_' => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
