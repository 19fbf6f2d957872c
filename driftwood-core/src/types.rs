use std::fmt;
use std::str::FromStr;

/// Declared type of a model field, independent of any database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Bool,
    Float32,
    Float64,
    String,
    Timestamp,
    /// `Option<T>` and other nullable wrappers around a primitive.
    Nullable(Box<FieldType>),
    /// Anything the mapper does not recognize; maps to `VARCHAR(255)`.
    Other(String),
}

impl FieldType {
    /// Parses a type name as written in Rust source (`i64`, `Option<String>`,
    /// `chrono::NaiveDateTime`) or in short form (`int64`, `string`, `bool`).
    pub fn from_type_name(name: &str) -> Self {
        let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        let compact = compact.trim_start_matches('&');

        if let Some(inner) = generic_argument(compact, "Option") {
            return FieldType::Nullable(Box::new(FieldType::from_type_name(inner)));
        }

        let last = compact
            .split('<')
            .next()
            .and_then(|path| path.rsplit("::").next())
            .unwrap_or(compact);

        match last {
            "i8" | "int8" => FieldType::Int8,
            "i16" | "int16" => FieldType::Int16,
            "i32" | "int32" | "int" => FieldType::Int32,
            "i64" | "int64" | "isize" => FieldType::Int64,
            "u8" | "uint8" => FieldType::UInt8,
            "u16" | "uint16" => FieldType::UInt16,
            "u32" | "uint32" | "uint" => FieldType::UInt32,
            "u64" | "uint64" | "usize" => FieldType::UInt64,
            "bool" => FieldType::Bool,
            "f32" | "float32" => FieldType::Float32,
            "f64" | "float64" => FieldType::Float64,
            "String" | "str" | "string" => FieldType::String,
            "DateTime" | "NaiveDateTime" | "NaiveDate" | "OffsetDateTime" | "PrimitiveDateTime"
            | "SystemTime" | "time" | "Time" => FieldType::Timestamp,
            _ => FieldType::Other(compact.to_owned()),
        }
    }

    /// The type with any nullable wrapper removed.
    pub fn base(&self) -> &FieldType {
        match self {
            FieldType::Nullable(inner) => inner.base(),
            other => other,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, FieldType::Nullable(_))
    }

    /// Integers, floats and booleans: their defaults render unquoted.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.base(),
            FieldType::Int8
                | FieldType::Int16
                | FieldType::Int32
                | FieldType::Int64
                | FieldType::UInt8
                | FieldType::UInt16
                | FieldType::UInt32
                | FieldType::UInt64
                | FieldType::Float32
                | FieldType::Float64
                | FieldType::Bool
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self.base(), FieldType::String)
    }

    /// Default supplied to a NOT NULL column that declares none, so the
    /// forward statement also works on a populated table.
    pub fn implicit_default(&self) -> Option<&'static str> {
        if self.is_text() {
            Some("''")
        } else if self.is_numeric() {
            Some("0")
        } else {
            None
        }
    }
}

impl FromStr for FieldType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FieldType::from_type_name(s))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int8 => write!(f, "i8"),
            FieldType::Int16 => write!(f, "i16"),
            FieldType::Int32 => write!(f, "i32"),
            FieldType::Int64 => write!(f, "i64"),
            FieldType::UInt8 => write!(f, "u8"),
            FieldType::UInt16 => write!(f, "u16"),
            FieldType::UInt32 => write!(f, "u32"),
            FieldType::UInt64 => write!(f, "u64"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Float32 => write!(f, "f32"),
            FieldType::Float64 => write!(f, "f64"),
            FieldType::String => write!(f, "String"),
            FieldType::Timestamp => write!(f, "DateTime"),
            FieldType::Nullable(inner) => write!(f, "Option<{}>", inner),
            FieldType::Other(name) => write!(f, "{}", name),
        }
    }
}

fn generic_argument<'a>(ty: &'a str, wrapper: &str) -> Option<&'a str> {
    let start = ty.find('<')?;
    let head = &ty[..start];
    if head.rsplit("::").next() != Some(wrapper) || !ty.ends_with('>') {
        return None;
    }
    Some(&ty[start + 1..ty.len() - 1])
}

/// Maps a declared type to a MySQL column type.
///
/// Strings are sized by, in order: an explicit `size_hint` (a hint of `0`
/// counts as absent), a heuristic on the lower-cased field name, and finally
/// `VARCHAR(255)`. Unrecognized types also fall back to `VARCHAR(255)`.
pub fn map_type(field_type: &FieldType, size_hint: Option<u32>, field_name: &str) -> String {
    match field_type.base() {
        FieldType::String => string_column_type(size_hint, field_name),
        FieldType::Int8 => "TINYINT".to_owned(),
        FieldType::Int16 => "SMALLINT".to_owned(),
        FieldType::Int32 => "INT".to_owned(),
        FieldType::Int64 => "BIGINT".to_owned(),
        FieldType::UInt8 => "TINYINT UNSIGNED".to_owned(),
        FieldType::UInt16 => "SMALLINT UNSIGNED".to_owned(),
        FieldType::UInt32 => "INT UNSIGNED".to_owned(),
        FieldType::UInt64 => "BIGINT UNSIGNED".to_owned(),
        FieldType::Bool => "TINYINT(1)".to_owned(),
        FieldType::Float32 => "FLOAT".to_owned(),
        FieldType::Float64 => "DOUBLE".to_owned(),
        FieldType::Timestamp => "DATETIME".to_owned(),
        FieldType::Nullable(_) | FieldType::Other(_) => "VARCHAR(255)".to_owned(),
    }
}

/// Column type for a string field.
pub fn string_column_type(size_hint: Option<u32>, field_name: &str) -> String {
    if let Some(size) = size_hint.filter(|s| *s > 0) {
        return if size > 65_535 {
            "LONGTEXT".to_owned()
        } else if size > 255 {
            "TEXT".to_owned()
        } else {
            format!("VARCHAR({})", size)
        };
    }

    let name = field_name.to_lowercase();
    NAME_HINTS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| name.contains(n)))
        .map(|(_, ty)| *ty)
        .unwrap_or("VARCHAR(255)")
        .to_owned()
}

/// Checked in order; the first matching substring decides.
const NAME_HINTS: &[(&[&str], &str)] = &[
    (&["content", "description", "body"], "TEXT"),
    (&["password"], "VARCHAR(100)"),
    (&["username", "name"], "VARCHAR(100)"),
    (&["email"], "VARCHAR(255)"),
    (&["title"], "VARCHAR(200)"),
    (&["url", "link"], "VARCHAR(500)"),
    (&["code", "token"], "VARCHAR(255)"),
];
