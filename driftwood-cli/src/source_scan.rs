use std::collections::{HashMap, HashSet};
use std::path::Path;

use driftwood_core::{DriftError, DriftResult, Settings};
use driftwood_core::model::{FieldDef, FieldKind, ModelDef};
use driftwood_core::types::FieldType;
use syn::punctuated::Punctuated;
use syn::{Attribute, Field, Fields, GenericArgument, Item, LitStr, PathArguments, Token, Type};
use walkdir::WalkDir;

const COLLECTIONS: [&str; 6] = [
    "Vec", "HashMap", "HashSet", "BTreeMap", "BTreeSet", "VecDeque",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Sqlite,
    Postgres,
    Mysql,
}

impl DbKind {
    pub fn from_url(db_url: &str) -> Self {
        if db_url.starts_with("postgres://") || db_url.starts_with("postgresql://") {
            return DbKind::Postgres;
        }
        if db_url.starts_with("mysql://") || db_url.starts_with("mariadb://") {
            return DbKind::Mysql;
        }
        DbKind::Sqlite
    }
}

/// A named struct found in the sources.
#[derive(Debug)]
struct ScannedStruct {
    name: String,
    table: Option<String>,
    derives_model: bool,
    fields: Vec<ScannedField>,
}

#[derive(Debug)]
struct ScannedField {
    name: String,
    ty: Type,
    column: Option<String>,
    tag: Option<String>,
    serde_name: Option<String>,
    embed: bool,
    ignore: bool,
    relation: bool,
}

/// Builds a definition for every `#[derive(Model)]` struct under `src_dir`,
/// in file then source order. Structs embedded by another model are not
/// registered on their own.
pub fn scan_models(src_dir: &Path, settings: &Settings) -> DriftResult<Vec<ModelDef>> {
    if !src_dir.exists() {
        return Ok(Vec::new());
    }

    let mut structs = Vec::new();
    for entry in WalkDir::new(src_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }
        if should_skip_path(entry.path(), src_dir) {
            continue;
        }
        let source =
            std::fs::read_to_string(entry.path()).map_err(|source| DriftError::FileIo {
                path: entry.path().to_path_buf(),
                source,
            })?;
        syn::parse_file(&source)
            .and_then(|parsed| collect_structs_from_items(&parsed.items, &mut structs))
            .map_err(|err| DriftError::Scan(format!("{}: {}", entry.path().display(), err)))?;
    }

    build_models(&structs, settings)
}

fn should_skip_path(path: &Path, src_dir: &Path) -> bool {
    if let Ok(rel) = path.strip_prefix(src_dir)
        && let Some(first) = rel.components().next()
    {
        let first = first.as_os_str().to_string_lossy();
        if rel.components().count() > 1 && first.eq_ignore_ascii_case("bin") {
            return true;
        }
    }
    false
}

fn collect_structs_from_items(
    items: &[Item],
    structs: &mut Vec<ScannedStruct>,
) -> Result<(), syn::Error> {
    for item in items {
        match item {
            Item::Struct(item_struct) => {
                let Fields::Named(named) = &item_struct.fields else {
                    if has_derive_model(&item_struct.attrs) {
                        return Err(syn::Error::new_spanned(
                            item_struct,
                            "Model must use named fields",
                        ));
                    }
                    continue;
                };
                let mut fields = Vec::new();
                for field in &named.named {
                    fields.push(scan_field(field)?);
                }
                structs.push(ScannedStruct {
                    name: item_struct.ident.to_string(),
                    table: struct_table(&item_struct.attrs)?,
                    derives_model: has_derive_model(&item_struct.attrs),
                    fields,
                });
            }
            Item::Mod(item_mod) => {
                if let Some((_, items)) = &item_mod.content {
                    collect_structs_from_items(items, structs)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn has_derive_model(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        if !attr.path().is_ident("derive") {
            return false;
        }
        let paths: Result<Punctuated<syn::Path, Token![,]>, _> =
            attr.parse_args_with(Punctuated::parse_terminated);
        if let Ok(paths) = paths {
            return paths.iter().any(|path| {
                path.segments
                    .last()
                    .map(|seg| seg.ident == "Model")
                    .unwrap_or(false)
            });
        }
        false
    })
}

fn struct_table(attrs: &[Attribute]) -> Result<Option<String>, syn::Error> {
    let mut table = None;
    for attr in attrs {
        if !attr.path().is_ident("driftwood") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let lit: LitStr = meta.value()?.parse()?;
                table = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("unsupported driftwood struct attribute"))
            }
        })?;
    }
    Ok(table)
}

fn scan_field(field: &Field) -> Result<ScannedField, syn::Error> {
    let ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "Field must have an ident"))?;
    let mut scanned = ScannedField {
        name: ident.to_string(),
        ty: field.ty.clone(),
        column: None,
        tag: None,
        serde_name: None,
        embed: false,
        ignore: false,
        relation: false,
    };

    for attr in &field.attrs {
        let path = attr.path();
        if path.is_ident("has_many") || path.is_ident("belongs_to") {
            scanned.relation = true;
        } else if path.is_ident("driftwood") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("column") {
                    scanned.column = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("tag") {
                    scanned.tag = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("embed") {
                    scanned.embed = true;
                } else if meta.path.is_ident("ignore") {
                    scanned.ignore = true;
                } else {
                    return Err(meta.error("unsupported driftwood field attribute"));
                }
                Ok(())
            })?;
        } else if path.is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                    scanned.serde_name = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("flatten") {
                    scanned.embed = true;
                } else if meta.input.peek(Token![=]) {
                    meta.value()?.parse::<syn::Expr>()?;
                } else if meta.input.peek(syn::token::Paren) {
                    let options;
                    syn::parenthesized!(options in meta.input);
                    Punctuated::<syn::Meta, Token![,]>::parse_terminated(&options)?;
                }
                Ok(())
            })?;
        }
    }
    Ok(scanned)
}

fn last_segment(ty: &Type) -> Option<(String, Option<&Type>)> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    let inner = match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        }),
        _ => None,
    };
    Some((segment.ident.to_string(), inner))
}

fn option_inner(ty: &Type) -> Option<&Type> {
    match last_segment(ty) {
        Some((name, inner)) if name == "Option" => inner,
        _ => None,
    }
}

fn type_name(ty: &Type) -> String {
    quote::quote!(#ty).to_string().replace(' ', "")
}

fn build_models(structs: &[ScannedStruct], settings: &Settings) -> DriftResult<Vec<ModelDef>> {
    let by_name: HashMap<&str, &ScannedStruct> =
        structs.iter().map(|s| (s.name.as_str(), s)).collect();

    let mut embedded: HashSet<String> = HashSet::new();
    for scanned in structs.iter().filter(|s| s.derives_model) {
        for field in scanned.fields.iter().filter(|f| f.embed && !f.ignore) {
            if let Some((name, _)) = last_segment(&field.ty) {
                embedded.insert(name);
            }
        }
    }

    let mut models = Vec::new();
    for scanned in structs.iter().filter(|s| s.derives_model) {
        if embedded.contains(&scanned.name) {
            tracing::debug!(model = %scanned.name, "embedded struct; not registered as a table");
            continue;
        }
        let table = scanned
            .table
            .clone()
            .unwrap_or_else(|| settings.table_name(&scanned.name));
        let mut visiting = vec![scanned.name.clone()];
        let mut model = ModelDef::new(scanned.name.clone(), table);
        for field in &scanned.fields {
            if let Some(def) = field_def(field, &by_name, &mut visiting)? {
                model = model.field(def);
            }
        }
        models.push(model);
    }
    Ok(models)
}

fn field_def(
    field: &ScannedField,
    by_name: &HashMap<&str, &ScannedStruct>,
    visiting: &mut Vec<String>,
) -> DriftResult<Option<FieldDef>> {
    if field.ignore {
        return Ok(None);
    }

    let mut def = if field.embed {
        let target = last_segment(&field.ty)
            .map(|(name, _)| name)
            .unwrap_or_default();
        let Some(embedded) = by_name.get(target.as_str()) else {
            return Err(DriftError::Scan(format!(
                "embedded struct `{}` of field `{}` not found in sources",
                target, field.name
            )));
        };
        if visiting.contains(&target) {
            return Err(DriftError::Scan(format!(
                "embedded struct `{}` embeds itself",
                target
            )));
        }
        visiting.push(target);
        let mut inner = Vec::new();
        for inner_field in &embedded.fields {
            if let Some(def) = field_def(inner_field, by_name, visiting)? {
                inner.push(def);
            }
        }
        visiting.pop();
        FieldDef::embedded(field.name.clone(), inner)
    } else {
        let optional = option_inner(&field.ty);
        let target = optional.unwrap_or(&field.ty);
        let is_collection = matches!(
            last_segment(target),
            Some((name, _)) if COLLECTIONS.contains(&name.as_str())
        );
        let is_box = matches!(last_segment(target), Some((name, _)) if name == "Box");
        // a field typed as another scanned struct is a record, not a column
        let is_record = matches!(
            last_segment(target),
            Some((name, _)) if by_name.contains_key(name.as_str())
        );
        if is_collection {
            FieldDef::relation(field.name.clone(), FieldKind::Collection)
        } else if field.relation || is_box || is_record {
            let kind = if optional.is_some() {
                FieldKind::OptionalRef
            } else {
                FieldKind::Composite
            };
            FieldDef::relation(field.name.clone(), kind)
        } else {
            FieldDef::scalar(
                field.name.clone(),
                FieldType::from_type_name(&type_name(&field.ty)),
            )
        }
    };

    if let Some(column) = &field.column {
        def = def.column(column.clone());
    }
    if let Some(serde_name) = &field.serde_name {
        def = def.serde_name(serde_name.clone());
    }
    if let Some(tag) = &field.tag {
        def = def.tag(tag.clone());
    }
    Ok(Some(def))
}
