use syn::{Attribute, Field, GenericArgument, LitStr, PathArguments, Type};

const COLLECTIONS: [&str; 6] = [
    "Vec", "HashMap", "HashSet", "BTreeMap", "BTreeSet", "VecDeque",
];

/// Parsed `#[driftwood(..)]`, `#[serde(..)]` and relationship markers of one field.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FieldAttrs {
    pub column: Option<String>,
    pub tag: Option<String>,
    pub serde_name: Option<String>,
    pub embed: bool,
    pub ignore: bool,
    pub relation: bool,
}

/// How a field is described in the generated schema.
#[derive(Debug, PartialEq, Eq)]
pub enum FieldClass<'a> {
    Ignored,
    Scalar(String),
    Embedded(&'a Type),
    Collection,
    Composite,
    OptionalRef,
}

pub fn struct_table(attrs: &[Attribute]) -> syn::Result<Option<String>> {
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
                Err(meta.error("unsupported driftwood struct attribute, expected `table`"))
            }
        })?;
    }
    Ok(table)
}

pub fn field_attrs(field: &Field) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in &field.attrs {
        let path = attr.path();
        if path.is_ident("has_many") || path.is_ident("belongs_to") {
            out.relation = true;
        } else if path.is_ident("driftwood") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("column") {
                    out.column = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("tag") {
                    out.tag = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("embed") {
                    out.embed = true;
                } else if meta.path.is_ident("ignore") {
                    out.ignore = true;
                } else {
                    return Err(meta.error(
                        "unsupported driftwood field attribute, expected `column`, `tag`, `embed` or `ignore`",
                    ));
                }
                Ok(())
            })?;
        } else if path.is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") && meta.input.peek(syn::Token![=]) {
                    out.serde_name = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("flatten") {
                    out.embed = true;
                } else if meta.input.peek(syn::Token![=]) {
                    meta.value()?.parse::<syn::Expr>()?;
                } else if meta.input.peek(syn::token::Paren) {
                    meta.input.parse::<proc_macro2::TokenTree>()?;
                }
                Ok(())
            })?;
        }
    }
    Ok(out)
}

/// Last path segment name and its first type argument.
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

fn is_collection(ty: &Type) -> bool {
    matches!(last_segment(ty), Some((name, _)) if COLLECTIONS.contains(&name.as_str()))
}

fn is_box(ty: &Type) -> bool {
    matches!(last_segment(ty), Some((name, _)) if name == "Box")
}

fn option_inner(ty: &Type) -> Option<&Type> {
    match last_segment(ty) {
        Some((name, inner)) if name == "Option" => inner,
        _ => None,
    }
}

pub fn classify<'a>(ty: &'a Type, attrs: &FieldAttrs) -> FieldClass<'a> {
    if attrs.ignore {
        return FieldClass::Ignored;
    }
    if attrs.embed {
        return FieldClass::Embedded(ty);
    }

    let optional = option_inner(ty);
    let target = optional.unwrap_or(ty);
    if is_collection(target) {
        return FieldClass::Collection;
    }
    if attrs.relation || is_box(target) {
        return if optional.is_some() {
            FieldClass::OptionalRef
        } else {
            FieldClass::Composite
        };
    }
    FieldClass::Scalar(type_name(ty))
}

/// The type checked for a `ModelSchema` impl, with `Option<_>` unwrapped.
pub fn record_target(ty: &Type) -> (&Type, bool) {
    match option_inner(ty) {
        Some(inner) => (inner, true),
        None => (ty, false),
    }
}

/// Type spelled the way `FieldType::from_type_name` reads it.
pub fn type_name(ty: &Type) -> String {
    quote::quote!(#ty).to_string().replace(' ', "")
}
