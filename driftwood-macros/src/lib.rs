use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

mod attrs;

use attrs::{FieldClass, classify, field_attrs, record_target, struct_table};

/// Derives `driftwood_core::model::ModelSchema` from the struct layout.
///
/// Struct: `#[driftwood(table = "..")]`. Fields: `#[driftwood(column = "..",
/// tag = "..", embed, ignore)]`, `#[serde(rename = "..")]`, `#[serde(flatten)]`
/// and the `#[has_many(T)]` / `#[belongs_to(T)]` relationship markers.
#[proc_macro_derive(Model, attributes(has_many, belongs_to, driftwood, serde))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_model_impl(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn derive_model_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    generate_schema_impl(input)
}

fn generate_schema_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let model_name = struct_name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let all_fields = if let Data::Struct(data) = &input.data {
        if let Fields::Named(fields) = &data.fields {
            &fields.named
        } else {
            return Err(syn::Error::new_spanned(
                &data.fields,
                "driftwood Model only supports structs with named fields",
            ));
        }
    } else {
        return Err(syn::Error::new_spanned(
            input,
            "driftwood Model only supports structs",
        ));
    };

    let table = match struct_table(&input.attrs)? {
        Some(table) => quote! { #table },
        None => quote! { driftwood_core::model::to_snake_case(#model_name) },
    };

    let mut field_exprs = Vec::new();
    for field in all_fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = ident.to_string();
        let attrs = field_attrs(field)?;

        let base = match classify(&field.ty, &attrs) {
            FieldClass::Ignored => continue,
            FieldClass::Scalar(type_name) => {
                // a field typed as another model is a relationship, not a column
                let (target, optional) = record_target(&field.ty);
                quote! {
                    {
                        use driftwood_core::model::field_kind::{ModelRecord as _, PlainColumn as _};
                        match (&driftwood_core::model::field_kind::KindOf::<#target>::new())
                            .record_kind(#optional)
                        {
                            ::core::option::Option::Some(kind) => {
                                driftwood_core::model::FieldDef::relation(#name, kind)
                            }
                            ::core::option::Option::None => driftwood_core::model::FieldDef::scalar(
                                #name,
                                driftwood_core::types::FieldType::from_type_name(#type_name),
                            ),
                        }
                    }
                }
            }
            FieldClass::Embedded(ty) => quote! {
                driftwood_core::model::FieldDef::embedded(
                    #name,
                    <#ty as driftwood_core::model::ModelSchema>::model_def().fields,
                )
            },
            FieldClass::Collection => quote! {
                driftwood_core::model::FieldDef::relation(#name, driftwood_core::model::FieldKind::Collection)
            },
            FieldClass::Composite => quote! {
                driftwood_core::model::FieldDef::relation(#name, driftwood_core::model::FieldKind::Composite)
            },
            FieldClass::OptionalRef => quote! {
                driftwood_core::model::FieldDef::relation(#name, driftwood_core::model::FieldKind::OptionalRef)
            },
        };

        let column = attrs.column.as_ref().map(|c| quote! { .column(#c) });
        let serde_name = attrs.serde_name.as_ref().map(|s| quote! { .serde_name(#s) });
        let tag = attrs.tag.as_ref().map(|t| quote! { .tag(#t) });
        field_exprs.push(quote! { #base #column #serde_name #tag });
    }

    Ok(quote! {
        impl #impl_generics driftwood_core::model::ModelSchema for #struct_name #ty_generics #where_clause {
            fn model_def() -> driftwood_core::model::ModelDef {
                driftwood_core::model::ModelDef::new(#model_name, #table)
                    #( .field(#field_exprs) )*
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use syn::parse_quote;

    use super::*;

    #[test]
    fn generate_schema_impl_includes_table_and_fields() {
        let input: DeriveInput = parse_quote! {
            struct BlogArticle {
                id: u64,
                #[driftwood(tag = "size:200")]
                title: String,
                views: Option<i32>,
            }
        };
        let tokens = generate_schema_impl(&input).unwrap().to_string();
        assert!(tokens.contains("ModelSchema for BlogArticle"));
        assert!(tokens.contains("to_snake_case (\"BlogArticle\")"));
        assert!(tokens.contains("\"title\""));
        assert!(tokens.contains("\"size:200\""));
        assert!(tokens.contains("\"Option<i32>\""));
    }

    #[test]
    fn generate_schema_impl_checks_scalar_types_for_models() {
        let input: DeriveInput = parse_quote! {
            struct Article {
                id: i64,
                tag: Option<Tag>,
            }
        };
        let tokens = generate_schema_impl(&input).unwrap().to_string();
        assert!(tokens.contains("KindOf :: < i64 >"));
        assert!(tokens.contains("KindOf :: < Tag >"));
        assert!(tokens.contains("record_kind (true)"));
    }

    #[test]
    fn generate_schema_impl_uses_table_override() {
        let input: DeriveInput = parse_quote! {
            #[driftwood(table = "posts")]
            struct BlogPost {
                id: i64,
            }
        };
        let tokens = generate_schema_impl(&input).unwrap().to_string();
        assert!(tokens.contains("\"posts\""));
        assert!(!tokens.contains("to_snake_case"));
    }

    #[test]
    fn generate_schema_impl_rejects_tuple_struct() {
        let input: DeriveInput = parse_quote! {
            struct User(i32, String);
        };
        let err = generate_schema_impl(&input).unwrap_err();
        assert!(err.to_string().contains("named fields"));
    }

    #[test]
    fn generate_schema_impl_rejects_non_struct() {
        let input: DeriveInput = parse_quote! {
            enum User {
                A,
                B,
            }
        };
        let err = derive_model_impl(&input).unwrap_err();
        assert!(err.to_string().contains("only supports structs"));
    }

    #[test]
    fn generate_schema_impl_skips_ignored_fields() {
        let input: DeriveInput = parse_quote! {
            struct User {
                id: i32,
                #[driftwood(ignore)]
                scratch: Option<String>,
            }
        };
        let tokens = generate_schema_impl(&input).unwrap().to_string();
        assert!(!tokens.contains("\"scratch\""));
    }

    #[test]
    fn generate_schema_impl_marks_relationships() {
        let input: DeriveInput = parse_quote! {
            struct User {
                id: i32,
                #[has_many(Post)]
                posts: Vec<Post>,
                #[belongs_to(Team)]
                team: Option<Team>,
                #[serde(flatten)]
                audit: Audit,
            }
        };
        let tokens = generate_schema_impl(&input).unwrap().to_string();
        assert!(tokens.contains("FieldKind :: Collection"));
        assert!(tokens.contains("FieldKind :: OptionalRef"));
        assert!(tokens.contains("< Audit as driftwood_core :: model :: ModelSchema > :: model_def ()"));
    }

    #[test]
    fn generate_schema_impl_carries_column_and_serde_names() {
        let input: DeriveInput = parse_quote! {
            struct Account {
                #[driftwood(column = "acct_id")]
                id: i64,
                #[serde(rename = "isActive")]
                is_active: bool,
            }
        };
        let tokens = generate_schema_impl(&input).unwrap().to_string();
        assert!(tokens.contains(". column (\"acct_id\")"));
        assert!(tokens.contains(". serde_name (\"isActive\")"));
    }
}
