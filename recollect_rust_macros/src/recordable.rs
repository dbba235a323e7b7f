use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_quote, Data, DeriveInput, Fields, GenericParam, Generics, Ident, LitStr, Type};

struct Attribute {
    ident: Ident,
    name: String,
    shared: bool,
}

pub fn derive_recordable(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let generics = add_value_bounds(input.generics.clone());
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => &fields.named,
            Fields::Unit => {
                return Ok(quote! {
                    impl #impl_generics recollect_rust::Recordable for #name #ty_generics #where_clause {}
                })
            }
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Recordable derive only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Recordable derive only supports structs",
            ))
        }
    };

    let mut attributes: Vec<Attribute> = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let options = parse_field_attrs(&field.attrs)?;
        if options.skip {
            continue;
        }

        let attribute = options
            .rename
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());
        if attributes.iter().any(|existing| existing.name == attribute) {
            return Err(syn::Error::new_spanned(
                &field.ident,
                format!("duplicate attribute name `{attribute}`"),
            ));
        }
        attributes.push(Attribute {
            ident,
            name: attribute,
            shared: is_shared_value(&field.ty),
        });
    }

    let names: Vec<&str> = attributes.iter().map(|a| a.name.as_str()).collect();

    // Shared fields hand out their cell so copy-on-read decides whether readers alias it.
    let read_arms = attributes.iter().map(|Attribute { ident, name, shared }| {
        if *shared {
            return quote! {
                #name => ::core::result::Result::Ok(
                    recollect_rust::StateValue::Shared(::core::clone::Clone::clone(&self.#ident)),
                ),
            };
        }
        quote! {
            #name => recollect_rust::StateValue::encode(&self.#ident)
                .map_err(|source| recollect_rust::AttributeError::conversion(#name, source)),
        }
    });

    let write_arms = attributes.iter().map(|Attribute { ident, name, shared }| {
        if *shared {
            return quote! {
                #name => {
                    self.#ident = value.into_shared();
                    ::core::result::Result::Ok(())
                }
            };
        }
        quote! {
            #name => {
                self.#ident = value
                    .decode()
                    .map_err(|source| recollect_rust::AttributeError::conversion(#name, source))?;
                ::core::result::Result::Ok(())
            }
        }
    });

    Ok(quote! {
        impl #impl_generics recollect_rust::Recordable for #name #ty_generics #where_clause {
            fn attribute_names() -> &'static [&'static str] {
                &[#(#names),*]
            }

            fn read_attribute(
                &self,
                name: &str,
            ) -> ::core::result::Result<recollect_rust::StateValue, recollect_rust::AttributeError> {
                match name {
                    #(#read_arms)*
                    _ => ::core::result::Result::Err(recollect_rust::AttributeError::unknown::<Self>(name)),
                }
            }

            fn write_attribute(
                &mut self,
                name: &str,
                value: recollect_rust::StateValue,
            ) -> ::core::result::Result<(), recollect_rust::AttributeError> {
                let _ = &value;
                match name {
                    #(#write_arms)*
                    _ => ::core::result::Result::Err(recollect_rust::AttributeError::unknown::<Self>(name)),
                }
            }
        }
    })
}

// Type parameters flow into attribute values, so each must round-trip.
fn add_value_bounds(mut generics: Generics) -> Generics {
    for param in &mut generics.params {
        if let GenericParam::Type(type_param) = param {
            type_param.bounds.push(parse_quote!(recollect_rust::__private::Serialize));
            type_param
                .bounds
                .push(parse_quote!(recollect_rust::__private::DeserializeOwned));
        }
    }
    generics
}

/// `SharedValue`, `recollect_rust::SharedValue` or any path ending in it.
fn is_shared_value(ty: &Type) -> bool {
    match ty {
        Type::Path(path) if path.qself.is_none() => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "SharedValue" && segment.arguments.is_none()),
        Type::Group(group) => is_shared_value(&group.elem),
        _ => false,
    }
}

#[derive(Default)]
struct FieldOptions {
    skip: bool,
    rename: Option<String>,
}

fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("recall") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                options.skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                options.rename = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `skip` or `rename = \"...\"`"))
            }
        })?;
    }

    Ok(options)
}
