//! `#[derive(IdentifiableType)]`, describing the shape of a Rust type so it can
//! be validated against the type registry of a live chain.
//!
//! The derive understands the same `#[codec(..)]` attributes as
//! `parity-scale-codec`, so the produced shape matches the SCALE layout of the
//! type:
//!
//! * `#[codec(index = N)]` or an explicit discriminant sets the variant index.
//! * `#[codec(compact)]` registers the field as `Compact<T>`.
//! * `#[codec(skip)]` leaves the field out.

use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{
    parse_macro_input, parse_quote, Attribute, Data, DeriveInput, Error, Expr, ExprLit, Fields,
    Lit, Meta, NestedMeta,
};

type Result<T> = std::result::Result<T, Error>;

#[proc_macro_derive(IdentifiableType, attributes(codec))]
pub fn derive_identifiable_type(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(input) {
        Ok(stream) => stream.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct CodecAttrs {
    compact: bool,
    skip: bool,
    index: Option<u8>,
}

fn codec_attrs(attrs: &[Attribute]) -> Result<CodecAttrs> {
    let mut out = CodecAttrs::default();

    for attr in attrs.iter().filter(|a| a.path.is_ident("codec")) {
        let list = match attr.parse_meta()? {
            Meta::List(list) => list,
            other => return Err(Error::new(other.span(), "expected `#[codec(..)]`")),
        };

        for nested in list.nested {
            match nested {
                NestedMeta::Meta(Meta::Path(path)) if path.is_ident("compact") => {
                    out.compact = true
                }
                NestedMeta::Meta(Meta::Path(path)) if path.is_ident("skip") => out.skip = true,
                NestedMeta::Meta(Meta::NameValue(nv)) if nv.path.is_ident("index") => {
                    match &nv.lit {
                        Lit::Int(int) => out.index = Some(int.base10_parse()?),
                        other => return Err(Error::new(other.span(), "expected an integer")),
                    }
                }
                // Attributes without an effect on the shape, e.g. `dumb_trait_bound`.
                _ => {}
            }
        }
    }

    Ok(out)
}

/// Builds the `Vec<Field>` expression for a set of fields.
fn fields_expr(fields: &Fields) -> Result<TokenStream> {
    let mut entries = vec![];

    for field in fields.iter() {
        let attrs = codec_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }

        let ty = &field.ty;
        let id = if attrs.compact {
            quote! { registry.register::<::tessera::scale::Compact<#ty>>() }
        } else {
            quote! { registry.register::<#ty>() }
        };

        entries.push(match &field.ident {
            Some(name) => {
                let name = name.to_string();
                quote! { ::tessera::metadata::Field::named(#name, #id) }
            }
            None => quote! { ::tessera::metadata::Field::unnamed(#id) },
        });
    }

    Ok(quote! { vec![#(#entries),*] })
}

fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let name_str = name.to_string();

    let definition = match &input.data {
        Data::Struct(data) => {
            let fields = fields_expr(&data.fields)?;
            quote! { ::tessera::metadata::TypeDefinition::Composite(#fields) }
        }
        Data::Enum(data) => {
            let mut variants = vec![];

            // Skipped variants do not take up a position, as in `parity-scale-codec`.
            let mut position = 0usize;
            for variant in &data.variants {
                let attrs = codec_attrs(&variant.attrs)?;
                if attrs.skip {
                    continue;
                }

                let discriminant = match &variant.discriminant {
                    Some((
                        _,
                        Expr::Lit(ExprLit {
                            lit: Lit::Int(int), ..
                        }),
                    )) => Some(int.base10_parse::<u8>()?),
                    Some((_, expr)) => {
                        return Err(Error::new(
                            expr.span(),
                            "only integer literals are supported as discriminants",
                        ))
                    }
                    None => None,
                };

                if position > u8::MAX as usize {
                    return Err(Error::new(variant.span(), "too many variants"));
                }

                let index = attrs.index.or(discriminant).unwrap_or(position as u8);
                position += 1;
                let variant_name = variant.ident.to_string();
                let fields = fields_expr(&variant.fields)?;

                variants.push(quote! {
                    ::tessera::metadata::Variant::new(#index, #variant_name, #fields)
                });
            }

            quote! { ::tessera::metadata::TypeDefinition::Variant(vec![#(#variants),*]) }
        }
        Data::Union(data) => {
            return Err(Error::new(
                data.union_token.span(),
                "unions have no SCALE representation",
            ))
        }
    };

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param
            .bounds
            .push(parse_quote!(::tessera::static_type::IdentifiableType));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::tessera::static_type::IdentifiableType for #name #ty_generics #where_clause {
            fn path() -> ::std::vec::Vec<::std::string::String> {
                module_path!()
                    .split("::")
                    .chain(::core::iter::once(#name_str))
                    .map(::std::string::String::from)
                    .collect()
            }
            fn definition(
                registry: &mut ::tessera::static_type::StaticRegistry,
            ) -> ::tessera::metadata::TypeDefinition {
                #definition
            }
        }
    })
}
