use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Field, Fields, Ident, LitStr, Type};

enum Role {
    Query { name: LitStr, explode: bool },
    Body,
    Nested,
}

enum Shape {
    Scalar,
    Optional,
    Sequence,
}

fn shape_of(ty: &Type) -> Shape {
    let Type::Path(path) = ty else {
        return Shape::Scalar;
    };
    match path.path.segments.last() {
        Some(segment) if segment.ident == "Option" => Shape::Optional,
        Some(segment) if segment.ident == "Vec" => Shape::Sequence,
        _ => Shape::Scalar,
    }
}

fn bind_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|attr| attr.path().is_ident("bind"))
}

fn parse_role(field: &Field) -> syn::Result<Option<Role>> {
    let mut query: Option<LitStr> = None;
    let mut explode = false;
    let mut body = false;
    let mut nested = false;

    for attr in bind_attrs(&field.attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("query") {
                query = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("explode") {
                explode = true;
                Ok(())
            } else if meta.path.is_ident("body") {
                body = true;
                Ok(())
            } else if meta.path.is_ident("nested") {
                nested = true;
                Ok(())
            } else if meta.path.is_ident("path") {
                Err(meta.error(
                    "path parameters cannot be bound: no router path source is wired into the binder",
                ))
            } else {
                Err(meta.error("expected `query`, `explode`, `body` or `nested`"))
            }
        })?;
    }

    let roles = usize::from(query.is_some()) + usize::from(body) + usize::from(nested);
    if roles > 1 {
        return Err(syn::Error::new_spanned(
            field,
            "a field takes exactly one of `query`, `body` or `nested`",
        ));
    }
    if explode && query.is_none() {
        return Err(syn::Error::new_spanned(field, "`explode` requires `query`"));
    }

    Ok(match query {
        Some(name) => {
            if explode && !matches!(shape_of(&field.ty), Shape::Sequence) {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "`explode` only applies to `Vec<T>` fields",
                ));
            }
            Some(Role::Query { name, explode })
        }
        None if body => Some(Role::Body),
        None if nested => Some(Role::Nested),
        None => None,
    })
}

fn ignores_body(input: &DeriveInput) -> syn::Result<bool> {
    let mut ignore = false;
    for attr in bind_attrs(&input.attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("ignore_body") {
                ignore = true;
                Ok(())
            } else {
                Err(meta.error("expected `ignore_body`"))
            }
        })?;
    }
    Ok(ignore)
}

fn bind_step(ident: &Ident, field: &Field, role: &Role) -> TokenStream {
    match role {
        Role::Nested => quote! {
            claimed |= ::gravity_axum::BindRequest::bind_fields(&mut self.#ident, source)?;
        },
        Role::Body => quote! {
            claimed = true;
            if let ::core::option::Option::Some(value) = source.claim_body()? {
                self.#ident = value;
            }
        },
        Role::Query { name, explode } => match shape_of(&field.ty) {
            Shape::Scalar => quote! {
                ::gravity_axum::bind::bind_value(&mut self.#ident, source.query(), #name)?;
            },
            Shape::Optional => quote! {
                ::gravity_axum::bind::bind_optional(&mut self.#ident, source.query(), #name)?;
            },
            Shape::Sequence => quote! {
                ::gravity_axum::bind::bind_sequence(&mut self.#ident, source.query(), #name, #explode)?;
            },
        },
    }
}

pub fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named.named.iter().collect::<Vec<_>>(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "BindRequest requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "BindRequest can only be derived for structs",
            ));
        }
    };

    let ignore_body = ignores_body(input)?;
    let mut steps = Vec::new();
    let mut has_body_field = false;
    let mut tracks_claims = false;
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let Some(role) = parse_role(field)? else {
            continue;
        };
        has_body_field |= matches!(role, Role::Body);
        tracks_claims |= matches!(role, Role::Body | Role::Nested);
        steps.push(bind_step(ident, field, &role));
    }

    let decode_whole = if has_body_field || ignore_body {
        quote! {}
    } else {
        quote! {
            fn decode_whole(
                &self,
                source: &mut ::gravity_axum::bind::RequestSource<'_>,
            ) -> ::core::result::Result<::core::option::Option<Self>, ::gravity_axum::DecodeError> {
                source.merge_body(self)
            }
        }
    };

    let claimed = if tracks_claims {
        quote! { let mut claimed = false; }
    } else {
        quote! { let claimed = false; }
    };

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::gravity_axum::BindRequest for #name #ty_generics #where_clause {
            #[allow(unused_variables, unused_assignments)]
            fn bind_fields(
                &mut self,
                source: &mut ::gravity_axum::bind::RequestSource<'_>,
            ) -> ::core::result::Result<bool, ::gravity_axum::DecodeError> {
                #claimed
                #(#steps)*
                ::core::result::Result::Ok(claimed)
            }

            #decode_whole
        }
    })
}
