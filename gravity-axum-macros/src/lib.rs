//! Derive macro for gravity-axum request binders.
//!
//! Use it through the re-export in `gravity-axum`:
//!
//! ```ignore
//! use gravity_axum::BindRequest;
//!
//! #[derive(Default, serde::Serialize, serde::Deserialize, BindRequest)]
//! struct SearchPets {
//!     #[bind(query = "tag", explode)]
//!     tags: Vec<String>,
//!     #[bind(query = "limit")]
//!     limit: Option<u32>,
//!     name: String,
//! }
//! ```

mod bind;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Generate a `BindRequest` implementation from `#[bind(...)]` annotations.
///
/// Field annotations:
/// - `#[bind(query = "name")]`: bind the first occurrence of the parameter
/// - `#[bind(query = "name", explode)]`: on a `Vec<T>`, one element per
///   occurrence instead of a comma-split of the first one
/// - `#[bind(body)]`: the field receives the decoded request body
/// - `#[bind(nested)]`: the field is itself a binding target
///
/// Struct annotation:
/// - `#[bind(ignore_body)]`: never decode the body into the struct itself,
///   so it does not need to implement `Deserialize`
///
/// Without a `#[bind(body)]` field or `ignore_body`, the whole body is
/// decoded onto the query-bound struct, so it must implement
/// `serde::Serialize` and `serde::de::DeserializeOwned`. Keys present in the
/// body win; keys it omits keep their bound or default value.
#[proc_macro_derive(BindRequest, attributes(bind))]
pub fn derive_bind_request(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    bind::expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
