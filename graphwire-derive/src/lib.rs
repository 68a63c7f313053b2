//! Derive macro for `graphwire::Serialize`.
//!
//! Structs serialize as a class framing their fields in declaration order.
//! Enums whose variants carry no fields serialize as an `i32` tag; enums with
//! fields frame the tag followed by the active variant's fields.
//!
//! Refer to the [`graphwire`](https://docs.rs/graphwire) crate for examples.
use {
    proc_macro::TokenStream,
    syn::{parse_macro_input, DeriveInput},
};

mod common;
mod serialize;

/// Implement `Serialize` for a struct or enum.
///
/// Attributes:
///
/// - `#[graphwire(rename = "...")]` on the type sets the announced type name;
///   on a field it sets the field's label.
/// - `#[graphwire(skip)]` leaves a field off the wire.
/// - `#[graphwire(crate = "...")]` names the path to the graphwire crate.
#[proc_macro_derive(Serialize, attributes(graphwire))]
pub fn derive_serialize(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match serialize::generate(input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.write_errors().into(),
    }
}
