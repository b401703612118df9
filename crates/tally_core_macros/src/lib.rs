mod derive;

use proc_macro::TokenStream;

/// Implement `core::fmt::Display` for a fieldless enum.
/// 
/// Each variant displays as its name, unless a `#[display("...")]` attribute overrides the text.
#[proc_macro_derive(EnumDisplay, attributes(display))]
pub fn enum_display(item: TokenStream) -> TokenStream {
    derive::enum_display(item.into()).into()
}

/// Implement `from_repr`, mapping a discriminant back to its variant, for a fieldless enum with a `#[repr(..)]`.
#[proc_macro_derive(EnumFromRepr)]
pub fn enum_from_repr(item: TokenStream) -> TokenStream {
    derive::enum_from_repr(item.into()).into()
}
