use proc_macro2::*;
use quote::quote;
use syn::*;

fn parse_enum(item: TokenStream) -> core::result::Result<(DeriveInput, DataEnum), TokenStream> {
    let input_parsed = match syn::parse2::<DeriveInput>(item) {
        Ok(derived_input) => derived_input,
        Err(err) => return Err(err.to_compile_error()),
    };

    let body_data = match &input_parsed.data {
        Data::Enum(body) => body.clone(),
        _ => return Err(quote!( compile_error!("Not an enum"); )),
    };

    if body_data.variants.iter().any(|variant| !matches!(variant.fields, Fields::Unit)) {
        return Err(quote!( compile_error!("Only fieldless enums are supported"); ));
    }

    Ok((input_parsed, body_data))
}

pub fn enum_display(item: TokenStream) -> TokenStream {
    let (input_parsed, body_data) = match parse_enum(item) {
        Ok(parsed) => parsed,
        Err(err) => return err,
    };

    let ident = input_parsed.ident;

    let mut members = Vec::with_capacity(body_data.variants.len());
    let mut names = Vec::with_capacity(body_data.variants.len());

    for variant in &body_data.variants {
        members.push(variant.ident.clone());
        let val = variant.attrs.iter()
            .filter(|attr| attr.path().get_ident().map_or(false, |ident| ident == "display"))
            .map(|attr| attr.parse_args::<LitStr>().map_or_else(|err| err.to_compile_error(), |parsed| {
                let val = parsed.value();
                quote!(#val)
            }))
            .nth(0)
            .unwrap_or_else(|| {
                let val = variant.ident.to_string();
                quote!(#val)
            });
        names.push(val);
    }

    quote!{
        impl core::fmt::Display for #ident {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    #(#ident::#members => f.write_str(#names),)*
                }
            }
        }
    }
}

pub fn enum_from_repr(item: TokenStream) -> TokenStream {
    let (input_parsed, body_data) = match parse_enum(item) {
        Ok(parsed) => parsed,
        Err(err) => return err,
    };

    let repr = input_parsed.attrs.iter()
        .filter(|attr| attr.path().is_ident("repr"))
        .filter_map(|attr| attr.parse_args::<Ident>().ok())
        .nth(0);
    let repr = match repr {
        Some(repr) => repr,
        None => return quote!( compile_error!("EnumFromRepr requires a `#[repr(..)]` attribute"); ),
    };

    let ident = input_parsed.ident;
    let variants = body_data.variants.iter().map(|variant| variant.ident.clone()).collect::<Vec<_>>();

    quote!{
        impl #ident {
            /// Get the variant with the given discriminant, if any
            pub const fn from_repr(val: #repr) -> Option<Self> {
                #(
                    if val == #ident::#variants as #repr {
                        return Some(#ident::#variants);
                    }
                )*
                None
            }
        }
    }
}
