use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

/// Derives `iform::form::FormDomain` for a struct with named fields.
///
/// Every field becomes one form field of the same name. Field types convert
/// through `ToFieldValue` and `FromFieldValue`.
#[proc_macro_derive(FormDomain)]
pub fn derive_form_domain(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            input.ident,
            "FormDomain derive currently supports only non-generic structs",
        )
        .to_compile_error()
        .into();
    }

    let domain_ident = input.ident;

    let named_fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            _ => {
                return syn::Error::new(
                    Span::call_site(),
                    "FormDomain derive requires a struct with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new(
                Span::call_site(),
                "FormDomain derive is only supported on structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let iform = iform_path();
    let mut field_names = Vec::new();
    let mut to_values = Vec::new();
    let mut from_values = Vec::new();

    for field in named_fields {
        let Some(field_ident) = field.ident else {
            continue;
        };
        let field_name = field_ident.to_string();

        to_values.push(quote! {
            values.insert(
                #field_name.to_string(),
                #iform::form::ToFieldValue::to_field_value(&self.#field_ident),
            );
        });
        from_values.push(quote! {
            #field_ident: #iform::form::FromFieldValue::from_field_value(
                #field_name,
                values.get(#field_name),
            )?,
        });
        field_names.push(field_name);
    }

    quote! {
        impl #iform::form::FormDomain for #domain_ident {
            fn field_names() -> &'static [&'static str] {
                &[#(#field_names),*]
            }

            fn to_field_values(&self) -> #iform::form::CastValues {
                let mut values = #iform::form::CastValues::new();
                #(#to_values)*
                values
            }

            fn from_cast_values(
                values: &#iform::form::CastValues,
            ) -> ::std::result::Result<Self, #iform::form::MapError> {
                ::std::result::Result::Ok(Self {
                    #(#from_values)*
                })
            }
        }
    }
    .into()
}

fn iform_path() -> TokenStream2 {
    match crate_name("iform") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Ok(FoundCrate::Itself) => quote!(crate),
        Err(_) => quote!(::iform),
    }
}
