use proc_macro::TokenStream;
use proc_macro2::Ident;
use quote::quote;
use syn::{Data, DataEnum, DeriveInput};

// Every enum derive here only makes sense for C-like enums
fn unit_variants<'a>(macro_name: &str, name: &Ident, data: &'a Data) -> Vec<&'a Ident> {
    let Data::Enum(DataEnum { variants, .. }) = data else {
        panic!("{macro_name} can only be derived for enums; {name} is not an enum");
    };

    variants
        .iter()
        .map(|variant| {
            assert!(
                variant.fields.is_empty(),
                "{macro_name} requires fieldless variants; {name}::{} has fields",
                variant.ident
            );
            &variant.ident
        })
        .collect()
}

pub fn enum_display(input: TokenStream) -> TokenStream {
    let ast: DeriveInput = syn::parse(input).expect("unable to parse input");
    let name = &ast.ident;
    let variants = unit_variants("EnumDisplay", name, &ast.data);
    let labels = variants.iter().map(|variant| variant.to_string());

    let expanded = quote! {
        impl #name {
            #[must_use]
            pub fn to_str(&self) -> &'static str {
                match self {
                    #(Self::#variants => #labels,)*
                }
            }
        }

        impl ::std::fmt::Display for #name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.to_str())
            }
        }
    };

    expanded.into()
}

pub fn enum_from_str(input: TokenStream) -> TokenStream {
    let ast: DeriveInput = syn::parse(input).expect("unable to parse input");
    let name = &ast.ident;
    let variants = unit_variants("EnumFromStr", name, &ast.data);
    let lowercase = variants.iter().map(|variant| variant.to_string().to_ascii_lowercase());

    let err_fmt = format!("invalid {name} value: '{{}}'");
    let expanded = quote! {
        impl ::std::str::FromStr for #name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    #(#lowercase => ::std::result::Result::Ok(Self::#variants),)*
                    _ => ::std::result::Result::Err(::std::format!(#err_fmt, s)),
                }
            }
        }
    };

    expanded.into()
}

pub fn enum_all(input: TokenStream) -> TokenStream {
    let ast: DeriveInput = syn::parse(input).expect("unable to parse input");
    let name = &ast.ident;
    let variants = unit_variants("EnumAll", name, &ast.data);
    let len = variants.len();

    let expanded = quote! {
        impl #name {
            pub const ALL: [Self; #len] = [#(Self::#variants,)*];
        }
    };

    expanded.into()
}

pub fn custom_value_enum(input: TokenStream) -> TokenStream {
    let ast: DeriveInput = syn::parse(input).expect("unable to parse input");
    let name = &ast.ident;

    let expanded = quote! {
        impl ::clap::ValueEnum for #name {
            fn value_variants<'a>() -> &'a [Self] {
                &Self::ALL
            }

            fn to_possible_value(&self) -> ::std::option::Option<::clap::builder::PossibleValue> {
                ::std::option::Option::Some(::clap::builder::PossibleValue::new(self.to_str()))
            }
        }
    };

    expanded.into()
}
