use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields};

#[derive(Debug, Clone, Copy, Default)]
struct DisplayOptions {
    debug_fmt: bool,
    skip: bool,
}

fn display_options(field: &Field) -> DisplayOptions {
    let mut options = DisplayOptions::default();

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("cfg_display")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("debug_fmt") {
                options.debug_fmt = true;
            } else if meta.path.is_ident("skip") {
                options.skip = true;
            } else {
                return Err(meta.error("expected `debug_fmt` or `skip`"));
            }
            Ok(())
        })
        .expect("invalid cfg_display attribute");
    }

    options
}

pub fn config_display(input: TokenStream) -> TokenStream {
    let ast: DeriveInput = syn::parse(input).expect("unable to parse input");
    let name = &ast.ident;

    let Data::Struct(data) = &ast.data else {
        panic!("ConfigDisplay can only be derived for structs; {name} is not a struct");
    };
    let Fields::Named(fields) = &data.fields else {
        panic!("ConfigDisplay requires named fields; {name} has none");
    };

    let lines: Vec<_> = fields
        .named
        .iter()
        .filter_map(|field| {
            let options = display_options(field);
            if options.skip {
                return None;
            }

            let ident = field.ident.as_ref().expect("named fields always have idents");
            let fmt = if options.debug_fmt {
                format!("  {ident}: {{:?}}")
            } else {
                format!("  {ident}: {{}}")
            };

            Some(quote! {
                ::std::writeln!(f)?;
                ::std::write!(f, #fmt, self.#ident)?;
            })
        })
        .collect();

    let (impl_generics, type_generics, where_clause) = ast.generics.split_for_impl();
    let expanded = quote! {
        impl #impl_generics ::std::fmt::Display for #name #type_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #(#lines)*
                ::std::result::Result::Ok(())
            }
        }
    };

    expanded.into()
}
