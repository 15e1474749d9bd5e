mod config;
mod enums;

use proc_macro::TokenStream;

/// Implement `Display` and a `to_str()` method for a fieldless enum, using the variant names.
#[proc_macro_derive(EnumDisplay)]
pub fn enum_display(input: TokenStream) -> TokenStream {
    enums::enum_display(input)
}

/// Implement case-insensitive `FromStr` for a fieldless enum, using the variant names.
#[proc_macro_derive(EnumFromStr)]
pub fn enum_from_str(input: TokenStream) -> TokenStream {
    enums::enum_from_str(input)
}

/// Add an `ALL` constant listing every variant of a fieldless enum in declaration order.
#[proc_macro_derive(EnumAll)]
pub fn enum_all(input: TokenStream) -> TokenStream {
    enums::enum_all(input)
}

/// Implement `clap::ValueEnum` for an enum that also derives `EnumAll` and `EnumDisplay`.
#[proc_macro_derive(CustomValueEnum)]
pub fn custom_value_enum(input: TokenStream) -> TokenStream {
    enums::custom_value_enum(input)
}

/// Implement a multi-line `Display` for a config struct, one `name: value` line per field.
///
/// Fields can be annotated with `#[cfg_display(debug_fmt)]` to format with `Debug`, or
/// `#[cfg_display(skip)]` to leave them out.
#[proc_macro_derive(ConfigDisplay, attributes(cfg_display))]
pub fn config_display(input: TokenStream) -> TokenStream {
    config::config_display(input)
}
