use outrun_proc_macros::{ConfigDisplay, EnumAll, EnumDisplay, EnumFromStr};
use std::str::FromStr;
use test_log::test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumDisplay, EnumFromStr, EnumAll)]
enum Route {
    Left,
    Right,
}

#[derive(ConfigDisplay)]
struct Settings {
    route: Route,
    #[cfg_display(debug_fmt)]
    lanes: [u8; 2],
    #[cfg_display(skip)]
    _hidden: u32,
}

#[test]
fn enum_display_and_from_str() {
    assert_eq!(Route::Left.to_string(), "Left");
    assert_eq!(Route::Right.to_str(), "Right");
    assert_eq!(Route::from_str("rIgHt"), Ok(Route::Right));
    assert!(Route::from_str("up").is_err());
}

#[test]
fn enum_all_in_declaration_order() {
    assert_eq!(Route::ALL, [Route::Left, Route::Right]);
}

#[test]
fn config_display_lists_fields() {
    let settings = Settings { route: Route::Left, lanes: [1, 2], _hidden: 7 };
    assert_eq!(settings.to_string(), "\n  route: Left\n  lanes: [1, 2]");
}
