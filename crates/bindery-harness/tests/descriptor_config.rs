#![forbid(unsafe_code)]

//! Integration tests: descriptors loaded from TOML and JSON tables.

use std::sync::Arc;

use bindery_harness::{
    ProfileModel, ProfileWidgets, init_test_logging, profile_binder, profile_descriptors,
    profile_strings,
};
use bindery_runtime::{BindOptions, ConfigError, DescriptorTable, ModelHandle};
use bindery_widgets::Screen;

const PROFILE_TOML: &str = r#"
[[binding]]
field = "name_input"
kind = "element"
resource = 0x7f010001

[binding.model]
element_setter = "set_text"
element_setter_param = "text"
element_getter = "text"
element_event = "text_input.text_change"
model_setter = "set_name"
model_setter_param = "text"
model_getter = "name"
register_for_model_changes = true

[[binding]]
level = 1
field = "title"
kind = "text"
resource = 0x7f020001
"#;

const PROFILE_JSON: &str = r#"{
  "binding": [
    {
      "field": "name_input",
      "kind": "element",
      "resource": 2130771969,
      "model": {
        "element_setter": "set_text",
        "element_setter_param": "text",
        "element_getter": "text",
        "element_event": "text_input.text_change",
        "model_setter": "set_name",
        "model_setter_param": "text",
        "model_getter": "name",
        "register_for_model_changes": true
      }
    },
    { "level": 1, "field": "title", "kind": "text", "resource": 2130837505 }
  ]
}"#;

/// Screen whose levels come from `table`.
fn screen_from(table: &DescriptorTable, widgets: &ProfileWidgets) -> Screen {
    let mut screen = Screen::new("configured").root(Arc::clone(&widgets.tree));
    let mut level = 0;
    while let Some(descriptors) = table.level(level) {
        screen = screen.level(descriptors);
        level += 1;
    }
    screen
}

#[test]
fn toml_and_json_tables_agree() {
    let from_toml = DescriptorTable::from_toml_str(PROFILE_TOML).unwrap();
    let from_json = DescriptorTable::from_json_str(PROFILE_JSON).unwrap();
    assert_eq!(from_toml, from_json);
    assert_eq!(from_toml.depth(), Some(1));

    let level0 = from_toml.level(0).unwrap();
    assert_eq!(level0, vec![profile_descriptors()[0].clone()]);
    let level1 = from_toml.level(1).unwrap();
    assert_eq!(level1, vec![profile_descriptors()[3].clone()]);
    assert!(from_toml.level(2).is_none());
}

#[test]
fn configured_screen_binds_like_a_coded_one() {
    init_test_logging();
    let table = DescriptorTable::from_toml_str(PROFILE_TOML).unwrap();
    let binder = profile_binder(profile_strings("es"));
    let widgets = ProfileWidgets::new();
    let screen = screen_from(&table, &widgets);
    let model = ProfileModel::new("Ann");

    let report = binder
        .init(
            &screen,
            BindOptions::new().ancestor_depth(1),
            Some(Arc::clone(&model) as ModelHandle),
        )
        .unwrap();
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(widgets.name.text(), "Ann");
    assert_eq!(screen.text("title").as_deref(), Some("Perfil"));

    widgets.name.set_text("Bob");
    assert_eq!(model.name(), "Bob");
}

#[test]
fn unknown_parameter_shape_is_a_config_error() {
    let src = PROFILE_TOML.replace(
        r#"element_setter_param = "text""#,
        r#"element_setter_param = "widget""#,
    );
    let err = DescriptorTable::from_toml_str(&src).unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
    assert!(err.to_string().contains("widget"), "{err}");

    let err = DescriptorTable::from_json_str("{ \"binding\": [ { \"field\": 3 } ] }").unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
}

#[test]
fn pushed_entries_extend_a_loaded_table() {
    let mut table = DescriptorTable::from_json_str(PROFILE_JSON).unwrap();
    table.push(3, profile_descriptors()[1].clone());
    assert_eq!(table.depth(), Some(3));
    assert_eq!(table.level(2), Some(Vec::new()));
    assert_eq!(table.level(3).map(|d| d.len()), Some(1));
}
