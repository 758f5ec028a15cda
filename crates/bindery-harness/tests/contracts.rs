#![forbid(unsafe_code)]

//! Integration tests: descriptor contracts, resolution failures and observer
//! resilience.

use std::sync::{Arc, Mutex};

use bindery_harness::{
    ProfileModel, ProfileWidgets, ids, init_test_logging, name_binding, profile_binder,
    profile_strings,
};
use bindery_runtime::{
    BindError, BindOptions, Binder, BindingDescriptor, ContractViolation, FieldKind, ModelBinding,
    ModelHandle, ObserverError, ParamShape, ReactiveCell, ResourceId, ValueKind,
};
use bindery_widgets::{Screen, TextInput, adapter_keys};
use proptest::prelude::*;

/// Profile binder over English strings, with test logging installed.
fn binder() -> Binder {
    init_test_logging();
    profile_binder(profile_strings("en"))
}

fn handle(model: &Arc<ProfileModel>) -> Option<ModelHandle> {
    Some(Arc::clone(model) as ModelHandle)
}

/// A screen holding one text input and a single descriptor at level 0.
fn single_field_screen(key: &str, descriptor: BindingDescriptor) -> (ProfileWidgets, Screen) {
    let widgets = ProfileWidgets::new();
    let screen = Screen::new(key)
        .root(Arc::clone(&widgets.tree))
        .level(vec![descriptor]);
    (widgets, screen)
}

fn bind_one(binding: ModelBinding) -> Result<(), BindError> {
    let binder = binder();
    let descriptor = BindingDescriptor::element("name_input")
        .resource(ids::NAME_INPUT)
        .model(binding);
    let (_widgets, screen) = single_field_screen("contract", descriptor);
    binder
        .bind(&screen, 0, handle(&ProfileModel::new("Ann")))
        .map(drop)
}

// ============================================================================
// Contract rules
// ============================================================================

/// Absent, empty or set: empty names count as absent.
fn slot(name: &'static str) -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        Just(Some(name.to_owned())),
    ]
}

fn present(name: &Option<String>) -> bool {
    name.as_deref().is_some_and(|n| !n.is_empty())
}

proptest! {
    #[test]
    fn contract_violations_are_reported_in_rule_order(
        element_setter in slot("set_text"),
        element_getter in slot("text"),
        element_event in slot(adapter_keys::TEXT_CHANGE),
        model_setter in slot("set_name"),
        model_getter in slot("name"),
        observe in any::<bool>(),
    ) {
        let expected = if present(&element_event) && !present(&model_setter) {
            Some(ContractViolation::EventWithoutModelSetter)
        } else if present(&element_getter) && !present(&model_setter) {
            Some(ContractViolation::ElementGetterWithoutModelSetter)
        } else if present(&model_getter) && !present(&element_setter) {
            Some(ContractViolation::ModelGetterWithoutElementSetter)
        } else if observe && !present(&model_getter) {
            Some(ContractViolation::ObserveWithoutModelGetter)
        } else {
            None
        };

        let binding = ModelBinding {
            element_setter,
            element_setter_param: ParamShape::Kind(ValueKind::Text),
            element_getter,
            element_event,
            model_setter,
            model_setter_param: ParamShape::Any,
            model_getter,
            register_for_model_changes: observe,
        };
        match (bind_one(binding), expected) {
            (Ok(()), None) => {}
            (Err(BindError::Contract { field, violation }), Some(want)) => {
                prop_assert_eq!(field, "name_input");
                prop_assert_eq!(violation, want);
            }
            (outcome, want) => prop_assert!(false, "got {:?}, expected {:?}", outcome, want),
        }
    }
}

#[test]
fn two_way_field_needs_a_cell_getter() {
    let err = bind_one(name_binding().model_getter("greeting")).unwrap_err();
    assert!(matches!(
        err,
        BindError::Contract {
            violation: ContractViolation::ModelGetterNotCell { ref getter },
            ..
        } if getter == "greeting"
    ));

    // The same getter is fine for a one-way field.
    bind_one(name_binding().model_getter("greeting").register_for_model_changes(false)).unwrap();
}

#[test]
fn plain_getter_loads_one_way() {
    let binder = binder();
    let descriptor = BindingDescriptor::element("greeting")
        .resource(ids::NAME_INPUT)
        .model(
            ModelBinding::new()
                .element_setter("set_text")
                .model_getter("greeting"),
        );
    let (widgets, screen) = single_field_screen("greeting", descriptor);
    let model = ProfileModel::new("Ann");
    let report = binder
        .init(&screen, BindOptions::new(), handle(&model))
        .unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(widgets.name.text(), "Hello, Ann");
}

// ============================================================================
// Resolution failures
// ============================================================================

#[test]
fn unknown_accessor_lists_candidates() {
    let err = bind_one(name_binding().element_setter_param(ValueKind::Bool)).unwrap_err();
    match err {
        BindError::AccessorNotFound {
            name, candidates, ..
        } => {
            assert_eq!(name, "set_text");
            assert_eq!(candidates, vec!["set_text(text)".to_owned()]);
        }
        other => panic!("unexpected {other:?}"),
    }

    let err = bind_one(name_binding().model_setter("set_nickname")).unwrap_err();
    assert!(matches!(
        err,
        BindError::AccessorNotFound { ref candidates, .. } if candidates.is_empty()
    ));
}

#[test]
fn missing_resource_id_fails_the_bind() {
    let binder = binder();
    let descriptor = BindingDescriptor::element("ghost").resource(ResourceId(0xdead));
    let (_widgets, screen) = single_field_screen("ghost", descriptor);
    let err = binder.bind(&screen, 0, None).unwrap_err();
    assert!(matches!(err, BindError::ResourceNotFound { ref field, .. } if field == "ghost"));
    assert!(binder.store().is_empty());
}

#[test]
fn unsupported_field_type_fails_the_bind() {
    let binder = binder();
    let descriptor =
        BindingDescriptor::new("counter", FieldKind::Other("u32".into())).resource(ids::NAME_INPUT);
    let (_widgets, screen) = single_field_screen("counter", descriptor);
    let err = binder.bind(&screen, 0, None).unwrap_err();
    assert!(matches!(err, BindError::UnsupportedFieldType { ref declared, .. } if declared == "u32"));
}

#[test]
fn field_without_element_is_a_contract_error() {
    let binder = binder();
    let descriptor = BindingDescriptor::element("detached").model(name_binding());
    let (_widgets, screen) = single_field_screen("detached", descriptor);
    let err = binder
        .bind(&screen, 0, handle(&ProfileModel::new("Ann")))
        .unwrap_err();
    assert!(matches!(
        err,
        BindError::Contract {
            violation: ContractViolation::MissingElement,
            ..
        }
    ));
}

#[test]
fn pre_filled_slot_binds_without_resource_id() {
    let binder = binder();
    let input = Arc::new(TextInput::new());
    let screen = Screen::new("slotted")
        .level(vec![BindingDescriptor::element("nickname").model(name_binding())])
        .slot("nickname", Arc::clone(&input));
    let model = ProfileModel::new("Ann");
    binder
        .init(&screen, BindOptions::new(), handle(&model))
        .unwrap();
    assert_eq!(input.text(), "Ann");
    input.set_text("Bee");
    assert_eq!(model.name(), "Bee");
}

#[test]
fn ancestor_levels_are_collected_up_to_depth() {
    let binder = binder();
    let widgets = ProfileWidgets::new();
    let screen = Screen::new("nested")
        .root(Arc::clone(&widgets.tree))
        .level(vec![BindingDescriptor::text("title").resource(ids::TITLE)])
        .level(vec![
            BindingDescriptor::element("name_input")
                .resource(ids::NAME_INPUT)
                .model(name_binding()),
        ]);
    let model = ProfileModel::new("Ann");

    binder
        .init(&screen, BindOptions::new().ancestor_depth(1), handle(&model))
        .unwrap();
    assert_eq!(widgets.name.text(), "Ann");
    let session = binder.session(&screen).unwrap();
    assert_eq!(session.lock().unwrap().fields().len(), 2);

    let shallow = Screen::new("shallow")
        .root(Arc::clone(&widgets.tree))
        .level(vec![BindingDescriptor::text("title").resource(ids::TITLE)])
        .level(vec![BindingDescriptor::element("name_input").resource(ids::NAME_INPUT)]);
    binder.bind(&shallow, 0, None).unwrap();
    let session = binder.session(&shallow).unwrap();
    assert_eq!(session.lock().unwrap().fields().len(), 1);
}

// ============================================================================
// Observer resilience
// ============================================================================

#[test]
fn failing_observer_is_dropped_and_others_still_run() {
    let cell = ReactiveCell::new(0_i64);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&seen);
    cell.observe(move |v| first.lock().unwrap().push(("first", *v)));
    cell.try_observe(|_| Err(ObserverError::new("boom")));
    let third = Arc::clone(&seen);
    cell.observe(move |v| third.lock().unwrap().push(("third", *v)));

    cell.set(1);
    assert_eq!(*seen.lock().unwrap(), vec![("third", 1), ("first", 1)]);
    assert_eq!(cell.observer_count(), 2);

    cell.set(2);
    assert_eq!(seen.lock().unwrap().len(), 4);
    assert_eq!(cell.get(), Some(2));
}
