#![no_main]

use arbitrary::Arbitrary;
use bindery_runtime::{BindError, ContractViolation, ModelBinding};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    element_setter: Option<String>,
    element_getter: Option<String>,
    element_event: Option<String>,
    model_setter: Option<String>,
    model_getter: Option<String>,
    observe: bool,
}

fn set(name: &Option<String>) -> bool {
    name.as_deref().is_some_and(|n| !n.is_empty())
}

// Validation accepts a binding exactly when no contract rule is violated.
fuzz_target!(|input: Input| {
    let violated = (set(&input.element_event) || set(&input.element_getter))
        && !set(&input.model_setter)
        || set(&input.model_getter) && !set(&input.element_setter)
        || input.observe && !set(&input.model_getter);

    let binding = ModelBinding {
        element_setter: input.element_setter,
        element_getter: input.element_getter,
        element_event: input.element_event,
        model_setter: input.model_setter,
        model_getter: input.model_getter,
        register_for_model_changes: input.observe,
        ..ModelBinding::default()
    };
    match binding.validate("field") {
        Ok(()) => assert!(!violated),
        Err(BindError::Contract { violation, .. }) => {
            assert!(violated);
            assert!(!matches!(
                violation,
                ContractViolation::ModelGetterNotCell { .. } | ContractViolation::MissingElement
            ));
        }
        Err(other) => panic!("unexpected error {other}"),
    }
});
