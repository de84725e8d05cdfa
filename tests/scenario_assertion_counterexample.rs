//! `check` negates the assertion, so a wrong
//! assertion surfaces as a counterexample rather than "assertion holds".

mod common;

use ligature::driver::CommandOutcome;

#[test]
fn false_assertion_yields_a_counterexample() {
    let source = r#"
        sig Person {}
        assert NoPerson { no Person }
        check NoPerson for 3
    "#;

    let result = common::run(source, true);
    assert!(!result.diags.has_errors(), "unexpected diagnostics: {:?}", result.diags.sorted());

    match result.outcome {
        Some(CommandOutcome::CounterExample(instance)) => {
            let person = instance.states[0].sigs.get("Person").expect("Person in instance");
            assert!(!person.is_empty(), "expected |Person| >= 1 in the counterexample");
        }
        other => panic!("expected a counterexample, got {other:?}"),
    }
}
