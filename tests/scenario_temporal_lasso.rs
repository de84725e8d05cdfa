//! A bounded LTL safety property holds at every state
//! of the lasso-shaped trace, including the state the trace loops back to.

mod common;

use ligature::driver::CommandOutcome;

#[test]
fn always_some_happy_holds_at_every_trace_state() {
    let source = r#"
        var sig Happy {}
        sig Person {}
        fact { always some Happy }
        run {} for 3, 5 steps
    "#;

    let result = common::run(source, false);
    assert!(!result.diags.has_errors(), "unexpected diagnostics: {:?}", result.diags.sorted());

    match result.outcome {
        Some(CommandOutcome::Model(instance)) => {
            assert_eq!(instance.states.len(), 5, "expected a 5-state trace");
            let loop_state = instance.loop_state.expect("a bounded temporal model always has a loop state");
            assert!((loop_state as usize) < instance.states.len());
            for (i, state) in instance.states.iter().enumerate() {
                let happy = state.sigs.get("Happy").expect("Happy in instance");
                assert!(!happy.is_empty(), "state {i} has an empty Happy set");
            }
        }
        other => panic!("expected a satisfying model, got {other:?}"),
    }
}
