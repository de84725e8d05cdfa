//! `one sig` always allocates exactly one atom, with
//! no facts needed to force it.

mod common;

use ligature::driver::CommandOutcome;

#[test]
fn one_sig_has_exactly_one_atom() {
    let source = r#"
        one sig S {}
        run {} for 3
    "#;

    let result = common::run(source, false);
    assert!(!result.diags.has_errors(), "unexpected diagnostics: {:?}", result.diags.sorted());

    match result.outcome {
        Some(CommandOutcome::Model(instance)) => {
            let s = instance.states[0].sigs.get("S").expect("S in instance");
            assert_eq!(s.len(), 1, "expected |S| == 1, got {}", s.len());
        }
        other => panic!("expected a satisfying model, got {other:?}"),
    }
}
