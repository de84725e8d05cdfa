//! A direct contradiction between two facts is UNSAT.

mod common;

use ligature::driver::CommandOutcome;

#[test]
fn contradictory_facts_yield_no_instance() {
    let source = r#"
        sig A {}
        fact { some A }
        fact { no A }
        run {} for 3
    "#;

    let result = common::run(source, false);
    assert!(!result.diags.has_errors(), "unexpected diagnostics: {:?}", result.diags.sorted());
    assert!(matches!(result.outcome, Some(CommandOutcome::NoInstance)), "expected UNSAT, got {:?}", result.outcome);
}
