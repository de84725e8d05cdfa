//! Priming a local quantifier variable is always allowed, unlike priming a
//! non-`var` signature or field (see scenario_rejected_prime.rs) — the two
//! must not be conflated, and nesting the quantifier inside a predicate
//! with parameters must not break the scope chain used to resolve it.

mod common;

use ligature::diagnostics::Code;
use ligature::semantics::analyze;

fn primed_non_variable_reported(source: &str) -> bool {
    let mut interner = ligature::intern::Interner::new();
    let (module, diags) = common::parse(source, &mut interner);
    assert!(!diags.has_errors(), "unexpected parse errors: {:?}", diags.sorted());
    let analysis = analyze(&module, &mut interner);
    analysis.diags.sorted().iter().any(|d| d.code == Code::PrimedNonVariable)
}

#[test]
fn priming_a_quantifier_variable_is_not_rejected() {
    let source = r#"
        sig Person {}
        fact { all x: Person | eventually (x' = x) }
    "#;
    assert!(!primed_non_variable_reported(source), "quantifier variables may always be primed");
}

#[test]
fn priming_a_quantifier_variable_nested_in_a_predicate_is_not_rejected() {
    let source = r#"
        sig Person {}
        pred allStable(p: Person) { all x: Person | eventually (x' = x) }
    "#;
    assert!(
        !primed_non_variable_reported(source),
        "the quantifier scope must chain through the predicate's parameter scope"
    );
}

#[test]
fn priming_a_predicate_parameter_is_still_rejected() {
    let source = r#"
        sig Person {}
        pred stable(p: Person) { eventually (p' = p) }
    "#;
    assert!(
        primed_non_variable_reported(source),
        "a parameter is neither a variable relation nor a quantifier variable"
    );
}
