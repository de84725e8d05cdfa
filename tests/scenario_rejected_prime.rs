//! Priming a non-`var` relation is a semantic error
//! (E601), not a parse error — caught during semantic analysis.

mod common;

use ligature::diagnostics::Code;
use ligature::semantics::analyze;

#[test]
fn priming_a_non_variable_field_is_rejected() {
    let source = r#"
        sig Person { name: univ }
        pred change { Person.name' != Person.name }
    "#;

    let mut interner = ligature::intern::Interner::new();
    let (module, diags) = common::parse(source, &mut interner);
    assert!(!diags.has_errors(), "unexpected parse errors: {:?}", diags.sorted());

    let analysis = analyze(&module, &mut interner);
    let found = analysis.diags.sorted().iter().any(|d| d.code == Code::PrimedNonVariable);
    assert!(found, "expected E601 primedNonVariable, got {:?}", analysis.diags.sorted());
}
