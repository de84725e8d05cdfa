//! A non-reflexive relation is satisfiable and the
//! extracted instance actually honors the constraint.

mod common;

use ligature::driver::CommandOutcome;

#[test]
fn friends_relation_excludes_self_pairs() {
    let source = r#"
        sig Person { friends: set Person }
        fact { all p: Person | p not in p.friends }
        run {} for 3
    "#;

    let result = common::run(source, false);
    assert!(!result.diags.has_errors(), "unexpected diagnostics: {:?}", result.diags.sorted());

    match result.outcome {
        Some(CommandOutcome::Model(instance)) => {
            let friends = instance.states[0].fields.get("Person.friends").expect("friends field in instance");
            for tuple in friends.iter() {
                assert_eq!(tuple.len(), 2);
                assert_ne!(tuple[0], tuple[1], "found a reflexive friends pair");
            }
        }
        other => panic!("expected a satisfying model, got {other:?}"),
    }
}
