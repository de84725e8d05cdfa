//! An abstract signature's atoms are exactly the
//! disjoint union of its (non-abstract) children's atoms.

mod common;

use std::collections::HashSet;

use ligature::driver::CommandOutcome;

#[test]
fn abstract_parent_is_disjoint_union_of_children() {
    let source = r#"
        abstract sig Animal {}
        sig Dog extends Animal {}
        sig Cat extends Animal {}
        run {} for 3 but 2 Dog, 1 Cat
    "#;

    let result = common::run(source, false);
    assert!(!result.diags.has_errors(), "unexpected diagnostics: {:?}", result.diags.sorted());

    match result.outcome {
        Some(CommandOutcome::Model(instance)) => {
            let state = &instance.states[0];
            let dog = state.sigs.get("Dog").expect("Dog in instance");
            let cat = state.sigs.get("Cat").expect("Cat in instance");
            let animal = state.sigs.get("Animal").expect("Animal in instance");

            assert!(dog.len() <= 2, "|Dog| = {} exceeds scope", dog.len());
            assert!(cat.len() <= 1, "|Cat| = {} exceeds scope", cat.len());

            let dog_atoms: HashSet<_> = dog.iter().map(|t| t[0]).collect();
            let cat_atoms: HashSet<_> = cat.iter().map(|t| t[0]).collect();
            assert!(dog_atoms.is_disjoint(&cat_atoms), "Dog and Cat share an atom");

            let animal_atoms: HashSet<_> = animal.iter().map(|t| t[0]).collect();
            let union: HashSet<_> = dog_atoms.union(&cat_atoms).copied().collect();
            assert_eq!(animal_atoms, union, "Animal is not exactly Dog union Cat");
        }
        other => panic!("expected a satisfying model, got {other:?}"),
    }
}
