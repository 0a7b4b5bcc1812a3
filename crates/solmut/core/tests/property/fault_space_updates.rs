//! Property tests: fault-space updates are idempotent and translation never
//! points outside the mutated tree.

use super::{statement, statements, tree_with_statements};
use proptest::prelude::*;
use solmut_ast::NodePath;
use solmut_core::{Deletion, EligibilityPolicy, FaultSpace, FaultSpaceUpdate, Mutation, MutationKind};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn arb_kinds() -> impl Strategy<Value = BTreeSet<MutationKind>> {
    proptest::sample::subsequence(MutationKind::ALL.to_vec(), 1..=4).prop_map(|v| v.into_iter().collect())
}

/// Statement paths of a list of `len`, plus the list owner.
fn arb_paths(len: usize) -> impl Strategy<Value = Vec<NodePath>> {
    let mut all: Vec<NodePath> = (0..len).map(statement).collect();
    all.push(statements().parent().unwrap());
    let max = all.len();
    proptest::sample::subsequence(all, 0..=max)
}

fn arb_tree_and_paths() -> impl Strategy<Value = (usize, Vec<NodePath>)> {
    (1usize..6).prop_flat_map(|len| (Just(len), arb_paths(len)))
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Adding the same paths twice changes nothing the second time.
    #[test]
    fn add_is_idempotent((len, paths) in arb_tree_and_paths(), kinds in arb_kinds()) {
        let ast = tree_with_statements(len);
        let policy = EligibilityPolicy::default();
        let mut space = FaultSpace::build(&ast, paths.clone(), &kinds, &policy);
        let once = space.clone();
        space.update(&ast, &policy, &FaultSpaceUpdate::Add { paths, kinds });
        prop_assert_eq!(space, once);
    }

    /// Intersecting with its own paths or removing absent paths is a no-op.
    #[test]
    fn self_intersection_is_identity((len, paths) in arb_tree_and_paths(), kinds in arb_kinds()) {
        let ast = tree_with_statements(len);
        let policy = EligibilityPolicy::default();
        let mut space = FaultSpace::build(&ast, paths, &kinds, &policy);
        let before = space.clone();
        let own: Vec<NodePath> = space.paths().cloned().collect();
        space.update(&ast, &policy, &FaultSpaceUpdate::Intersect(own));
        space.update(&ast, &policy, &FaultSpaceUpdate::Remove(vec![statement(len + 3)]));
        prop_assert_eq!(space, before);
    }

    /// After a deletion every translated path still exists in the new tree.
    #[test]
    fn translated_paths_exist(
        (len, paths) in arb_tree_and_paths(),
        kinds in arb_kinds(),
        target in 0usize..6,
    ) {
        prop_assume!(target < len);
        let ast = tree_with_statements(len);
        let space = FaultSpace::build(&ast, paths, &kinds, &EligibilityPolicy::default());
        let mutation: Mutation = Deletion::new(statement(target)).unwrap().into();
        let after = mutation.apply(&ast).unwrap();
        let translated = space.translate(&mutation);
        prop_assert!(translated.len() <= space.len());
        for path in translated.paths() {
            prop_assert!(after.node_at(path).is_some(), "{} missing", path);
        }
    }
}
