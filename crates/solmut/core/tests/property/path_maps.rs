//! Property tests: every edit maps surviving paths onto the same nodes, and
//! the reverse map undoes the forward map.

use super::{statement, statements, tree_with_statements};
use proptest::prelude::*;
use solmut_ast::{Ast, Node};
use solmut_core::{Deletion, Insertion, Movement, Mutation, MutationSequence};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A statement count and an index inside it.
fn arb_list_and_index() -> impl Strategy<Value = (usize, usize)> {
    (1usize..8).prop_flat_map(|len| (Just(len), 0..len))
}

/// A statement count and an insertion slot, `0..=len`.
fn arb_list_and_slot() -> impl Strategy<Value = (usize, usize)> {
    (0usize..8).prop_flat_map(|len| (Just(len), 0..=len))
}

fn arb_new_statement() -> impl Strategy<Value = Node> {
    "[a-z]{1,6}".prop_map(|name| {
        Node::new("ExpressionStatement").with("expression", Node::new("Identifier").with("name", name))
    })
}

fn same_node(before: &Ast, after: &Ast, old: usize, mutation: &Mutation) -> bool {
    let Some(mapped) = mutation.forward_map(&statement(old)) else {
        return false;
    };
    match (before.node_at(&statement(old)), after.node_at(&mapped)) {
        (Some(a), Some(b)) => a.canonical_eq(b),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// A deletion drops its target and keeps every other statement addressable.
    #[test]
    fn deletion_maps_survivors((len, target) in arb_list_and_index()) {
        let before = tree_with_statements(len);
        let mutation: Mutation = Deletion::new(statement(target)).unwrap().into();
        let after = mutation.apply(&before).unwrap();

        prop_assert_eq!(mutation.forward_map(&statement(target)), None);
        for i in (0..len).filter(|i| *i != target) {
            prop_assert!(same_node(&before, &after, i, &mutation));
            let mapped = mutation.forward_map(&statement(i)).unwrap();
            prop_assert_eq!(mutation.reverse_map(&mapped), Some(statement(i)));
        }
    }

    /// An insertion shifts later statements and the new slot has no origin.
    #[test]
    fn insertion_maps_everything(
        (len, slot) in arb_list_and_slot(),
        node in arb_new_statement(),
    ) {
        let before = tree_with_statements(len);
        let mutation: Mutation = Insertion::new(statements(), slot, node.clone()).into();
        let after = mutation.apply(&before).unwrap();

        prop_assert!(after.node_at(&statement(slot)).unwrap().canonical_eq(&node));
        prop_assert_eq!(mutation.reverse_map(&statement(slot)), None);
        for i in 0..len {
            prop_assert!(same_node(&before, &after, i, &mutation));
            let mapped = mutation.forward_map(&statement(i)).unwrap();
            prop_assert_eq!(mutation.reverse_map(&mapped), Some(statement(i)));
        }
    }

    /// Deleting the statement an insertion just placed gives back the tree.
    #[test]
    fn insert_then_delete_restores_the_tree(
        (len, slot) in arb_list_and_slot(),
        node in arb_new_statement(),
    ) {
        let before = tree_with_statements(len);
        let sequence = MutationSequence::from(vec![
            Insertion::new(statements(), slot, node).into(),
            Deletion::new(statement(slot)).unwrap().into(),
        ]);
        prop_assert_eq!(sequence.apply(&before).unwrap(), tree_with_statements(len));
    }

    /// A movement keeps every statement, including the moved one, addressable.
    #[test]
    fn movement_maps_everything(
        (len, from) in arb_list_and_index(),
        to in 0usize..9,
    ) {
        let before = tree_with_statements(len);
        let movement = Movement::new(&before, statement(from), statements(), to.min(len));
        prop_assume!(movement.is_ok());
        let mutation: Mutation = movement.unwrap().into();
        let after = mutation.apply(&before).unwrap();

        for i in 0..len {
            prop_assert!(same_node(&before, &after, i, &mutation));
            let mapped = mutation.forward_map(&statement(i)).unwrap();
            prop_assert_eq!(mutation.reverse_map(&mapped), Some(statement(i)));
        }
    }
}
