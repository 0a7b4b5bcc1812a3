//! One-point crossover of two edit histories.

use crate::error::CrossoverError;
use crate::mutation::Mutation;
use crate::sequence::MutationSequence;
use solmut_ast::Ast;
use tracing::trace;

/// Recombine two histories of the same origin.
///
/// A cross point `Some(c)` keeps the first `c + 1` steps of its parent as the
/// prefix; `None` keeps no prefix. Child A is the prefix of `s1` followed by
/// the suffix of `s2` rebased onto it; child B is the mirror image. A child
/// is cut short at the first donor step that cannot be rebased or applied,
/// and never grows longer than the longer parent. Empty children are
/// omitted.
pub fn crossover_one_point(
    origin: &Ast,
    s1: &MutationSequence,
    c1: Option<usize>,
    s2: &MutationSequence,
    c2: Option<usize>,
) -> Result<Vec<MutationSequence>, CrossoverError> {
    let p1 = prefix_len(s1, c1)?;
    let p2 = prefix_len(s2, c2)?;
    let limit = s1.len().max(s2.len());

    let child_a = graft(origin, &s1.prefix(p1), &s2.prefix(p2), s2.suffix(p2), limit)?;
    let child_b = graft(origin, &s2.prefix(p2), &s1.prefix(p1), s1.suffix(p1), limit)?;

    Ok([child_a, child_b]
        .into_iter()
        .filter(|child| !child.is_empty())
        .collect())
}

fn prefix_len(seq: &MutationSequence, point: Option<usize>) -> Result<usize, CrossoverError> {
    match point {
        None => Ok(0),
        Some(point) if point < seq.len() => Ok(point + 1),
        Some(point) => Err(CrossoverError::CrossPointOutOfRange {
            point,
            len: seq.len(),
        }),
    }
}

/// Append `donor_suffix`, written after `donor_prefix`, onto `base`.
fn graft(
    origin: &Ast,
    base: &MutationSequence,
    donor_prefix: &MutationSequence,
    donor_suffix: &[Mutation],
    limit: usize,
) -> Result<MutationSequence, CrossoverError> {
    let mut tree = base.apply(origin)?;
    let mut child = base.clone();
    let mut from = donor_prefix.clone();

    for step in donor_suffix {
        if child.len() >= limit {
            break;
        }
        let Some(rebased) = step.rebase(&from, &child, &tree) else {
            trace!(kind = %step.kind(), at = child.len(), "step does not rebase, truncating child");
            break;
        };
        let Ok(next) = rebased.apply(&tree) else {
            trace!(kind = %step.kind(), at = child.len(), "rebased step does not apply, truncating child");
            break;
        };
        tree = next;
        child.push(rebased);
        from.push(step.clone());
    }
    Ok(child)
}
