//! Trial order across the replicas of one fixture

use std::collections::BTreeSet;

use crate::FixtureAddress;

/// Order in which replicas are tried for the next command
///
/// The hinted address (the last replica that accepted a write) goes first
/// when it is still a candidate; everything else follows in lexicographic
/// order so retries are reproducible. The result is always a permutation of
/// the distinct candidates.
pub fn trial_order<'a, I>(candidates: I, hint: Option<&FixtureAddress>) -> Vec<FixtureAddress>
where
    I: IntoIterator<Item = &'a FixtureAddress>,
{
    let mut rest: BTreeSet<&FixtureAddress> = candidates.into_iter().collect();
    let mut order = Vec::with_capacity(rest.len());

    if let Some(hint) = hint {
        if rest.remove(hint) {
            order.push(hint.clone());
        }
    }

    order.extend(rest.into_iter().cloned());
    order
}
