use std::collections::BTreeMap;

/// Returns the most frequent label, or `None` when there are no labels.
///
/// Counts are gathered in an ordered map, so among equally frequent labels
/// the one that sorts first wins. That tie-break is an implementation detail,
/// not a "first seen" guarantee.
pub fn plurality_vote<L, I>(labels: I) -> Option<L>
where
    L: Ord,
    I: IntoIterator<Item = L>,
{
    let mut counts: BTreeMap<L, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }

    let mut winner: Option<(L, usize)> = None;
    for (label, count) in counts {
        if winner.as_ref().is_none_or(|(_, best)| count > *best) {
            winner = Some((label, count));
        }
    }
    winner.map(|(label, _)| label)
}
