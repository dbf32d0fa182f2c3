//! Round item selection

use super::Item;
use rand::seq::SliceRandom;
use rand::Rng;

/// Pick the item for the next round.
///
/// Uniform over `candidates`, except that the previous round's item is never
/// picked again while there is anything else to choose from. Returns `None`
/// only when `candidates` is empty.
pub fn pick_item<'a, R: Rng + ?Sized>(
    candidates: &[&'a Item],
    excluding: Option<&Item>,
    rng: &mut R,
) -> Option<&'a Item> {
    let fresh: Vec<&'a Item> = match excluding {
        Some(previous) => candidates
            .iter()
            .copied()
            .filter(|c| c.name != previous.name)
            .collect(),
        None => Vec::new(),
    };

    if fresh.is_empty() {
        candidates.choose(rng).copied()
    } else {
        fresh.choose(rng).copied()
    }
}
