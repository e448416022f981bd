use rand::Rng;
use rand::seq::SliceRandom;

pub const NEGATIVE: [&str; 8] = [
    "Awkward",
    "Boring",
    "Arrogant",
    "Weird",
    "Cringe",
    "Dull",
    "Unattractive",
    "Off-putting",
];

pub const POSITIVE: [&str; 12] = [
    "Attractive",
    "Charming",
    "Cute",
    "Stylish",
    "Playful",
    "Confident",
    "Magnetic",
    "Funny",
    "Bold",
    "Smooth",
    "Warm",
    "Cool",
];

/// Draws `count` distinct entries by picking a random index and removing it,
/// so a short pool can never repeat.
fn pick_random(pool: &[&str], count: usize, rng: &mut impl Rng) -> Vec<String> {
    let mut copy: Vec<&str> = pool.to_vec();
    let n = count.min(copy.len());
    let mut result = Vec::with_capacity(n);
    for _ in 0..n {
        let idx = rng.random_range(0..copy.len());
        result.push(copy.remove(idx).to_owned());
    }
    result
}

/// Deals a four-card deck: one negative and three positives, shuffled.
/// With `must_include`, that adjective takes one of the positive slots and is
/// excluded from the random draw so it cannot appear twice.
pub fn deal(must_include: Option<&str>, rng: &mut impl Rng) -> Vec<String> {
    let mut deck = match must_include {
        Some(wanted) => {
            let negatives: Vec<&str> =
                NEGATIVE.iter().copied().filter(|a| *a != wanted).collect();
            let positives: Vec<&str> =
                POSITIVE.iter().copied().filter(|a| *a != wanted).collect();

            let mut deck = pick_random(&negatives, 1, rng);
            deck.extend(pick_random(&positives, 2, rng));
            deck.push(wanted.to_owned());
            deck
        }
        None => {
            let mut deck = pick_random(&NEGATIVE, 1, rng);
            deck.extend(pick_random(&POSITIVE, 3, rng));
            deck
        }
    };

    deck.shuffle(rng);
    deck
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn deals_one_negative_and_three_positives() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let deck = deal(None, &mut rng);
            assert_eq!(deck.len(), 4);
            let negatives = deck
                .iter()
                .filter(|a| NEGATIVE.contains(&a.as_str()))
                .count();
            let positives = deck
                .iter()
                .filter(|a| POSITIVE.contains(&a.as_str()))
                .count();
            assert_eq!(negatives, 1);
            assert_eq!(positives, 3);
        }
    }

    #[test]
    fn must_include_lands_in_the_deck_exactly_once() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let deck = deal(Some("Charming"), &mut rng);
            assert_eq!(deck.len(), 4);
            assert_eq!(deck.iter().filter(|a| *a == "Charming").count(), 1);
        }
    }

    #[test]
    fn must_include_outside_the_vocabulary_still_deals_four() {
        let mut rng = StdRng::seed_from_u64(7);
        let deck = deal(Some("Enigmatic"), &mut rng);
        assert_eq!(deck.len(), 4);
        assert!(deck.contains(&"Enigmatic".to_owned()));
    }

    #[test]
    fn never_deals_duplicates() {
        let mut rng = StdRng::seed_from_u64(42);
        for round in 0..200 {
            let wanted = if round % 2 == 0 { Some("Cute") } else { None };
            let mut deck = deal(wanted, &mut rng);
            deck.sort();
            deck.dedup();
            assert_eq!(deck.len(), 4);
        }
    }

    #[test]
    fn seeded_rng_deals_deterministically() {
        let a = deal(None, &mut StdRng::seed_from_u64(123));
        let b = deal(None, &mut StdRng::seed_from_u64(123));
        assert_eq!(a, b);
    }
}
