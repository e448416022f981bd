pub mod adjectives;
pub mod rules;

use uuid::Uuid;

/// Canonical order for an unordered user pair: smaller id first. Matches are
/// keyed on this, so (a, b) and (b, a) land on the same row.
pub fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_ignores_argument_order() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        assert_eq!(pair_key(a, b), pair_key(b, a));
        let (lo, hi) = pair_key(a, b);
        assert!(lo <= hi);
    }
}
