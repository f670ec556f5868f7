use std::cmp::Ordering;

/// The score a rule assigns to one candidate.
///
/// Either a plain scalar or an ordered pair compared lexicographically
/// (integer component first, then the float component). A given rule always
/// produces one shape; the cross-shape order exists only to keep the
/// comparison total. Floats are compared with `total_cmp`, so ties and the
/// resulting rankings are fully deterministic.
#[derive(Debug, Clone, Copy)]
pub enum Score {
    Single(f64),
    Pair(u64, f64),
}

impl Score {
    /// The float component of the score.
    pub fn value(&self) -> f64 {
        match *self {
            Score::Single(v) => v,
            Score::Pair(_, v) => v,
        }
    }

    /// The integer component, when the score is a pair.
    pub fn leading(&self) -> Option<u64> {
        match *self {
            Score::Single(_) => None,
            Score::Pair(c, _) => Some(c),
        }
    }
}

impl PartialEq for Score {
    fn eq(&self, other: &Score) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl Ord for Score {
    fn cmp(&self, other: &Score) -> Ordering {
        match (self, other) {
            (Score::Single(a), Score::Single(b)) => a.total_cmp(b),
            (Score::Pair(ca, va), Score::Pair(cb, vb)) => {
                ca.cmp(cb).then_with(|| va.total_cmp(vb))
            }
            (Score::Single(_), Score::Pair(_, _)) => Ordering::Less,
            (Score::Pair(_, _), Score::Single(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Score) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Projects scores to the scalars used by the welfare normalization.
///
/// Scalar scores are taken as-is. Pair scores keep their float component only
/// when the integer component is maximal over all candidates, and collapse to
/// zero otherwise, so that candidates dominated on the first component never
/// outrank the leaders on welfare.
pub(crate) fn scores_to_floats(scores: &[Score]) -> Vec<f64> {
    let max_leading = scores.iter().filter_map(Score::leading).max();
    match max_leading {
        Some(m) => scores
            .iter()
            .map(|s| match *s {
                Score::Pair(c, v) if c == m => v,
                Score::Pair(_, _) => 0.0,
                Score::Single(v) => v,
            })
            .collect(),
        None => scores.iter().map(Score::value).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_comparison_is_lexicographic() {
        // More nonzero ratings always beats a larger product.
        assert!(Score::Pair(3, 0.048) > Score::Pair(2, 0.6));
        assert!(Score::Pair(3, 0.07) > Score::Pair(3, 0.048));
        assert_eq!(Score::Pair(2, 0.5), Score::Pair(2, 0.5));
    }

    #[test]
    fn single_comparison() {
        assert!(Score::Single(1.5) > Score::Single(0.2));
        assert!(Score::Single(-0.1) < Score::Single(0.0));
    }

    #[test]
    fn floats_of_pairs_keep_only_the_top_count() {
        let floats = scores_to_floats(&[
            Score::Pair(3, 0.07),
            Score::Pair(2, 0.6),
            Score::Pair(3, 0.048),
        ]);
        assert_eq!(floats, vec![0.07, 0.0, 0.048]);
    }

    #[test]
    fn floats_of_singles_pass_through() {
        let floats = scores_to_floats(&[Score::Single(0.25), Score::Single(1.0)]);
        assert_eq!(floats, vec![0.25, 1.0]);
    }
}
