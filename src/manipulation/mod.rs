//! Manipulation analyzers: can voters change the outcome by misreporting?
//!
//! The analyzers probe counterfactual outcomes by temporarily overwriting
//! cells of a working ratings matrix. The overwrites go through
//! [`RatingsPatch`], which records the previous values and restores them on
//! drop, so the matrix is back to its original state on every exit path,
//! including early error returns.

pub mod coalition;
pub mod voter;

use crate::ratings::Ratings;

/// Scoped overwrite of ratings cells, restored on drop.
pub(crate) struct RatingsPatch<'a> {
    ratings: &'a mut Ratings,
    saved: Vec<(usize, usize, f64)>,
}

impl<'a> RatingsPatch<'a> {
    pub(crate) fn new(ratings: &'a mut Ratings) -> RatingsPatch<'a> {
        RatingsPatch {
            ratings,
            saved: Vec::new(),
        }
    }

    pub(crate) fn set(&mut self, voter: usize, candidate: usize, value: f64) {
        self.saved
            .push((voter, candidate, self.ratings.get(voter, candidate)));
        self.ratings.set(voter, candidate, value);
    }

    /// Overwrites a whole voter row with one value.
    pub(crate) fn set_row_uniform(&mut self, voter: usize, value: f64) {
        for candidate in 0..self.ratings.n_candidates() {
            self.set(voter, candidate, value);
        }
    }

    pub(crate) fn ratings(&self) -> &Ratings {
        self.ratings
    }
}

impl Drop for RatingsPatch<'_> {
    fn drop(&mut self) {
        // Reverse order: a cell overwritten twice gets its first saved value
        // back last.
        while let Some((voter, candidate, value)) = self.saved.pop() {
            self.ratings.set(voter, candidate, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_restores_on_drop() {
        let mut ratings =
            Ratings::from_rows(&[vec![0.1, 0.2], vec![0.3, 0.4]]).unwrap();
        let original = ratings.clone();
        {
            let mut patch = RatingsPatch::new(&mut ratings);
            patch.set(0, 1, 9.0);
            patch.set(1, 0, -1.0);
            assert_eq!(patch.ratings().get(0, 1), 9.0);
        }
        assert_eq!(ratings, original);
    }

    #[test]
    fn patch_restores_doubly_written_cells() {
        let mut ratings = Ratings::from_rows(&[vec![0.5, 0.5]]).unwrap();
        let original = ratings.clone();
        {
            let mut patch = RatingsPatch::new(&mut ratings);
            patch.set_row_uniform(0, 1.0);
            patch.set_row_uniform(0, 0.0);
        }
        assert_eq!(ratings, original);
    }
}
