use nalgebra::DMatrix;

use crate::errors::VotingError;

/// The ratings given by voters to candidates.
///
/// A thin wrapper around an `n_voters x n_candidates` matrix of reals.
/// Rules borrow it read-only; manipulation analyzers keep their own working
/// copy and restore any temporary overwrite before returning.
#[derive(Debug, Clone, PartialEq)]
pub struct Ratings {
    matrix: DMatrix<f64>,
}

impl Ratings {
    pub fn new(matrix: DMatrix<f64>) -> Ratings {
        Ratings { matrix }
    }

    /// Builds ratings from per-voter rows. All rows must have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Ratings, VotingError> {
        let expected = rows.first().map_or(0, |r| r.len());
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != expected {
                return Err(VotingError::RaggedRows {
                    row: idx,
                    expected,
                    actual: row.len(),
                });
            }
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        Ok(Ratings {
            matrix: DMatrix::from_row_slice(rows.len(), expected, &flat),
        })
    }

    pub fn n_voters(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_candidates(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn get(&self, voter: usize, candidate: usize) -> f64 {
        self.matrix[(voter, candidate)]
    }

    pub fn set(&mut self, voter: usize, candidate: usize, value: f64) {
        self.matrix[(voter, candidate)] = value;
    }

    /// The ratings given by one voter to all candidates.
    pub fn voter_ratings(&self, voter: usize) -> Vec<f64> {
        self.matrix.row(voter).iter().copied().collect()
    }

    /// The ratings received by one candidate from all voters.
    pub fn candidate_ratings(&self, candidate: usize) -> Vec<f64> {
        self.matrix.column(candidate).iter().copied().collect()
    }

    pub fn min_rating(&self) -> f64 {
        self.matrix.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_rating(&self) -> f64 {
        self.matrix
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Rescales all entries to `[0, 1]` by the global minimum and maximum.
    /// Returned unchanged when all entries are equal.
    pub fn normalized(&self) -> Ratings {
        let min = self.min_rating();
        let max = self.max_rating();
        if !(max > min) {
            return self.clone();
        }
        Ratings {
            matrix: self.matrix.map(|x| (x - min) / (max - min)),
        }
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }
}
