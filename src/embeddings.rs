use nalgebra::DMatrix;

use crate::errors::VotingError;
use crate::ratings::Ratings;

/// The latent positions of the voters.
///
/// An `n_voters x n_dim` matrix; each row is one voter's position in the
/// similarity space. Rows can be L2-normalized at construction, which is the
/// usual presentation for the covariance and SVD based rules. Read-only to
/// rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    positions: DMatrix<f64>,
}

impl Embeddings {
    /// Wraps a positions matrix. With `norm`, every row is rescaled to unit
    /// L2 norm; rows of zero norm are left untouched.
    pub fn new(positions: DMatrix<f64>, norm: bool) -> Embeddings {
        let mut positions = positions;
        if norm {
            for i in 0..positions.nrows() {
                let n = positions.row(i).iter().map(|x| x * x).sum::<f64>().sqrt();
                if n > 0.0 {
                    for j in 0..positions.ncols() {
                        positions[(i, j)] /= n;
                    }
                }
            }
        }
        Embeddings { positions }
    }

    /// Builds embeddings from per-voter rows. All rows must have the same length.
    pub fn from_rows(rows: &[Vec<f64>], norm: bool) -> Result<Embeddings, VotingError> {
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
        Ok(Embeddings::new(
            DMatrix::from_row_slice(rows.len(), expected, &flat),
            norm,
        ))
    }

    pub fn n_voters(&self) -> usize {
        self.positions.nrows()
    }

    pub fn n_dim(&self) -> usize {
        self.positions.ncols()
    }

    pub fn voter_embedding(&self, voter: usize) -> Vec<f64> {
        self.positions.row(voter).iter().copied().collect()
    }

    pub fn positions(&self) -> &DMatrix<f64> {
        &self.positions
    }
}

/// Embeddings inferred from the ratings alone, via voter correlation.
///
/// Each voter's ratings row is L2-normalized and the voter-by-voter
/// correlation matrix of those rows becomes the embedding positions, so every
/// voter lives in an `n_voters`-dimensional space whose axes are the voters
/// themselves. `leading()` is the number of singular directions of the
/// normalized rows carrying a meaningful share of the spectrum (share of the
/// square-rooted singular values at least `1 / min(n_voters, n_candidates)`);
/// rules built on this embedder aggregate only that many eigenvalues.
#[derive(Debug, Clone)]
pub struct EmbeddingsFromRatingsCorrelation {
    embeddings: Embeddings,
    leading: usize,
}

impl EmbeddingsFromRatingsCorrelation {
    pub fn from_ratings(ratings: &Ratings) -> EmbeddingsFromRatingsCorrelation {
        let normalized = Embeddings::new(ratings.matrix().clone(), true);
        let positions = normalized.positions();

        let svd = positions.clone().svd(false, false);
        let mut weights: Vec<f64> = svd
            .singular_values
            .iter()
            .map(|s| s.max(0.0).sqrt())
            .collect();
        weights.sort_by(|a, b| b.total_cmp(a));
        let total: f64 = weights.iter().sum();
        let mut leading = 0;
        if total > 0.0 && ratings.n_voters() > 0 && ratings.n_candidates() > 0 {
            let threshold = (1.0 / ratings.n_voters() as f64)
                .max(1.0 / ratings.n_candidates() as f64);
            while leading < weights.len() && weights[leading] / total >= threshold {
                leading += 1;
            }
        }

        let correlation =
            Embeddings::new(positions * positions.transpose(), true);
        // Row normalization of the correlation skews its symmetry; the
        // symmetric part keeps the eigenvalues real.
        let sym = 0.5 * (correlation.positions() + correlation.positions().transpose());
        EmbeddingsFromRatingsCorrelation {
            embeddings: Embeddings::new(sym, false),
            leading,
        }
    }

    pub fn embeddings(&self) -> &Embeddings {
        &self.embeddings
    }

    /// How many eigenvalues of the correlation matrix are worth keeping.
    pub fn leading(&self) -> usize {
        self.leading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn normalization_rescales_rows() {
        let e = Embeddings::from_rows(&[vec![1.0, 1.0], vec![3.0, 0.0]], true).unwrap();
        let sq2 = std::f64::consts::FRAC_1_SQRT_2;
        assert_abs_diff_eq!(e.positions()[(0, 0)], sq2, epsilon = 1e-12);
        assert_abs_diff_eq!(e.positions()[(0, 1)], sq2, epsilon = 1e-12);
        assert_abs_diff_eq!(e.positions()[(1, 0)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_rows_survive_normalization() {
        let e = Embeddings::from_rows(&[vec![0.0, 0.0]], true).unwrap();
        assert_eq!(e.voter_embedding(0), vec![0.0, 0.0]);
    }

    #[test]
    fn no_normalization_keeps_rows() {
        let e = Embeddings::from_rows(&[vec![2.0, 0.0]], false).unwrap();
        assert_eq!(e.voter_embedding(0), vec![2.0, 0.0]);
    }

    #[test]
    fn correlation_embeddings_are_square_and_symmetric() {
        let ratings = Ratings::from_rows(&[
            vec![0.5, 0.6, 0.3],
            vec![0.7, 0.0, 0.2],
            vec![0.2, 1.0, 0.8],
        ])
        .unwrap();
        let correlation = EmbeddingsFromRatingsCorrelation::from_ratings(&ratings);
        assert_eq!(correlation.leading(), 2);
        let positions = correlation.embeddings().positions();
        assert_eq!(positions.nrows(), 3);
        assert_eq!(positions.ncols(), 3);
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(
                    positions[(i, j)],
                    positions[(j, i)],
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn correlation_of_identical_voters_keeps_one_direction() {
        let ratings = Ratings::from_rows(&[
            vec![0.4, 0.8, 0.2],
            vec![0.4, 0.8, 0.2],
            vec![0.4, 0.8, 0.2],
        ])
        .unwrap();
        let correlation = EmbeddingsFromRatingsCorrelation::from_ratings(&ratings);
        assert_eq!(correlation.leading(), 1);
    }
}
