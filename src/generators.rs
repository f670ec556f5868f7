//! Random profile generators for simulations.
//!
//! All generators take the random source as an explicit argument, so a seeded
//! `StdRng` reproduces the same profiles run after run. The rules make no
//! distributional assumption; these generators only exist to feed them.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::embeddings::Embeddings;
use crate::errors::VotingError;
use crate::ratings::Ratings;

/// Uniform i.i.d. ratings in `[minimum, maximum)`.
#[derive(Debug, Clone)]
pub struct RatingsGeneratorUniform {
    n_voters: usize,
    minimum: f64,
    maximum: f64,
}

impl RatingsGeneratorUniform {
    /// Uniform ratings in `[0, 1)`.
    pub fn new(n_voters: usize) -> RatingsGeneratorUniform {
        RatingsGeneratorUniform {
            n_voters,
            minimum: 0.0,
            maximum: 1.0,
        }
    }

    pub fn with_range(
        n_voters: usize,
        minimum: f64,
        maximum: f64,
    ) -> Result<RatingsGeneratorUniform, VotingError> {
        if !(minimum < maximum) {
            return Err(VotingError::ParameterOutOfRange {
                name: "maximum - minimum",
                value: maximum - minimum,
            });
        }
        Ok(RatingsGeneratorUniform {
            n_voters,
            minimum,
            maximum,
        })
    }

    pub fn generate<R: Rng>(&self, n_candidates: usize, rng: &mut R) -> Ratings {
        let span = self.maximum - self.minimum;
        let matrix = DMatrix::from_fn(self.n_voters, n_candidates, |_, _| {
            self.minimum + span * rng.gen::<f64>()
        });
        Ratings::new(matrix)
    }
}

/// Random embeddings: each row is the absolute value of a standard Gaussian
/// vector, L2-normalized, so every voter sits on the positive orthant of the
/// unit sphere.
#[derive(Debug, Clone)]
pub struct EmbeddingsGeneratorRandom {
    n_voters: usize,
    n_dim: usize,
}

impl EmbeddingsGeneratorRandom {
    pub fn new(n_voters: usize, n_dim: usize) -> EmbeddingsGeneratorRandom {
        EmbeddingsGeneratorRandom { n_voters, n_dim }
    }

    pub fn generate<R: Rng>(&self, rng: &mut R) -> Embeddings {
        let matrix = DMatrix::from_fn(self.n_voters, self.n_dim, |_, _| {
            rng.sample::<f64, _>(StandardNormal).abs()
        });
        Embeddings::new(matrix, true)
    }
}

/// Parametrized embeddings with `n_dim` groups of voters.
///
/// At construction every voter draws a random direction and is assigned to
/// the group axis that direction leans towards the most. `generate` then
/// interpolates along the great circle between the random direction
/// (`polarisation = 0`) and the group axis (`polarisation = 1`), so one
/// generator produces a whole family of profiles with identical group
/// structure.
#[derive(Debug, Clone)]
pub struct EmbeddingsGeneratorPolarized {
    orthogonal: DMatrix<f64>,
    random: DMatrix<f64>,
    thetas: Vec<f64>,
}

impl EmbeddingsGeneratorPolarized {
    /// Groups are drawn with uniform probabilities.
    pub fn new<R: Rng>(
        n_voters: usize,
        n_dim: usize,
        rng: &mut R,
    ) -> Result<EmbeddingsGeneratorPolarized, VotingError> {
        let probabilities = vec![1.0 / n_dim as f64; n_dim];
        EmbeddingsGeneratorPolarized::with_probabilities(n_voters, n_dim, &probabilities, rng)
    }

    /// `probabilities[d]` biases the group assignment towards dimension `d`.
    pub fn with_probabilities<R: Rng>(
        n_voters: usize,
        n_dim: usize,
        probabilities: &[f64],
        rng: &mut R,
    ) -> Result<EmbeddingsGeneratorPolarized, VotingError> {
        if probabilities.len() != n_dim {
            return Err(VotingError::DimensionMismatch {
                actual: probabilities.len(),
                expected: n_dim,
            });
        }
        let mut orthogonal = DMatrix::zeros(n_voters, n_dim);
        let mut random = DMatrix::zeros(n_voters, n_dim);
        let mut thetas = Vec::with_capacity(n_voters);
        for voter in 0..n_voters {
            let direction: Vec<f64> = (0..n_dim)
                .map(|_| rng.sample::<f64, _>(StandardNormal).abs())
                .collect();
            let group = argmax_weighted(&direction, probabilities);
            let direction = normalized(&direction);
            orthogonal[(voter, group)] = 1.0;
            for dim in 0..n_dim {
                random[(voter, dim)] = direction[dim];
            }
            // Angle between the voter's random direction and her group axis.
            thetas.push(direction[group].clamp(-1.0, 1.0).acos());
        }
        Ok(EmbeddingsGeneratorPolarized {
            orthogonal,
            random,
            thetas,
        })
    }

    /// `polarisation = 0` reproduces the random profile, `polarisation = 1`
    /// collapses every voter onto her group axis.
    pub fn generate(&self, polarisation: f64) -> Result<Embeddings, VotingError> {
        if !(0.0..=1.0).contains(&polarisation) {
            return Err(VotingError::ParameterOutOfRange {
                name: "polarisation",
                value: polarisation,
            });
        }
        let n_voters = self.orthogonal.nrows();
        let n_dim = self.orthogonal.ncols();
        let mut positions = DMatrix::zeros(n_voters, n_dim);
        for voter in 0..n_voters {
            let orthogonal: Vec<f64> =
                (0..n_dim).map(|d| self.orthogonal[(voter, d)]).collect();
            let random: Vec<f64> = (0..n_dim).map(|d| self.random[(voter, d)]).collect();
            let along: f64 = orthogonal
                .iter()
                .zip(&random)
                .map(|(o, r)| o * r)
                .sum();
            // Orthogonal component of the random direction w.r.t. the axis.
            let residual: Vec<f64> = random
                .iter()
                .zip(&orthogonal)
                .map(|(r, o)| r - along * o)
                .collect();
            let residual = normalized(&residual);
            let angle = self.thetas[voter] * (1.0 - polarisation);
            for dim in 0..n_dim {
                positions[(voter, dim)] =
                    orthogonal[dim] * angle.cos() + residual[dim] * angle.sin();
            }
        }
        Ok(Embeddings::new(positions, false))
    }
}

/// Ratings correlated to the embeddings through a group-score matrix.
///
/// `group_ratings` has one row per embedding dimension and one column per
/// candidate: `group_ratings[(d, c)]` is the rating the group of dimension
/// `d` gives candidate `c`. Each voter's structured rating is her squared,
/// normalized embedding row times that matrix; `coherence` mixes it with
/// uniform noise (0 gives pure noise, 1 pure structure).
#[derive(Debug, Clone)]
pub struct RatingsFromEmbeddingsCorrelated {
    coherence: f64,
    group_ratings: DMatrix<f64>,
    minimum: f64,
    maximum: f64,
    clip: bool,
}

impl RatingsFromEmbeddingsCorrelated {
    pub fn new(
        coherence: f64,
        group_ratings: DMatrix<f64>,
    ) -> Result<RatingsFromEmbeddingsCorrelated, VotingError> {
        if !(0.0..=1.0).contains(&coherence) {
            return Err(VotingError::ParameterOutOfRange {
                name: "coherence",
                value: coherence,
            });
        }
        Ok(RatingsFromEmbeddingsCorrelated {
            coherence,
            group_ratings,
            minimum: 0.0,
            maximum: 1.0,
            clip: false,
        })
    }

    /// Clamp the final ratings into the random range.
    pub fn clip(mut self) -> RatingsFromEmbeddingsCorrelated {
        self.clip = true;
        self
    }

    pub fn n_candidates(&self) -> usize {
        self.group_ratings.ncols()
    }

    pub fn generate<R: Rng>(
        &self,
        embeddings: &Embeddings,
        rng: &mut R,
    ) -> Result<Ratings, VotingError> {
        if embeddings.n_dim() != self.group_ratings.nrows() {
            return Err(VotingError::DimensionMismatch {
                actual: embeddings.n_dim(),
                expected: self.group_ratings.nrows(),
            });
        }
        let normalized = Embeddings::new(embeddings.positions().clone(), true);
        let squared = normalized.positions().map(|x| x * x);
        let structured = squared * &self.group_ratings;
        let span = self.maximum - self.minimum;
        let mut matrix = DMatrix::from_fn(
            embeddings.n_voters(),
            self.n_candidates(),
            |_, _| self.minimum + span * rng.gen::<f64>(),
        );
        for voter in 0..matrix.nrows() {
            for candidate in 0..matrix.ncols() {
                let mixed = self.coherence * structured[(voter, candidate)]
                    + (1.0 - self.coherence) * matrix[(voter, candidate)];
                matrix[(voter, candidate)] = if self.clip {
                    mixed.clamp(self.minimum, self.maximum)
                } else {
                    mixed
                };
            }
        }
        Ok(Ratings::new(matrix))
    }
}

/// A ratings sample drawn around per-candidate true values.
///
/// The epistemic generators model voters estimating an objective quantity:
/// every candidate has one true value and each voter's rating is that value
/// plus noise. The truth is returned alongside the ratings so experiments can
/// compare elected candidates against the objectively best one.
#[derive(Debug, Clone, PartialEq)]
pub struct EpistemicSample {
    pub ratings: Ratings,
    pub ground_truth: Vec<f64>,
}

/// Epistemic ratings where voters of the same group share a per-candidate
/// noise variance.
///
/// For each candidate, every group draws a variance (the absolute value of a
/// Gaussian scaled by `group_noise`) and each of its voters rates the true
/// value plus independent Gaussian noise of that variance. True values are
/// uniform in `[minimum, maximum)`, 10 to 20 by default.
#[derive(Debug, Clone)]
pub struct RatingsGeneratorEpistemicGroupedNoise {
    groups_sizes: Vec<usize>,
    group_noise: f64,
    minimum: f64,
    maximum: f64,
}

impl RatingsGeneratorEpistemicGroupedNoise {
    pub fn new(groups_sizes: Vec<usize>) -> RatingsGeneratorEpistemicGroupedNoise {
        RatingsGeneratorEpistemicGroupedNoise {
            groups_sizes,
            group_noise: 1.0,
            minimum: 10.0,
            maximum: 20.0,
        }
    }

    pub fn group_noise(mut self, group_noise: f64) -> RatingsGeneratorEpistemicGroupedNoise {
        self.group_noise = group_noise;
        self
    }

    pub fn n_voters(&self) -> usize {
        self.groups_sizes.iter().sum()
    }

    pub fn generate<R: Rng>(&self, n_candidates: usize, rng: &mut R) -> EpistemicSample {
        let truth = uniform_truth(n_candidates, self.minimum, self.maximum, rng);
        let mut matrix = DMatrix::zeros(self.n_voters(), n_candidates);
        for candidate in 0..n_candidates {
            let mut voter = 0;
            for &size in &self.groups_sizes {
                let variance =
                    (rng.sample::<f64, _>(StandardNormal) * self.group_noise).abs();
                let deviation = variance.sqrt();
                for _ in 0..size {
                    matrix[(voter, candidate)] = truth[candidate]
                        + deviation * rng.sample::<f64, _>(StandardNormal);
                    voter += 1;
                }
            }
        }
        EpistemicSample {
            ratings: Ratings::new(matrix),
            ground_truth: truth,
        }
    }
}

/// Epistemic ratings where group noises are correlated through shared
/// features.
///
/// For each candidate, every feature draws a variance (absolute Gaussian
/// scaled by `group_noise`) and a Gaussian noise of that variance; each
/// group's noise is the barycenter of the feature noises weighted by its
/// (sum-normalized) feature row; each voter adds the noise of her group plus
/// her own Gaussian noise scaled by `independent_noise` (zero by default, so
/// voters of one group rate identically).
#[derive(Debug, Clone)]
pub struct RatingsGeneratorEpistemicGroupedMix {
    groups_sizes: Vec<usize>,
    features: DMatrix<f64>,
    group_noise: f64,
    independent_noise: f64,
    minimum: f64,
    maximum: f64,
}

impl RatingsGeneratorEpistemicGroupedMix {
    /// `features` has one row per group; rows are normalized by their sum.
    pub fn new(
        groups_sizes: Vec<usize>,
        features: &[Vec<f64>],
    ) -> Result<RatingsGeneratorEpistemicGroupedMix, VotingError> {
        if features.len() != groups_sizes.len() {
            return Err(VotingError::DimensionMismatch {
                actual: features.len(),
                expected: groups_sizes.len(),
            });
        }
        let n_features = features.first().map_or(0, |r| r.len());
        for (idx, row) in features.iter().enumerate() {
            if row.len() != n_features {
                return Err(VotingError::RaggedRows {
                    row: idx,
                    expected: n_features,
                    actual: row.len(),
                });
            }
        }
        let mut matrix = DMatrix::zeros(features.len(), n_features);
        for (group, row) in features.iter().enumerate() {
            let total: f64 = row.iter().sum();
            if !(total > 0.0) {
                return Err(VotingError::ParameterOutOfRange {
                    name: "feature row sum",
                    value: total,
                });
            }
            for (feature, value) in row.iter().enumerate() {
                matrix[(group, feature)] = value / total;
            }
        }
        Ok(RatingsGeneratorEpistemicGroupedMix {
            groups_sizes,
            features: matrix,
            group_noise: 1.0,
            independent_noise: 0.0,
            minimum: 10.0,
            maximum: 20.0,
        })
    }

    pub fn group_noise(mut self, group_noise: f64) -> RatingsGeneratorEpistemicGroupedMix {
        self.group_noise = group_noise;
        self
    }

    pub fn independent_noise(
        mut self,
        independent_noise: f64,
    ) -> RatingsGeneratorEpistemicGroupedMix {
        self.independent_noise = independent_noise;
        self
    }

    pub fn n_voters(&self) -> usize {
        self.groups_sizes.iter().sum()
    }

    pub fn generate<R: Rng>(&self, n_candidates: usize, rng: &mut R) -> EpistemicSample {
        let truth = uniform_truth(n_candidates, self.minimum, self.maximum, rng);
        let n_features = self.features.ncols();
        let mut matrix = DMatrix::zeros(self.n_voters(), n_candidates);
        for candidate in 0..n_candidates {
            let feature_noise: Vec<f64> = (0..n_features)
                .map(|_| {
                    let variance =
                        (rng.sample::<f64, _>(StandardNormal) * self.group_noise).abs();
                    variance.sqrt() * rng.sample::<f64, _>(StandardNormal)
                })
                .collect();
            let mut voter = 0;
            for (group, &size) in self.groups_sizes.iter().enumerate() {
                let group_noise: f64 = (0..n_features)
                    .map(|f| self.features[(group, f)] * feature_noise[f])
                    .sum();
                for _ in 0..size {
                    matrix[(voter, candidate)] = truth[candidate]
                        + group_noise
                        + self.independent_noise * rng.sample::<f64, _>(StandardNormal);
                    voter += 1;
                }
            }
        }
        EpistemicSample {
            ratings: Ratings::new(matrix),
            ground_truth: truth,
        }
    }
}

/// Epistemic ratings with an arbitrary voter covariance.
///
/// For each candidate the dependent noise vector is drawn from a centered
/// multivariate Gaussian with the given covariance (factored through its
/// symmetric eigendecomposition, so singular covariances are accepted);
/// each voter adds her own Gaussian noise scaled by `independent_noise`.
#[derive(Debug, Clone)]
pub struct RatingsGeneratorEpistemicMultivariate {
    factor: DMatrix<f64>,
    independent_noise: f64,
    minimum: f64,
    maximum: f64,
}

impl RatingsGeneratorEpistemicMultivariate {
    pub fn new(
        covariance: DMatrix<f64>,
    ) -> Result<RatingsGeneratorEpistemicMultivariate, VotingError> {
        if covariance.nrows() != covariance.ncols() {
            return Err(VotingError::DimensionMismatch {
                actual: covariance.ncols(),
                expected: covariance.nrows(),
            });
        }
        let symmetric = 0.5 * (&covariance + covariance.transpose());
        let eigen = symmetric.symmetric_eigen();
        let scales = DMatrix::from_diagonal(&eigen.eigenvalues.map(|l| l.max(0.0).sqrt()));
        Ok(RatingsGeneratorEpistemicMultivariate {
            factor: eigen.eigenvectors * scales,
            independent_noise: 0.0,
            minimum: 10.0,
            maximum: 20.0,
        })
    }

    pub fn independent_noise(
        mut self,
        independent_noise: f64,
    ) -> RatingsGeneratorEpistemicMultivariate {
        self.independent_noise = independent_noise;
        self
    }

    pub fn n_voters(&self) -> usize {
        self.factor.nrows()
    }

    pub fn generate<R: Rng>(&self, n_candidates: usize, rng: &mut R) -> EpistemicSample {
        let truth = uniform_truth(n_candidates, self.minimum, self.maximum, rng);
        let n_voters = self.n_voters();
        let mut matrix = DMatrix::zeros(n_voters, n_candidates);
        for candidate in 0..n_candidates {
            let draws = DVector::from_fn(n_voters, |_, _| {
                rng.sample::<f64, _>(StandardNormal)
            });
            let dependent = &self.factor * draws;
            for voter in 0..n_voters {
                matrix[(voter, candidate)] = truth[candidate]
                    + dependent[voter]
                    + self.independent_noise * rng.sample::<f64, _>(StandardNormal);
            }
        }
        EpistemicSample {
            ratings: Ratings::new(matrix),
            ground_truth: truth,
        }
    }
}

fn uniform_truth<R: Rng>(n: usize, minimum: f64, maximum: f64, rng: &mut R) -> Vec<f64> {
    (0..n)
        .map(|_| minimum + (maximum - minimum) * rng.gen::<f64>())
        .collect()
}

fn argmax_weighted(values: &[f64], weights: &[f64]) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (index, (v, w)) in values.iter().zip(weights).enumerate() {
        let weighted = v * w;
        if weighted > best_value {
            best_value = weighted;
            best = index;
        }
    }
    best
}

fn normalized(values: &[f64]) -> Vec<f64> {
    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 {
        return values.to_vec();
    }
    values.iter().map(|v| v / norm).collect()
}
