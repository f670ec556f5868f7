//! Rating aggregation over embedded voters.
//!
//! An election here is a ratings matrix (one row per voter, one column per
//! candidate) paired with an embeddings matrix placing each voter in a
//! low-dimensional space. A [`ScoringRule`] turns the pair into an
//! [`Election`]: one score per candidate, a deterministic ranking, the
//! winner and a normalized welfare vector. Positional and instant-runoff
//! extensions lift any rule to ordinal ballots, and the manipulation
//! analyzers measure how fragile an outcome is to strategic voters.
//!
//! ```
//! use embedded_voting::{Ratings, Embeddings, RuleProductRatings, ScoringRule};
//!
//! let ratings = Ratings::from_rows(&[
//!     vec![0.5, 0.8, 0.2],
//!     vec![0.9, 0.1, 0.4],
//!     vec![0.7, 0.7, 0.3],
//! ])?;
//! let embeddings = Embeddings::from_rows(
//!     &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
//!     true,
//! )?;
//! let election = RuleProductRatings.evaluate(&ratings, &embeddings)?;
//! assert_eq!(election.winner, 0);
//! # Ok::<(), embedded_voting::VotingError>(())
//! ```

mod embeddings;
mod errors;
mod generators;
mod manipulation;
mod positional;
mod ratings;
mod rule;
mod rules;
mod score;

pub use crate::embeddings::{Embeddings, EmbeddingsFromRatingsCorrelation};
pub use crate::errors::VotingError;
pub use crate::generators::{
    EmbeddingsGeneratorPolarized, EmbeddingsGeneratorRandom, EpistemicSample,
    RatingsFromEmbeddingsCorrelated, RatingsGeneratorEpistemicGroupedMix,
    RatingsGeneratorEpistemicGroupedNoise, RatingsGeneratorEpistemicMultivariate,
    RatingsGeneratorUniform,
};
pub use crate::manipulation::coalition::ManipulationCoalition;
pub use crate::manipulation::voter::{ManipulationOrdinal, ManipulationVoter};
pub use crate::positional::{preference_order, RuleInstantRunoff, RulePositional};
pub use crate::ratings::Ratings;
pub use crate::rule::{Election, ScoringRule};
pub use crate::rules::{
    FastAggregation, RuleFast, RuleFeatures, RuleProductRatings, RuleSvd, SingularAggregation,
};
pub use crate::score::Score;
