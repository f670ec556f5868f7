//! Concrete scoring rules.

mod fast;
mod features;
mod product;
mod svd;

pub use fast::{FastAggregation, RuleFast};
pub use features::RuleFeatures;
pub use product::RuleProductRatings;
pub use svd::{RuleSvd, SingularAggregation};
