//! Judging moves and positions: the move classifier, the background
//! position evaluator and the rating engine.

pub mod classifier;
pub mod evaluator;
pub mod rating;

pub use classifier::{classify, MoveQuality};
pub use evaluator::{Evaluator, EvaluatorConfig, EvaluatorEvent, RetentionStrategy};
pub use rating::{RatingEngine, RatingOutcome};
