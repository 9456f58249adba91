//! Bar-level factors.

pub mod manip_score;

pub use manip_score::{
    compute_manip_scores, compute_manip_scores_with, compute_score_components, ManipScoreConfig,
    ManipScores, ScoreComponents, ScoreWeights, HIGH_RISK_THRESHOLD, NEUTRAL_SCORE,
};
