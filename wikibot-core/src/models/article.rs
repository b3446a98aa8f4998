use serde::{Deserialize, Serialize};

/// One row returned by the relational store's similarity function.
///
/// The function names its score column `cosine_distance`, but larger values
/// mean closer matches, so rows are ranked by it in descending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SimilarityResult {
    #[sqlx(rename = "cosine_distance")]
    pub distance: f64,
    pub title: String,
    pub url: String,
}
