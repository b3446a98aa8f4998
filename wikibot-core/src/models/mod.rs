pub mod article;
pub mod turn;

pub use article::SimilarityResult;
pub use turn::{Role, Turn};
