pub mod classify;
pub mod lookup;
pub mod reformulate;
pub mod summarize;
