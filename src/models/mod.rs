pub mod column;
pub mod episode;
