pub mod config;
pub mod errors;
pub mod geometry;
pub mod inline_image;
pub mod types;
