pub mod classify;
pub mod config;
mod error;
pub mod fetch;
pub mod manifest;
pub mod naming;
pub mod normalize;
pub mod paths;
pub mod pipeline;

pub use error::{ArticleImagesError, Result};
