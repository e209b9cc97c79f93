pub mod backend;
pub mod checkpoint;
pub mod cli;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod inference;
pub mod model;
pub mod training;

pub use error::Error;
