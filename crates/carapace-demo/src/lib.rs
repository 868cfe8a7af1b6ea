//! Command-line front end for the crab gender classifier
//!
//! Wraps the inference core in a [`Session`]: upload validation, the blob
//! store backing image references, retry presentation and an event bus.

pub mod cli;
pub mod config;
pub mod model_card;
pub mod output;
pub mod state;
pub mod upload;

pub use cli::*;
pub use config::DemoConfig;
pub use model_card::{AccuracyLevel, ModelCard};
pub use state::*;
pub use upload::*;
