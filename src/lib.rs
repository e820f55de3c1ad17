pub mod api;
pub mod client;
pub mod config;
pub mod corpus;
pub mod error;
pub mod pacing;
pub mod training;

pub use api::TrainingApi;
pub use client::WitClient;
pub use config::WitConfig;
pub use corpus::Corpus;
pub use error::{WitError, WitResult};
pub use pacing::Pacing;
pub use training::{
    delete_all_utterances, OnError, Trainer, TrainingAborted, TrainingPolicy, TrainingReport,
};
