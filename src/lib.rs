pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod store;
pub mod sweep;
pub mod table;
pub mod types;

pub use error::{FeatureError, Result};
pub use features::FeatureConfig;
pub use store::{DirectoryStore, FeatureStore};
pub use sweep::{FeatureSweep, SweepPlan, SweepReport};
pub use types::{Feature, SampleBuffer, VectorFeature};
