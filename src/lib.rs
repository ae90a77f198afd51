// Modules
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod genre;
pub mod metadata;
pub mod scratch;
pub mod server;
pub mod tools;

pub use analysis::{analyze_file, AnalysisResult, Happiness};
pub use config::Config;
pub use error::{AnalysisError, ClassifierError, ToolError};
pub use genre::GenreClassifier;
