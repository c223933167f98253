pub mod analyzer;
pub mod cleaner;
pub mod harmonizer;
pub mod merger;
pub mod reporter;
pub mod validator;

pub use analyzer::Analyzer;
pub use cleaner::{Cleaner, CleaningReport};
pub use harmonizer::SchemaHarmonizer;
pub use merger::{DatasetMerger, MergeOutcome};
pub use reporter::{Report, Reporter};
pub use validator::{ValidationOutcome, Validator};
