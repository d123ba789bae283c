//! Analyzer implementations that combine tokenizers and filters.

pub mod analyzer;
pub mod message;
pub mod pipeline;

pub use analyzer::Analyzer;
pub use message::MessageAnalyzer;
pub use pipeline::PipelineAnalyzer;
