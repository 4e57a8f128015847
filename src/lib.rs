pub mod config;
pub mod connect;
pub mod error;
pub mod load;
pub mod report;
pub mod schema;
pub mod source;

pub use error::PipelineError;
pub use source::Record;
