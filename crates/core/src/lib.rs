pub mod config;
pub mod error;
pub mod pipeline;
pub mod schedule;
pub mod source;

pub use config::Config;
pub use error::*;
pub use pipeline::*;
pub use source::*;
