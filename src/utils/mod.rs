//! Filename and link helpers

pub mod filename;
pub mod url;

pub use filename::*;
pub use url::*;
