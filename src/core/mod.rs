//! Core request handling: media model, catalog, sessions and the pipeline

pub mod catalog;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod quota;
pub mod session;

pub use catalog::*;
pub use media::*;
pub use pipeline::*;
pub use progress::*;
pub use quota::*;
pub use session::*;
