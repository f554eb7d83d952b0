//! Download system: credential fallback, orchestration and collection expansion

pub mod credentials;
pub mod orchestrator;
pub mod playlist;

pub use credentials::*;
pub use orchestrator::*;
pub use playlist::*;
