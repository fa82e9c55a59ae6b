pub mod clock;
pub mod config;
pub mod consent;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod permission;
pub mod policy;
pub mod port;
pub mod redact;
pub mod resources;
pub mod service;
pub mod store;
pub mod submission;
pub mod types;
pub mod utils;
pub mod version;

pub use error::EngineError;
pub use service::SubmissionService;
