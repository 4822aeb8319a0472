//! Implementations of the collaborator contracts.

pub mod content;
pub mod http;
pub mod mock;

pub use content::FsContentSource;
pub use http::HttpCollaborator;
pub use mock::{CallCounts, InMemoryProgress, MockGenerativeText};
