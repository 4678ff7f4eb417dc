pub mod client;
pub mod config;
pub mod criteria;
pub mod presenter;
pub mod session;
pub mod state;
pub mod types;

pub use client::{SearchBackend, SearchClient, SearchError};
pub use config::ClientConfig;
pub use criteria::{CriteriaField, PageBoundsPolicy, SearchForm};
pub use state::{Orchestrator, Phase, ResponseFencing, SearchState};
pub use types::*;
