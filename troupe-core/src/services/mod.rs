//! Service Layer
//!
//! The multi-tenant front door: the resolver materializes teams from
//! agent specs, the executor binds them into runtimes, and the manager
//! multiplexes clients and sessions over both.

pub mod executor;
pub mod manager;
pub mod resolver;
pub mod store;

pub use executor::Executor;
pub use manager::{Manager, SessionStream};
pub use resolver::{ModelFactory, Resolver, ToolSetFactory};
pub use store::ContentStore;
