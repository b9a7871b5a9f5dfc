//! Shutterlift Library
//!
//! Directory-watching image uploader with deferred retry.
//!
//! # Features
//!
//! - **Watch and Ship**: Observes a drop directory and uploads each new image
//! - **Delete on Success**: Local copies are removed once the remote store confirms
//! - **Bounded Retry**: A fixed number of immediate attempts per file, then a deferred queue
//! - **Timed Sweep**: Failed uploads are re-attempted on a fixed cadence
//!
//! # Example
//!
//! ```no_run
//! use shutterlift::{config::Config, service::Service};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let service = Service::new(config)?;
//!     service.run().await?;
//!     Ok(())
//! }
//! ```

pub mod cloudinary;
pub mod config;
pub mod metrics;
pub mod service;
pub mod upload;
pub mod watcher;

// Re-export commonly used types
pub use config::Config;
pub use service::Service;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
