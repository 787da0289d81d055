//! DataTable Core - Entity Types
//!
//! Identity, records, view descriptors, structured queries, configuration
//! and the error taxonomy. All other crates depend on this one; it does no
//! I/O beyond reading a configuration file.

mod config;
mod entities;
mod error;
mod filter;
mod identity;
mod view;

pub use config::*;
pub use entities::*;
pub use error::*;
pub use filter::*;
pub use identity::*;
pub use view::*;
