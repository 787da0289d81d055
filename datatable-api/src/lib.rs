//! DataTable API - Host Integration and Browsing
//!
//! - Query facade and scripting entry point
//! - Host hooks for edit completion, deletion, rendering and schema updates
//! - HTML browsing endpoints over the pager
//! - JSON endpoints exposing the hooks to an out-of-process host

pub mod browse;
pub mod config;
pub mod error;
pub mod facade;
pub mod hooks;
pub mod render;
pub mod routes;
pub mod script;
pub mod state;
pub mod telemetry;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode, HostError, HostResult};
pub use facade::{QueryFacade, RenderContext};
pub use hooks::{DataTableHost, DeleteOutcome, EditOutcome, RenderOutcome, RenderedSelect};
pub use routes::create_router;
pub use script::ScriptValue;
pub use state::AppState;
