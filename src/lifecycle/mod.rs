//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Background work (background.rs):
//!     Router submits DNS / connect / close / health / bootstrap work
//!     → Tracked in a JoinSet → Optional completion signal to the submitter
//!
//! Stop signals (shutdown.rs):
//!     Backend goes down → Signal its health monitor → Loop exits
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: close backends (bounded wait), then abort stragglers
//! - Shutdown has timeout: closes still running after the deadline are abandoned

pub mod background;
pub mod shutdown;

pub use background::Background;
pub use shutdown::Shutdown;
