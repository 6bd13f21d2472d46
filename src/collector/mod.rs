//! Host data sources for the metric modules.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         modules                          │
//! │   cpu   ram   battery   network   storage                │
//! └───────────────────────────┬──────────────────────────────┘
//!                             │
//!              ┌──────────────▼──────────────┐
//!              │  procfs parsers (pure fns)  │
//!              └──────────────┬──────────────┘
//!                             │
//!                      ┌──────▼──────┐
//!                      │  FileSystem │ (trait)
//!                      └──────┬──────┘
//!                 ┌───────────┴───────────┐
//!          ┌──────▼──────┐         ┌──────▼──────┐
//!          │   RealFs    │         │   MockFs    │
//!          │ (Linux)     │         │ (Testing)   │
//!          └─────────────┘         └─────────────┘
//! ```

pub mod mock;
pub mod procfs;
pub mod traits;

pub use mock::MockFs;
pub use traits::{FileSystem, FsUsage, RealFs};
