//! Mock filesystem implementations for testing.
//!
//! This module provides `MockFs` and pre-built host scenarios for exercising
//! the modules and the engine without a Linux `/proc` or `/sys`.

mod filesystem;
mod scenarios;

pub use filesystem::MockFs;
pub use scenarios::MOCK_CORES;
