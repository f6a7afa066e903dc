//! Public facade crate for `pagechat`.
//!
//! This crate intentionally contains no IO or provider-specific logic.
//! It re-exports the backend-agnostic types/traits from `pagechat-core`.

pub use pagechat_core::*;
