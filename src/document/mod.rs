//! Per-document conversion state and text utilities.
//!
//! This module provides:
//! - `DocumentState` and `DocumentStore` for document lifecycle management
//! - `InternalEdit`, a scoped marker for edits the coordinator issues itself
//! - line-ending helpers used on the way in and out of the buffer

mod state;
mod text;

pub use state::{DocumentState, DocumentStore, InternalEdit};
pub use text::{char_len, normalize_newlines, to_crlf};
