//! proctor.input_event.v1 schema
//!
//! The wire format for frame results and focus notifications recorded from a
//! host, used for offline replay, the CLI and the FFI streaming entry point.

mod adapter;
mod input_event;

pub use adapter::*;
pub use input_event::*;
