//! Call coalescing primitives
//!
//! - **[`CallGroup`]**: blocking coalescing for threads
//! - **[`AsyncCallGroup`]**: the same contract for futures
//!
//! Both return `(value, shared)`, where `shared` reports whether the value was
//! delivered to more than one caller.

mod async_call_group;
mod call_group;

pub use async_call_group::AsyncCallGroup;
pub use call_group::CallGroup;
