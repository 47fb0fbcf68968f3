//! Store contract for job registrations and the durable event log.
//!
//! The monitor core sees durable state only through the [`JobStore`] trait;
//! [`MemoryStore`] is the reference implementation used by embedded callers
//! and tests.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use traits::JobStore;
