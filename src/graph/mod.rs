//! Named traversals and upserts over the clinical graph.
//!
//! - [`GraphReader`]: the fixed set of single-hop reads the question pipeline
//!   and the HTTP surface use
//! - [`GraphWriter`]: idempotent create/attach operations built on the
//!   schema's typed builders
//!
//! Both borrow an injected [`GraphStore`](crate::store::GraphStore); neither
//! holds state of its own.

pub mod read;
pub mod write;

pub use read::GraphReader;
pub use write::GraphWriter;
