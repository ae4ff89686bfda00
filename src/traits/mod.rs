//! Trait abstractions for the marketplace's external collaborators.
//!
//! The core never talks to a chat API, a file store or the operator's
//! configuration directly. It goes through these traits so that the replay
//! driver and the tests can plug in their own implementations.

pub mod admin;
pub mod clock;
pub mod content;
pub mod transport;

pub use admin::{AdminIdentity, StaticAdmins};
pub use clock::{Clock, SystemClock};
pub use content::{ContentStore, Deliverable, MemoryContentStore};
pub use transport::{best_effort, notify_all, ChatTransport, LogTransport};
