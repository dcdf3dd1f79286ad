//! # LANESCOPE Scene
//!
//! Incremental scene graph store fed by decoded frames.
//!
//! ## Architecture
//!
//! ```text
//! Frame ──► flatten ──► SceneStore ──► renderables(query)
//!                          │
//!                          ├── GroupIndex   (group → ids, id → group)
//!                          └── SceneNotifier ──► Receiver<SceneChanged>
//! ```
//!
//! Producers send partial frames: only the groups present in a frame are
//! replaced, everything else stays on screen.

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod events;
pub mod flatten;
pub mod index;
pub mod query;
pub mod store;

pub use error::{SceneError, SceneResult, SceneWarning};
pub use events::{SceneChanged, SceneNotifier};
pub use flatten::{flatten_frame, FlatObject, FlattenedFrame, GroupKey};
pub use index::GroupIndex;
pub use query::{RenderQuery, VisibilityOverrides};
pub use store::{ApplySummary, RenderableEntry, SceneStore};
