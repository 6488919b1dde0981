//! Weight conversion for resolved jobs.
//!
//! The [`ConversionDispatcher`] hands a [`JobDescriptor`](crate::JobDescriptor)
//! to a [`ConversionEngine`]. Engines write a JSON job manifest into the
//! output directory; [`CommandEngine`] then runs an external program on it and
//! follows its JSON progress lines.

mod dispatcher;
mod engine;
pub(crate) mod pipeline;
mod types;

pub use dispatcher::ConversionDispatcher;
pub use engine::{CommandEngine, ConversionEngine, ManifestEngine};
pub use types::{ConversionReport, JobManifest, ProgressLine};
