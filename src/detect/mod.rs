//! Detector collaborators.
//!
//! The pipeline never runs a model itself. A `Detector` turns a frame into
//! raw labelled boxes; everything after that is pure.

mod backend;
mod backends;
mod registry;

pub use backend::Detector;
pub use backends::{SidecarBackend, StubBackend};
pub use registry::DetectorRegistry;
