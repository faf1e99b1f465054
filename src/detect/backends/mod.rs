pub mod sidecar;
pub mod stub;

pub use sidecar::SidecarBackend;
pub use stub::StubBackend;
