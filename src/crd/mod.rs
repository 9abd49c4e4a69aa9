//! Custom Resource Definitions (CRDs) for nexus-operator.
//!
//! - `Nexus`: Deploy and manage a Nexus Repository Manager 3 server

mod nexus;

pub use nexus::*;
