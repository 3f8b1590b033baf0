//! Resolution of KubeVirt VirtualMachines against instance types and preferences.
//!
//! An instance type provides mandatory resource values that must not collide with values the
//! VirtualMachine sets itself, a preference provides defaults that only fill unset fields. The
//! entry points are:
//!
//! - [`apply::apply_to_vmi`] resolves a VirtualMachineInstance spec in place and returns the
//!   [`conflict::Conflicts`] it found.
//! - [`requirements::check_preference_requirements`] checks the minimum resources a preference
//!   demands.
//! - [`expand::Expander`] resolves whole VirtualMachines using [`find`]ers.
//! - [`admission`] validates preferences and VirtualMachines before they are stored.

pub mod admission;
pub mod apply;
pub mod conflict;
pub mod crd;
pub mod expand;
pub mod find;
pub mod logging;
pub mod merge;
pub mod quantity;
pub mod requirements;
pub mod topology;

// External re-exports
pub use k8s_openapi;
pub use kube;
