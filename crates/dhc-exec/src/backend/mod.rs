//! [`BatchClient`](dhc_core::backend::BatchClient) implementations.

#[cfg(feature = "proc")]
mod proc;
#[cfg(feature = "proc")]
pub use proc::{ProcBackend, ProcConfig};

#[cfg(feature = "kube")]
mod kube;
#[cfg(feature = "kube")]
pub use kube::{KubeClient, KubeConfig};
