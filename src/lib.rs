//! Kindling
//!
//! Host-side SDK for orchestrating Firecracker microVMs: build a validated,
//! declarative VM specification, launch the external process (optionally
//! jailed), reconcile the spec over the REST API, and drive the guest through
//! its lifecycle.
//!
//! ```no_run
//! use kindling::{ResourceKind, Vm};
//! use serde_json::{json, Map, Value};
//!
//! fn bag(value: Value) -> Map<String, Value> {
//!     value.as_object().cloned().expect("object")
//! }
//!
//! # async fn example() -> kindling::Result<()> {
//! let mut vm = Vm::new();
//! vm.configure(
//!     ResourceKind::BootSource,
//!     bag(json!({"kernel_image_path": "/images/vmlinux"})),
//! )?;
//! vm.configure(
//!     ResourceKind::MachineConfig,
//!     bag(json!({"vcpu_count": 2, "mem_size_mib": 512})),
//! )?;
//! vm.add(
//!     ResourceKind::Drive,
//!     "rootfs",
//!     bag(json!({"is_root_device": true, "path_on_host": "/images/rootfs.ext4"})),
//! )?;
//!
//! vm.start().await?;
//! vm.boot().await?;
//! // ...
//! vm.stop().await?;
//! # Ok(())
//! # }
//! ```

#[cfg(not(unix))]
compile_error!("this SDK drives processes and UNIX sockets and supports only Unix hosts");

pub mod client;
pub mod command;
pub mod error;
pub mod jailer;
pub mod process;
pub mod resource;
pub mod schema;
pub mod snapshot;
pub mod vm;

pub use client::{ApiClient, DescribeKind, TraceSink, TransportResponse, UnixTransport, VmmTransport};
pub use command::{CliOption, LaunchPlan, OptionValue};
pub use error::{Error, Result};
pub use jailer::JailerSpec;
pub use process::VmmProcess;
pub use resource::{RateLimiter, Resource, ResourceKind, TokenBucket};
pub use snapshot::{BackendType, MemoryBackend, SnapshotSpec, SnapshotType};
pub use vm::{Vm, VmState};
