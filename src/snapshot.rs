// Snapshot save/load envelopes
//
// The SDK only marshals the JSON envelope around Firecracker's snapshot
// files; the binary formats are opaque. Saving requires a paused microVM;
// loading targets a freshly started process that has not booted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

/// Full or differential snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnapshotType {
    #[default]
    Full,
    Diff,
}

impl SnapshotType {
    fn as_str(self) -> &'static str {
        match self {
            SnapshotType::Full => "Full",
            SnapshotType::Diff => "Diff",
        }
    }
}

/// Guest memory source for a snapshot load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    File,
    Uffd,
}

impl BackendType {
    fn as_str(self) -> &'static str {
        match self {
            BackendType::File => "File",
            BackendType::Uffd => "Uffd",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryBackend {
    pub backend_type: BackendType,
    pub backend_path: PathBuf,
}

/// Descriptor for one snapshot: where its state and memory live, plus the
/// load-time options.
#[derive(Debug, Clone)]
pub struct SnapshotSpec {
    snapshot_path: PathBuf,
    mem_file_path: Option<PathBuf>,
    snapshot_type: SnapshotType,
    memory_backend: Option<MemoryBackend>,
    network_overrides: BTreeMap<String, String>,
    resume_vm: bool,
    track_dirty_pages: bool,
}

impl SnapshotSpec {
    pub fn new(mem_file_path: impl Into<PathBuf>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            mem_file_path: Some(mem_file_path.into()),
            snapshot_type: SnapshotType::default(),
            memory_backend: None,
            network_overrides: BTreeMap::new(),
            resume_vm: false,
            track_dirty_pages: false,
        }
    }

    pub fn snapshot_type(mut self, snapshot_type: SnapshotType) -> Self {
        self.snapshot_type = snapshot_type;
        self
    }

    /// Source guest memory from a backend instead of a plain file. Clears any
    /// `mem_file_path`; the two are mutually exclusive in the load envelope.
    pub fn memory_backend(mut self, backend: MemoryBackend) -> Self {
        self.mem_file_path = None;
        self.memory_backend = Some(backend);
        self
    }

    /// Rename a guest interface's host device on load
    pub fn network_override(
        mut self,
        iface_id: impl Into<String>,
        host_dev_name: impl Into<String>,
    ) -> Self {
        self.network_overrides
            .insert(iface_id.into(), host_dev_name.into());
        self
    }

    /// Resume the guest immediately after a successful load
    pub fn resume_vm(mut self, resume: bool) -> Self {
        self.resume_vm = resume;
        self
    }

    pub fn track_dirty_pages(mut self, track: bool) -> Self {
        self.track_dirty_pages = track;
        self
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn mem_file_path(&self) -> Option<&Path> {
        self.mem_file_path.as_deref()
    }

    pub fn resumes(&self) -> bool {
        self.resume_vm
    }

    /// Envelope for PUT `/snapshot/create`
    pub(crate) fn create_body(&self) -> Value {
        let mut body = Map::new();
        body.insert(
            "snapshot_type".to_string(),
            json!(self.snapshot_type.as_str()),
        );
        body.insert(
            "snapshot_path".to_string(),
            json!(self.snapshot_path.to_string_lossy()),
        );
        if let Some(mem) = &self.mem_file_path {
            body.insert("mem_file_path".to_string(), json!(mem.to_string_lossy()));
        }
        Value::Object(body)
    }

    /// Envelope for PUT `/snapshot/load`. Empty nested objects are dropped;
    /// the override map flattens to a list of `{iface_id, host_dev_name}`.
    pub(crate) fn load_body(&self) -> Value {
        let mut body = Map::new();
        body.insert(
            "snapshot_type".to_string(),
            json!(self.snapshot_type.as_str()),
        );
        body.insert(
            "snapshot_path".to_string(),
            json!(self.snapshot_path.to_string_lossy()),
        );
        match (&self.memory_backend, &self.mem_file_path) {
            (Some(backend), _) => {
                body.insert(
                    "mem_backend".to_string(),
                    json!({
                        "backend_type": backend.backend_type.as_str(),
                        "backend_path": backend.backend_path.to_string_lossy(),
                    }),
                );
            }
            (None, Some(mem)) => {
                body.insert("mem_file_path".to_string(), json!(mem.to_string_lossy()));
            }
            (None, None) => {}
        }
        if !self.network_overrides.is_empty() {
            let overrides: Vec<Value> = self
                .network_overrides
                .iter()
                .map(|(iface_id, host_dev_name)| {
                    json!({ "iface_id": iface_id, "host_dev_name": host_dev_name })
                })
                .collect();
            body.insert("network_overrides".to_string(), Value::Array(overrides));
        }
        if self.resume_vm {
            body.insert("resume_vm".to_string(), json!(true));
        }
        if self.track_dirty_pages {
            body.insert("track_dirty_pages".to_string(), json!(true));
        }
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_body_defaults_to_full() {
        let snap = SnapshotSpec::new("/snap/mem", "/snap/state");
        assert_eq!(
            snap.create_body(),
            json!({
                "snapshot_type": "Full",
                "snapshot_path": "/snap/state",
                "mem_file_path": "/snap/mem",
            })
        );
    }

    #[test]
    fn test_create_body_diff_type() {
        let snap = SnapshotSpec::new("/m", "/s").snapshot_type(SnapshotType::Diff);
        assert_eq!(snap.create_body()["snapshot_type"], json!("Diff"));
    }

    #[test]
    fn test_load_body_flattens_network_overrides() {
        let snap = SnapshotSpec::new("/m", "/s")
            .network_override("eth0", "tap0")
            .network_override("eth1", "tap9");

        let body = snap.load_body();
        assert_eq!(
            body["network_overrides"],
            json!([
                {"iface_id": "eth0", "host_dev_name": "tap0"},
                {"iface_id": "eth1", "host_dev_name": "tap9"},
            ])
        );
    }

    #[test]
    fn test_load_body_drops_empty_objects() {
        let snap = SnapshotSpec::new("/m", "/s");
        let body = snap.load_body();
        assert!(body.get("network_overrides").is_none());
        assert!(body.get("mem_backend").is_none());
        assert!(body.get("resume_vm").is_none());
        assert_eq!(body["mem_file_path"], json!("/m"));
    }

    #[test]
    fn test_memory_backend_replaces_mem_file() {
        let snap = SnapshotSpec::new("/m", "/s").memory_backend(MemoryBackend {
            backend_type: BackendType::Uffd,
            backend_path: PathBuf::from("/uffd.sock"),
        });

        assert!(snap.mem_file_path().is_none());
        let body = snap.load_body();
        assert!(body.get("mem_file_path").is_none());
        assert_eq!(
            body["mem_backend"],
            json!({"backend_type": "Uffd", "backend_path": "/uffd.sock"})
        );
    }
}
