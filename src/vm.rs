// microVM aggregate and lifecycle orchestration
//
// A `Vm` is a declarative specification of one microVM plus the handles that
// come alive once it starts: the supervised process and the REST client. All
// configuration operations are plain value transformations gated by the
// per-state schemas; the apply engine reconciles the spec against the live
// process and records per-resource failures instead of aborting.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::Signal;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::{ApiClient, DescribeKind, TraceSink};
use crate::command::{self, CliOption, LaunchPlan, OptionValue};
use crate::error::{Error, Result};
use crate::jailer::JailerSpec;
use crate::process::VmmProcess;
use crate::resource::{Resource, ResourceKind};
use crate::schema;
use crate::snapshot::SnapshotSpec;

/// Grace period after spawn before the process is considered up
const STARTUP_GRACE: Duration = Duration::from_millis(100);

/// Lifecycle states of a microVM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    /// Declared but not yet started
    Initial,
    /// Process spawned, guest not booted
    Started,
    Running,
    Paused,
    /// Guest shut down gracefully; the process may still be up
    Shutdown,
    /// Process reaped and host artifacts removed
    Exited,
}

impl std::fmt::Display for VmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VmState::Initial => "initial",
            VmState::Started => "started",
            VmState::Running => "running",
            VmState::Paused => "paused",
            VmState::Shutdown => "shutdown",
            VmState::Exited => "exited",
        };
        f.write_str(name)
    }
}

/// Declarative specification and live handles for one microVM
#[derive(Debug)]
pub struct Vm {
    id: String,
    api_socket_path: Option<PathBuf>,
    binary_path: Option<PathBuf>,
    no_api: bool,
    config_file_path: Option<PathBuf>,
    owns_config_file: bool,
    cli_options: BTreeMap<CliOption, OptionValue>,
    singletons: BTreeMap<ResourceKind, Resource>,
    drives: BTreeMap<String, Resource>,
    network_interfaces: BTreeMap<String, Resource>,
    pmems: BTreeMap<String, Resource>,
    jailer: Option<JailerSpec>,
    state: VmState,
    process: Option<VmmProcess>,
    client: Option<ApiClient>,
    errors: Vec<(String, String)>,
    trace: Option<TraceSink>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// A fresh anonymous spec with a unique id and API socket path
    pub fn new() -> Self {
        let unique = Uuid::new_v4();
        Self {
            id: format!("anonymous-instance-{unique}"),
            api_socket_path: Some(PathBuf::from(format!("/tmp/firecracker.{unique}.sock"))),
            binary_path: None,
            no_api: false,
            config_file_path: None,
            owns_config_file: false,
            cli_options: BTreeMap::new(),
            singletons: BTreeMap::new(),
            drives: BTreeMap::new(),
            network_interfaces: BTreeMap::new(),
            pmems: BTreeMap::new(),
            jailer: None,
            state: VmState::Initial,
            process: None,
            client: None,
            errors: Vec::new(),
            trace: None,
        }
    }

    /// Build a spec from a constructor option bag (the CLI surface)
    pub fn with_options(options: Map<String, Value>) -> Result<Self> {
        let mut vm = Self::new();
        for (key, value) in options {
            let option = CliOption::from_name(&key)
                .ok_or_else(|| Error::invalid_option(key.as_str(), "unknown CLI option"))?;
            vm.set_option(option, OptionValue::from(value))?;
        }
        Ok(vm)
    }

    // --- accessors ---

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    /// Reconciliation failures, most recent first
    pub fn errors(&self) -> &[(String, String)] {
        &self.errors
    }

    pub fn api_socket_path(&self) -> Option<&Path> {
        self.api_socket_path.as_deref()
    }

    pub fn config_file_path(&self) -> Option<&Path> {
        self.config_file_path.as_deref()
    }

    pub fn no_api(&self) -> bool {
        self.no_api
    }

    pub fn jailer(&self) -> Option<&JailerSpec> {
        self.jailer.as_ref()
    }

    /// A singleton resource slot
    pub fn resource(&self, kind: ResourceKind) -> Option<&Resource> {
        self.singletons.get(&kind)
    }

    pub fn drives(&self) -> &BTreeMap<String, Resource> {
        &self.drives
    }

    pub fn network_interfaces(&self) -> &BTreeMap<String, Resource> {
        &self.network_interfaces
    }

    pub fn pmems(&self) -> &BTreeMap<String, Resource> {
        &self.pmems
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(VmmProcess::pid)
    }

    /// Exit code of the reaped process; SIGTERM observes as 143
    pub fn exit_code(&self) -> Option<i32> {
        self.process.as_ref().and_then(VmmProcess::exit_code)
    }

    /// Non-blocking liveness probe of the external process
    pub fn is_alive(&mut self) -> bool {
        self.process.as_mut().is_some_and(VmmProcess::is_alive)
    }

    /// Dry-run view of the launch: binary, argv, and what apply would send
    pub fn plan(&self) -> LaunchPlan {
        command::plan(self)
    }

    pub(crate) fn cli_options(&self) -> &BTreeMap<CliOption, OptionValue> {
        &self.cli_options
    }

    pub(crate) fn singletons(&self) -> &BTreeMap<ResourceKind, Resource> {
        &self.singletons
    }

    pub(crate) fn collection(&self, kind: ResourceKind) -> &BTreeMap<String, Resource> {
        match kind {
            ResourceKind::Drive => &self.drives,
            ResourceKind::NetworkInterface => &self.network_interfaces,
            ResourceKind::Pmem => &self.pmems,
            other => panic!("{other} is not a collection resource"),
        }
    }

    fn collection_mut(&mut self, kind: ResourceKind) -> &mut BTreeMap<String, Resource> {
        match kind {
            ResourceKind::Drive => &mut self.drives,
            ResourceKind::NetworkInterface => &mut self.network_interfaces,
            ResourceKind::Pmem => &mut self.pmems,
            other => panic!("{other} is not a collection resource"),
        }
    }

    /// Binary resolution: explicit spec override, then the environment, then
    /// the conventional install location.
    pub(crate) fn resolve_binary(&self) -> PathBuf {
        if let Some(path) = &self.binary_path {
            return path.clone();
        }
        if let Ok(path) = std::env::var("FIRECRACKER_PATH") {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".firecracker/bin/firecracker")
    }

    #[cfg(test)]
    pub(crate) fn mark_applied(&mut self, kind: ResourceKind) {
        if let Some(resource) = self.singletons.get_mut(&kind) {
            resource.set_applied(true);
        }
    }

    // --- configuration operations ---

    /// Set a launch-surface CLI option. Legal only before start.
    pub fn set_option(&mut self, option: CliOption, value: impl Into<OptionValue>) -> Result<()> {
        self.ensure_state("set a CLI option", &[VmState::Initial])?;
        let value = value.into();
        match option {
            CliOption::Id => self.id = eager_string(option, &value)?,
            CliOption::ApiSock => {
                self.api_socket_path = Some(PathBuf::from(eager_string(option, &value)?));
            }
            CliOption::FirecrackerPath => {
                self.binary_path = Some(PathBuf::from(eager_string(option, &value)?));
            }
            CliOption::ConfigFile => {
                self.config_file_path = Some(PathBuf::from(eager_string(option, &value)?));
            }
            CliOption::NoApi => {
                self.no_api = eager_bool(option, &value)?;
                if self.no_api {
                    self.api_socket_path = None;
                }
            }
            _ => {
                if let OptionValue::Value(eager) = &value {
                    let expected = option.value_type();
                    if !expected.matches(eager) {
                        return Err(Error::invalid_option(
                            option.name(),
                            format!("expected {}", expected.describe()),
                        ));
                    }
                }
                self.cli_options.insert(option, value);
            }
        }
        Ok(())
    }

    /// Configure a singleton resource: create it on first call, merge fields
    /// on later ones. Validated against the pre- or post-boot schema
    /// depending on the current state.
    pub fn configure(&mut self, kind: ResourceKind, options: Map<String, Value>) -> Result<()> {
        self.ensure_mutable("configure")?;
        if kind.is_collection() {
            return Err(Error::InvalidResource(format!(
                "{kind} is a collection; use add with a member id"
            )));
        }
        if kind == ResourceKind::Mmds {
            return Err(Error::InvalidResource(
                "the metadata store is updated through the metadata operations".to_string(),
            ));
        }

        let post_boot = self.post_boot();
        let active_schema = if post_boot {
            kind.post_boot_schema()
        } else {
            kind.pre_boot_schema()
        };
        let creating = !self.singletons.contains_key(&kind);
        schema::validate(&options, active_schema, creating && !post_boot)?;

        match self.singletons.entry(kind) {
            Entry::Occupied(mut entry) => entry.get_mut().merge(options),
            Entry::Vacant(entry) => {
                entry.insert(Resource::new(kind, options));
            }
        }
        Ok(())
    }

    /// Add or update a collection member. The member id is injected into the
    /// option bag under the resource's id field. New members cannot be added
    /// after boot.
    pub fn add(&mut self, kind: ResourceKind, id: &str, options: Map<String, Value>) -> Result<()> {
        self.ensure_mutable("add")?;
        let Some(id_field) = kind.id_field() else {
            return Err(Error::InvalidResource(format!(
                "{kind} is a singleton; use configure"
            )));
        };

        let mut options = options;
        options.insert(id_field.to_string(), Value::String(id.to_string()));

        let post_boot = self.post_boot();
        let creating = !self.collection(kind).contains_key(id);
        if post_boot && creating {
            return Err(Error::invalid_state(
                self.state,
                format!("add a new {kind} member after boot"),
            ));
        }
        let active_schema = if post_boot {
            kind.post_boot_schema()
        } else {
            kind.pre_boot_schema()
        };
        schema::validate(&options, active_schema, creating)?;

        match self.collection_mut(kind).entry(id.to_string()) {
            Entry::Occupied(mut entry) => entry.get_mut().merge(options),
            Entry::Vacant(entry) => {
                entry.insert(Resource::new(kind, options));
            }
        }
        Ok(())
    }

    /// Replace the whole metadata-store document
    pub fn metadata(&mut self, data: Value) -> Result<()> {
        self.ensure_mutable("update metadata")?;
        if !data.is_object() {
            return Err(Error::invalid_option("data", "metadata must be a JSON object"));
        }
        let mut fields = Map::new();
        fields.insert("data".to_string(), data);
        match self.singletons.entry(ResourceKind::Mmds) {
            Entry::Occupied(mut entry) => entry.get_mut().merge(fields),
            Entry::Vacant(entry) => {
                entry.insert(Resource::new(ResourceKind::Mmds, fields));
            }
        }
        Ok(())
    }

    /// Set one metadata key, creating or overwriting it
    pub fn put_metadata(&mut self, key: &str, value: Value) -> Result<()> {
        let mut document = self.metadata_document();
        document.insert(key.to_string(), value);
        self.metadata(Value::Object(document))
    }

    /// Update one metadata key: apply `update` to the current value, or
    /// insert `default` when the key is absent.
    pub fn update_metadata(
        &mut self,
        key: &str,
        default: Value,
        update: impl FnOnce(&Value) -> Value,
    ) -> Result<()> {
        let mut document = self.metadata_document();
        let next = match document.get(key) {
            Some(current) => update(current),
            None => default,
        };
        document.insert(key.to_string(), next);
        self.metadata(Value::Object(document))
    }

    fn metadata_document(&self) -> Map<String, Value> {
        self.singletons
            .get(&ResourceKind::Mmds)
            .and_then(|resource| resource.get("data"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Attach a jailer. Legal only before start.
    pub fn jail(&mut self, options: Map<String, Value>) -> Result<()> {
        self.ensure_state("attach a jailer", &[VmState::Initial])?;
        self.jailer = Some(JailerSpec::from_options(options)?);
        Ok(())
    }

    /// Set one cgroup entry on the attached jailer
    pub fn cgroup(&mut self, name: &str, value: Value) -> Result<()> {
        self.ensure_state("set a cgroup", &[VmState::Initial])?;
        let jailer = self
            .jailer
            .as_mut()
            .ok_or_else(|| Error::InvalidResource("no jailer attached".to_string()))?;
        jailer.cgroup(name, &value);
        Ok(())
    }

    /// Set one resource limit on the attached jailer
    pub fn resource_limit(&mut self, name: &str, value: Value) -> Result<()> {
        self.ensure_state("set a resource limit", &[VmState::Initial])?;
        let jailer = self
            .jailer
            .as_mut()
            .ok_or_else(|| Error::InvalidResource("no jailer attached".to_string()))?;
        jailer.resource_limit(name, &value);
        Ok(())
    }

    /// Route API request traces to a sink. Takes effect at start.
    pub fn trace_requests(&mut self, sink: TraceSink) -> Result<()> {
        self.ensure_state("configure tracing", &[VmState::Initial])?;
        self.trace = Some(sink);
        Ok(())
    }

    // --- lifecycle ---

    /// Spawn the external process and push any declared pre-boot
    /// configuration. Idempotent once started.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            VmState::Started => return Ok(()),
            VmState::Initial => {}
            state => return Err(Error::invalid_state(state, "start")),
        }

        if let Some(sock) = &self.api_socket_path {
            if let Some(parent) = sock.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::Startup(format!(
                        "cannot create socket directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
            if sock.exists() {
                tokio::fs::remove_file(sock).await.map_err(|e| {
                    Error::Startup(format!("cannot remove stale socket {}: {e}", sock.display()))
                })?;
            }
        }

        let built = command::build(self).await?;
        if built.owns_config_file {
            self.config_file_path = built.config_file.clone();
            self.owns_config_file = true;
        }

        info!(id = %self.id, binary = %built.binary.display(), "starting microVM");
        let mut process = match VmmProcess::spawn(&built.binary, &built.args) {
            Ok(process) => process,
            Err(error) => {
                self.remove_startup_artifacts().await;
                return Err(error);
            }
        };

        // A process that dies inside the grace window never served the API.
        tokio::time::sleep(STARTUP_GRACE).await;
        if !process.is_alive() {
            let code = process.exit_code();
            self.remove_startup_artifacts().await;
            return Err(Error::Startup(format!(
                "process exited during startup (exit code {code:?})"
            )));
        }

        self.process = Some(process);
        if !self.no_api {
            if let Some(sock) = &self.api_socket_path {
                self.client = Some(ApiClient::unix(sock.clone()).with_trace(self.trace.clone()));
            }
        }
        self.state = VmState::Started;
        self.apply().await;
        Ok(())
    }

    /// Reconcile the declarative spec against the live microVM.
    ///
    /// Walks resources in a fixed order (drives, network interfaces, pmems,
    /// the metadata store, then the remaining singletons), skipping anything
    /// absent or already applied. Failures are recorded per resource on
    /// [`Vm::errors`], most recent first; reconciliation never aborts early.
    /// Without an API client (API-less launch) this is a no-op.
    pub async fn apply(&mut self) {
        let Some(client) = self.client.clone() else {
            return;
        };
        let use_put = matches!(self.state, VmState::Initial | VmState::Started);

        for kind in [
            ResourceKind::Drive,
            ResourceKind::NetworkInterface,
            ResourceKind::Pmem,
        ] {
            let pending: Vec<String> = self
                .collection(kind)
                .iter()
                .filter(|(_, resource)| !resource.applied())
                .map(|(id, _)| id.clone())
                .collect();
            for id in pending {
                let resource = self.collection(kind)[&id].clone();
                match push(&client, &resource, use_put).await {
                    Ok(()) => {
                        if let Some(member) = self.collection_mut(kind).get_mut(&id) {
                            member.set_applied(true);
                        }
                    }
                    Err(error) => self.record_error(kind, &error),
                }
            }
        }

        // The metadata store goes ahead of the other singletons.
        let mut order: Vec<ResourceKind> = Vec::new();
        if self.singletons.contains_key(&ResourceKind::Mmds) {
            order.push(ResourceKind::Mmds);
        }
        order.extend(
            self.singletons
                .keys()
                .copied()
                .filter(|kind| *kind != ResourceKind::Mmds),
        );

        for kind in order {
            let resource = match self.singletons.get(&kind) {
                Some(resource) if !resource.applied() => resource.clone(),
                _ => continue,
            };
            match push(&client, &resource, use_put).await {
                Ok(()) => {
                    if let Some(slot) = self.singletons.get_mut(&kind) {
                        slot.set_applied(true);
                    }
                }
                Err(error) => self.record_error(kind, &error),
            }
        }
    }

    fn record_error(&mut self, kind: ResourceKind, error: &Error) {
        warn!(resource = kind.name(), %error, "apply failed");
        self.errors
            .insert(0, (kind.error_key().to_string(), error.record_message()));
    }

    /// Boot the guest. Legal from started (first boot) or shutdown
    /// (re-start); idempotent once running.
    pub async fn boot(&mut self) -> Result<()> {
        match self.state {
            VmState::Running => return Ok(()),
            VmState::Started | VmState::Shutdown => {}
            state => return Err(Error::invalid_state(state, "boot")),
        }
        let client = self.require_client("boot")?;
        client.create_sync_action("InstanceStart").await?;
        info!(id = %self.id, "guest booted");
        self.state = VmState::Running;
        Ok(())
    }

    /// Pause the running guest; idempotent while paused
    pub async fn pause(&mut self) -> Result<()> {
        match self.state {
            VmState::Paused => return Ok(()),
            VmState::Running => {}
            state => return Err(Error::invalid_state(state, "pause")),
        }
        let client = self.require_client("pause")?;
        client.patch_vm("Paused").await?;
        self.state = VmState::Paused;
        Ok(())
    }

    /// Resume a paused guest; idempotent while running
    pub async fn resume(&mut self) -> Result<()> {
        match self.state {
            VmState::Running => return Ok(()),
            VmState::Paused => {}
            state => return Err(Error::invalid_state(state, "resume")),
        }
        let client = self.require_client("resume")?;
        client.patch_vm("Resumed").await?;
        self.state = VmState::Running;
        Ok(())
    }

    /// Ask the guest to shut down gracefully (Ctrl+Alt+Del); idempotent once
    /// shut down
    pub async fn shutdown(&mut self) -> Result<()> {
        match self.state {
            VmState::Shutdown => return Ok(()),
            VmState::Running => {}
            state => return Err(Error::invalid_state(state, "shutdown")),
        }
        let client = self.require_client("shutdown")?;
        client.create_sync_action("SendCtrlAltDel").await?;
        info!(id = %self.id, "guest shutdown requested");
        self.state = VmState::Shutdown;
        Ok(())
    }

    /// Terminate the external process with SIGTERM, reap it, and remove the
    /// host artifacts this VM owns. The logger's log path is preserved.
    /// Idempotent once exited.
    pub async fn stop(&mut self) -> Result<()> {
        match self.state {
            VmState::Exited => return Ok(()),
            VmState::Started | VmState::Running | VmState::Paused => {}
            state => return Err(Error::invalid_state(state, "stop")),
        }

        if let Some(process) = self.process.as_mut() {
            if let Err(error) = process.signal(Signal::SIGTERM) {
                warn!(%error, "failed to deliver SIGTERM");
            }
            match process.wait().await {
                Ok(status) => debug!(?status, "microVM process reaped"),
                Err(error) => warn!(%error, "failed to reap microVM process"),
            }
        }

        self.cleanup_artifacts().await;
        self.client = None;
        self.state = VmState::Exited;
        info!(id = %self.id, "microVM stopped");
        Ok(())
    }

    /// Save a snapshot of the paused guest
    pub async fn snapshot(&mut self, snapshot: &SnapshotSpec) -> Result<()> {
        if self.state != VmState::Paused {
            return Err(Error::invalid_state(self.state, "snapshot"));
        }
        let client = self.require_client("snapshot")?;
        client.create_snapshot(&snapshot.create_body()).await
    }

    /// Load a snapshot into a freshly started, never-booted microVM. With
    /// `resume_vm` set on the descriptor, the guest comes back running.
    pub async fn load_snapshot(&mut self, snapshot: &SnapshotSpec) -> Result<()> {
        if self.state != VmState::Started {
            return Err(Error::invalid_state(self.state, "load a snapshot"));
        }
        let client = self.require_client("load a snapshot")?;
        client.load_snapshot(&snapshot.load_body()).await?;
        if snapshot.resumes() {
            self.state = VmState::Running;
        }
        Ok(())
    }

    /// Flush the metrics sink
    pub async fn flush_metrics(&mut self) -> Result<()> {
        match self.state {
            VmState::Started | VmState::Running | VmState::Paused | VmState::Shutdown => {}
            state => return Err(Error::invalid_state(state, "flush metrics")),
        }
        let client = self.require_client("flush metrics")?;
        client.create_sync_action("FlushMetrics").await
    }

    /// Send Ctrl+Alt+Del without tracking a state change
    pub async fn send_ctrl_alt_del(&mut self) -> Result<()> {
        if self.state != VmState::Running {
            return Err(Error::invalid_state(self.state, "send ctrl-alt-del"));
        }
        let client = self.require_client("send ctrl-alt-del")?;
        client.create_sync_action("SendCtrlAltDel").await
    }

    /// GET one of the API's describable views
    pub async fn describe(&self, kind: DescribeKind) -> Result<Value> {
        let client = self.require_client("describe")?;
        client.describe(kind).await
    }

    // --- internals ---

    fn require_client(&self, operation: &str) -> Result<ApiClient> {
        self.client.clone().ok_or_else(|| {
            Error::invalid_state(self.state, format!("{operation} without an API socket"))
        })
    }

    fn ensure_state(&self, operation: &str, allowed: &[VmState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::invalid_state(self.state, operation))
        }
    }

    fn ensure_mutable(&self, operation: &str) -> Result<()> {
        if self.state == VmState::Exited {
            return Err(Error::invalid_state(self.state, operation));
        }
        Ok(())
    }

    fn post_boot(&self) -> bool {
        matches!(
            self.state,
            VmState::Running | VmState::Paused | VmState::Shutdown
        )
    }

    fn singleton_path(&self, kind: ResourceKind, field: &str) -> Option<PathBuf> {
        self.singletons
            .get(&kind)?
            .get(field)?
            .as_str()
            .map(PathBuf::from)
    }

    async fn remove_startup_artifacts(&mut self) {
        if let Some(sock) = &self.api_socket_path {
            let _ = tokio::fs::remove_file(sock).await;
        }
        if self.owns_config_file {
            if let Some(path) = self.config_file_path.take() {
                let _ = tokio::fs::remove_file(path).await;
            }
            self.owns_config_file = false;
        }
    }

    /// Best-effort removal of every host artifact this VM owns. Artifacts
    /// inside a jailer chroot are outside the cleanup contract, and the
    /// logger's log path is deliberately kept.
    async fn cleanup_artifacts(&mut self) {
        if let Some(sock) = &self.api_socket_path {
            let _ = tokio::fs::remove_file(sock).await;
        }
        for path in [
            self.singleton_path(ResourceKind::Vsock, "uds_path"),
            self.singleton_path(ResourceKind::Metrics, "metrics_path"),
            self.singleton_path(ResourceKind::Serial, "output_path"),
        ]
        .into_iter()
        .flatten()
        {
            let _ = tokio::fs::remove_file(path).await;
        }
        if self.owns_config_file {
            if let Some(path) = &self.config_file_path {
                let _ = tokio::fs::remove_file(path).await;
            }
        }
    }
}

async fn push(client: &ApiClient, resource: &Resource, use_put: bool) -> Result<()> {
    if use_put {
        client.put(resource).await
    } else {
        client.patch(resource).await
    }
}

fn eager_string(option: CliOption, value: &OptionValue) -> Result<String> {
    match value {
        OptionValue::Value(Value::String(s)) => Ok(s.clone()),
        _ => Err(Error::invalid_option(
            option.name(),
            "expected an eager string value",
        )),
    }
}

fn eager_bool(option: CliOption, value: &OptionValue) -> Result<bool> {
    match value {
        OptionValue::Value(Value::Bool(b)) => Ok(*b),
        _ => Err(Error::invalid_option(
            option.name(),
            "expected an eager boolean value",
        )),
    }
}
