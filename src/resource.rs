// microVM resource models
//
// Each resource kind carries declarative metadata: its REST endpoint, the id
// field for collection kinds, and its pre-boot and post-boot schemas. The
// registry drives validation, the apply engine, and the launch-file layout,
// so individual resources need no per-kind code.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{FieldSpec, FieldType, Schema};

const BALLOON_PRE: Schema = &[
    FieldSpec::required("amount_mib", FieldType::NonNegInt),
    FieldSpec::required("deflate_on_oom", FieldType::Bool),
    FieldSpec::optional("stats_polling_interval_s", FieldType::NonNegInt),
];
const BALLOON_POST: Schema = &[
    FieldSpec::optional("amount_mib", FieldType::NonNegInt),
    FieldSpec::optional("stats_polling_interval_s", FieldType::NonNegInt),
];

const BOOT_SOURCE_PRE: Schema = &[
    FieldSpec::required("kernel_image_path", FieldType::Str),
    FieldSpec::optional("boot_args", FieldType::Str),
    FieldSpec::optional("initrd_path", FieldType::Str),
];

const CPU_CONFIG_PRE: Schema = &[
    FieldSpec::optional("cpuid_modifiers", FieldType::Opaque),
    FieldSpec::optional("msr_modifiers", FieldType::Opaque),
    FieldSpec::optional("reg_modifiers", FieldType::Opaque),
    FieldSpec::optional("vcpu_features", FieldType::Opaque),
    FieldSpec::optional("kvm_capabilities", FieldType::Opaque),
];

const DRIVE_PRE: Schema = &[
    FieldSpec::required("drive_id", FieldType::Str),
    FieldSpec::required("is_root_device", FieldType::Bool),
    FieldSpec::optional("path_on_host", FieldType::Str),
    FieldSpec::optional("partuuid", FieldType::Str),
    FieldSpec::optional("cache_type", FieldType::Str),
    FieldSpec::optional("is_read_only", FieldType::Bool),
    FieldSpec::optional("rate_limiter", FieldType::Opaque),
    FieldSpec::optional("io_engine", FieldType::Str),
    FieldSpec::optional("socket", FieldType::Str),
];
const DRIVE_POST: Schema = &[
    FieldSpec::optional("drive_id", FieldType::Str),
    FieldSpec::optional("path_on_host", FieldType::Str),
    FieldSpec::optional("rate_limiter", FieldType::Opaque),
];

const ENTROPY_PRE: Schema = &[FieldSpec::optional("rate_limiter", FieldType::Opaque)];

const LOGGER_PRE: Schema = &[
    FieldSpec::optional("level", FieldType::Str),
    FieldSpec::optional("log_path", FieldType::Str),
    FieldSpec::optional("show_level", FieldType::Bool),
    FieldSpec::optional("show_log_origin", FieldType::Bool),
    FieldSpec::optional("module", FieldType::Str),
];

const MACHINE_CONFIG_PRE: Schema = &[
    FieldSpec::required("vcpu_count", FieldType::PosInt),
    FieldSpec::required("mem_size_mib", FieldType::PosInt),
    FieldSpec::optional("smt", FieldType::Bool),
    FieldSpec::optional("track_dirty_pages", FieldType::Bool),
    FieldSpec::optional("huge_pages", FieldType::Str),
    FieldSpec::optional("cpu_template", FieldType::Str),
];
const MACHINE_CONFIG_POST: Schema = &[
    FieldSpec::optional("vcpu_count", FieldType::PosInt),
    FieldSpec::optional("mem_size_mib", FieldType::PosInt),
    FieldSpec::optional("smt", FieldType::Bool),
    FieldSpec::optional("track_dirty_pages", FieldType::Bool),
    FieldSpec::optional("huge_pages", FieldType::Str),
    FieldSpec::optional("cpu_template", FieldType::Str),
];

const METRICS_PRE: Schema = &[FieldSpec::required("metrics_path", FieldType::Str)];

// The metadata store is an arbitrary JSON document kept under a single field;
// it is writable in every state that still has an HTTP client.
const MMDS_ANY: Schema = &[FieldSpec::required("data", FieldType::Opaque)];

const MMDS_CONFIG_PRE: Schema = &[
    FieldSpec::required("network_interfaces", FieldType::StrList),
    FieldSpec::optional("version", FieldType::Str),
    FieldSpec::optional("ipv4_address", FieldType::Str),
    FieldSpec::optional("imds_compat", FieldType::Bool),
];

const NETWORK_INTERFACE_PRE: Schema = &[
    FieldSpec::required("iface_id", FieldType::Str),
    FieldSpec::required("host_dev_name", FieldType::Str),
    FieldSpec::optional("guest_mac", FieldType::Str),
    FieldSpec::optional("rx_rate_limiter", FieldType::Opaque),
    FieldSpec::optional("tx_rate_limiter", FieldType::Opaque),
];
const NETWORK_INTERFACE_POST: Schema = &[
    FieldSpec::optional("iface_id", FieldType::Str),
    FieldSpec::optional("rx_rate_limiter", FieldType::Opaque),
    FieldSpec::optional("tx_rate_limiter", FieldType::Opaque),
];

const PMEM_PRE: Schema = &[
    FieldSpec::required("id", FieldType::Str),
    FieldSpec::required("path_on_host", FieldType::Str),
    FieldSpec::optional("root_device", FieldType::Bool),
    FieldSpec::optional("read_only", FieldType::Bool),
];

const SERIAL_PRE: Schema = &[FieldSpec::optional("output_path", FieldType::Str)];

const VSOCK_PRE: Schema = &[
    FieldSpec::required("guest_cid", FieldType::PosInt),
    FieldSpec::required("uds_path", FieldType::Str),
    FieldSpec::optional("vsock_id", FieldType::Str),
];

const EMPTY: Schema = &[];

/// All resource kinds the microVM API exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Balloon,
    BootSource,
    CpuConfig,
    Drive,
    Entropy,
    Logger,
    MachineConfig,
    Metrics,
    Mmds,
    MmdsConfig,
    NetworkInterface,
    Pmem,
    Serial,
    Vsock,
}

impl ResourceKind {
    /// Snake-case name, as used in option bags and error messages
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Balloon => "balloon",
            ResourceKind::BootSource => "boot_source",
            ResourceKind::CpuConfig => "cpu_config",
            ResourceKind::Drive => "drive",
            ResourceKind::Entropy => "entropy",
            ResourceKind::Logger => "logger",
            ResourceKind::MachineConfig => "machine_config",
            ResourceKind::Metrics => "metrics",
            ResourceKind::Mmds => "mmds",
            ResourceKind::MmdsConfig => "mmds_config",
            ResourceKind::NetworkInterface => "network_interface",
            ResourceKind::Pmem => "pmem",
            ResourceKind::Serial => "serial",
            ResourceKind::Vsock => "vsock",
        }
    }

    /// Key under which failures for this kind are recorded on the VM error
    /// list. Collection kinds record under their plural slot name.
    pub fn error_key(self) -> &'static str {
        match self {
            ResourceKind::Drive => "drives",
            ResourceKind::NetworkInterface => "network_interfaces",
            ResourceKind::Pmem => "pmems",
            other => other.name(),
        }
    }

    /// Top-level key in the REST-shaped launch config
    pub fn config_key(self) -> &'static str {
        match self {
            ResourceKind::Balloon => "balloon",
            ResourceKind::BootSource => "boot-source",
            ResourceKind::CpuConfig => "cpu-config",
            ResourceKind::Drive => "drives",
            ResourceKind::Entropy => "entropy",
            ResourceKind::Logger => "logger",
            ResourceKind::MachineConfig => "machine-config",
            ResourceKind::Metrics => "metrics",
            ResourceKind::Mmds => "mmds",
            ResourceKind::MmdsConfig => "mmds-config",
            ResourceKind::NetworkInterface => "network-interfaces",
            ResourceKind::Pmem => "pmems",
            ResourceKind::Serial => "serial",
            ResourceKind::Vsock => "vsock",
        }
    }

    /// REST endpoint path. Collection members append `/<id>`.
    pub fn endpoint(self) -> &'static str {
        match self {
            ResourceKind::Balloon => "/balloon",
            ResourceKind::BootSource => "/boot-source",
            ResourceKind::CpuConfig => "/cpu-config",
            ResourceKind::Drive => "/drives",
            ResourceKind::Entropy => "/entropy",
            ResourceKind::Logger => "/logger",
            ResourceKind::MachineConfig => "/machine-config",
            ResourceKind::Metrics => "/metrics",
            ResourceKind::Mmds => "/mmds",
            ResourceKind::MmdsConfig => "/mmds/config",
            ResourceKind::NetworkInterface => "/network-interfaces",
            ResourceKind::Pmem => "/pmem",
            ResourceKind::Serial => "/serial",
            ResourceKind::Vsock => "/vsock",
        }
    }

    /// Field naming the unique member id, for collection kinds
    pub fn id_field(self) -> Option<&'static str> {
        match self {
            ResourceKind::Drive => Some("drive_id"),
            ResourceKind::NetworkInterface => Some("iface_id"),
            ResourceKind::Pmem => Some("id"),
            _ => None,
        }
    }

    pub fn is_collection(self) -> bool {
        self.id_field().is_some()
    }

    /// Fields legal while configuring before the guest has booted
    pub fn pre_boot_schema(self) -> Schema {
        match self {
            ResourceKind::Balloon => BALLOON_PRE,
            ResourceKind::BootSource => BOOT_SOURCE_PRE,
            ResourceKind::CpuConfig => CPU_CONFIG_PRE,
            ResourceKind::Drive => DRIVE_PRE,
            ResourceKind::Entropy => ENTROPY_PRE,
            ResourceKind::Logger => LOGGER_PRE,
            ResourceKind::MachineConfig => MACHINE_CONFIG_PRE,
            ResourceKind::Metrics => METRICS_PRE,
            ResourceKind::Mmds => MMDS_ANY,
            ResourceKind::MmdsConfig => MMDS_CONFIG_PRE,
            ResourceKind::NetworkInterface => NETWORK_INTERFACE_PRE,
            ResourceKind::Pmem => PMEM_PRE,
            ResourceKind::Serial => SERIAL_PRE,
            ResourceKind::Vsock => VSOCK_PRE,
        }
    }

    /// Fields the API accepts as updates on a running microVM. Empty means
    /// the resource is pre-boot only.
    pub fn post_boot_schema(self) -> Schema {
        match self {
            ResourceKind::Balloon => BALLOON_POST,
            ResourceKind::Drive => DRIVE_POST,
            ResourceKind::MachineConfig => MACHINE_CONFIG_POST,
            ResourceKind::Mmds => MMDS_ANY,
            ResourceKind::NetworkInterface => NETWORK_INTERFACE_POST,
            _ => EMPTY,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One declarative resource value.
///
/// Holds only the declarative fields plus the `applied` flag recording
/// whether the value matches what the microVM was last told. Validation is
/// state-aware and happens on the owning VM before fields reach here.
#[derive(Debug, Clone)]
pub struct Resource {
    kind: ResourceKind,
    fields: Map<String, Value>,
    applied: bool,
}

impl Resource {
    pub(crate) fn new(kind: ResourceKind, fields: Map<String, Value>) -> Self {
        Self {
            kind,
            fields,
            applied: false,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn applied(&self) -> bool {
        self.applied
    }

    pub(crate) fn set_applied(&mut self, applied: bool) {
        self.applied = applied;
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Merge new fields over old ones. Any mutation invalidates `applied`.
    pub(crate) fn merge(&mut self, options: Map<String, Value>) {
        for (key, value) in options {
            self.fields.insert(key, value);
        }
        self.applied = false;
    }

    /// Member id for collection kinds
    pub fn id(&self) -> Option<&str> {
        self.kind
            .id_field()
            .and_then(|field| self.fields.get(field))
            .and_then(Value::as_str)
    }

    /// REST path this value is written to
    pub fn path(&self) -> String {
        match self.id() {
            Some(id) => format!("{}/{}", self.kind.endpoint(), id),
            None => self.kind.endpoint().to_string(),
        }
    }

    /// Full declarative body for a PUT. The metadata store serialises as the
    /// bare document.
    pub fn body(&self) -> Value {
        if self.kind == ResourceKind::Mmds {
            return self.fields.get("data").cloned().unwrap_or(Value::Null);
        }
        Value::Object(self.fields.clone())
    }

    /// Partial body for a post-boot update: only the fields present in the
    /// post-boot schema (which includes the member id field).
    pub fn patch_body(&self) -> Value {
        if self.kind == ResourceKind::Mmds {
            return self.body();
        }
        let allowed = self.kind.post_boot_schema();
        let fields: Map<String, Value> = self
            .fields
            .iter()
            .filter(|(key, _)| allowed.iter().any(|spec| spec.name == key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Value::Object(fields)
    }
}

/// A token bucket for rate limiting device I/O
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenBucket {
    pub size: u64,
    pub refill_time: u64,
    pub one_time_burst: u64,
}

/// A device rate limiter: two optional token buckets.
///
/// Marshalled with explicit nulls for absent buckets, the layout the REST API
/// expects.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RateLimiter {
    pub bandwidth: Option<TokenBucket>,
    pub ops: Option<TokenBucket>,
}

impl RateLimiter {
    pub fn bandwidth(bucket: TokenBucket) -> Self {
        Self {
            bandwidth: Some(bucket),
            ops: None,
        }
    }

    pub fn ops(bucket: TokenBucket) -> Self {
        Self {
            bandwidth: None,
            ops: Some(bucket),
        }
    }

    /// Value form, for placing into a resource option bag
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_construction_round_trips_fields() {
        let options = bag(json!({
            "drive_id": "rootfs",
            "is_root_device": true,
            "path_on_host": "/images/rootfs.ext4",
        }));
        let resource = Resource::new(ResourceKind::Drive, options.clone());

        assert!(!resource.applied());
        assert_eq!(resource.fields(), &options);
        assert_eq!(resource.id(), Some("rootfs"));
        assert_eq!(resource.path(), "/drives/rootfs");
    }

    #[test]
    fn test_merge_overwrites_and_resets_applied() {
        let mut resource = Resource::new(
            ResourceKind::Balloon,
            bag(json!({"amount_mib": 128, "deflate_on_oom": true})),
        );
        resource.set_applied(true);

        resource.merge(bag(json!({"amount_mib": 256})));

        assert!(!resource.applied());
        assert_eq!(resource.get("amount_mib"), Some(&json!(256)));
        assert_eq!(resource.get("deflate_on_oom"), Some(&json!(true)));
    }

    #[test]
    fn test_patch_body_keeps_only_post_boot_fields() {
        let resource = Resource::new(
            ResourceKind::Drive,
            bag(json!({
                "drive_id": "data",
                "is_root_device": false,
                "path_on_host": "/images/data.ext4",
                "is_read_only": true,
            })),
        );

        let body = resource.patch_body();
        assert_eq!(
            body,
            json!({"drive_id": "data", "path_on_host": "/images/data.ext4"})
        );
    }

    #[test]
    fn test_mmds_body_is_bare_document() {
        let resource = Resource::new(
            ResourceKind::Mmds,
            bag(json!({"data": {"instance_id": "i-1"}})),
        );
        assert_eq!(resource.body(), json!({"instance_id": "i-1"}));
    }

    #[test]
    fn test_singleton_path_has_no_id() {
        let resource = Resource::new(
            ResourceKind::MachineConfig,
            bag(json!({"vcpu_count": 2, "mem_size_mib": 512})),
        );
        assert_eq!(resource.path(), "/machine-config");
        assert_eq!(resource.id(), None);
    }

    #[test]
    fn test_rate_limiter_marshals_explicit_nulls() {
        let limiter = RateLimiter::bandwidth(TokenBucket {
            size: 1024,
            refill_time: 100,
            one_time_burst: 0,
        });
        let value = limiter.to_value();
        assert_eq!(value["bandwidth"]["size"], json!(1024));
        assert!(value["ops"].is_null());
    }

    #[test]
    fn test_registry_metadata() {
        assert_eq!(ResourceKind::MmdsConfig.endpoint(), "/mmds/config");
        assert_eq!(ResourceKind::Pmem.endpoint(), "/pmem");
        assert_eq!(ResourceKind::Pmem.config_key(), "pmems");
        assert_eq!(ResourceKind::NetworkInterface.id_field(), Some("iface_id"));
        assert!(ResourceKind::Drive.is_collection());
        assert!(!ResourceKind::Balloon.is_collection());
        assert!(ResourceKind::BootSource.post_boot_schema().is_empty());
        assert_eq!(ResourceKind::NetworkInterface.error_key(), "network_interfaces");
    }
}
