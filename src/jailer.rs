// Jailer launch surface
//
// The jailer is Firecracker's sandboxing wrapper: it chroots the microVM,
// drops privileges, and applies cgroups and rlimits before exec'ing the real
// binary. The SDK only translates a validated jailer spec into the wrapper's
// argv; everything inside the chroot is the jailer's business.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::schema::{self, FieldSpec, FieldType, Schema};

const JAILER_SCHEMA: Schema = &[
    FieldSpec::required("uid", FieldType::NonNegInt),
    FieldSpec::required("gid", FieldType::NonNegInt),
    FieldSpec::optional("parent_cgroup", FieldType::Str),
    FieldSpec::optional("cgroups", FieldType::Opaque),
    FieldSpec::optional("netns", FieldType::Str),
    FieldSpec::optional("resource_limits", FieldType::Opaque),
    FieldSpec::optional("daemonize", FieldType::Bool),
    FieldSpec::optional("new_pid_ns", FieldType::Bool),
    FieldSpec::optional("jailer_path", FieldType::Str),
    FieldSpec::optional("cgroup_version", FieldType::Str),
    FieldSpec::optional("chroot_base_dir", FieldType::Str),
];

pub const DEFAULT_CHROOT_BASE_DIR: &str = "/srv/jailer";
pub const DEFAULT_CGROUP_VERSION: &str = "1";

/// Validated jailer configuration
#[derive(Debug, Clone)]
pub struct JailerSpec {
    uid: u64,
    gid: u64,
    parent_cgroup: Option<String>,
    cgroups: BTreeMap<String, String>,
    netns: Option<PathBuf>,
    resource_limits: BTreeMap<String, String>,
    daemonize: bool,
    new_pid_ns: bool,
    jailer_path: Option<PathBuf>,
    cgroup_version: String,
    chroot_base_dir: PathBuf,
}

impl JailerSpec {
    /// Build a jailer spec from an option bag. `uid` and `gid` are required;
    /// `cgroups` and `resource_limits` are maps of name to value.
    pub fn from_options(options: Map<String, Value>) -> Result<Self> {
        schema::validate(&options, JAILER_SCHEMA, true)?;

        let uid = options["uid"].as_u64().unwrap_or_default();
        let gid = options["gid"].as_u64().unwrap_or_default();

        Ok(Self {
            uid,
            gid,
            parent_cgroup: string_field(&options, "parent_cgroup"),
            cgroups: map_field(&options, "cgroups")?,
            netns: string_field(&options, "netns").map(PathBuf::from),
            resource_limits: map_field(&options, "resource_limits")?,
            daemonize: bool_field(&options, "daemonize"),
            new_pid_ns: bool_field(&options, "new_pid_ns"),
            jailer_path: string_field(&options, "jailer_path").map(PathBuf::from),
            cgroup_version: string_field(&options, "cgroup_version")
                .unwrap_or_else(|| DEFAULT_CGROUP_VERSION.to_string()),
            chroot_base_dir: string_field(&options, "chroot_base_dir")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHROOT_BASE_DIR)),
        })
    }

    /// Binary to exec as the outer process; defaults to `jailer` on PATH
    pub fn binary(&self) -> PathBuf {
        self.jailer_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("jailer"))
    }

    pub fn chroot_base_dir(&self) -> &Path {
        &self.chroot_base_dir
    }

    /// Set a cgroup entry, replacing any previous value for `name`
    pub fn cgroup(&mut self, name: impl Into<String>, value: &Value) {
        self.cgroups.insert(name.into(), value_string(value));
    }

    /// Set a resource limit entry, replacing any previous value for `name`
    pub fn resource_limit(&mut self, name: impl Into<String>, value: &Value) {
        self.resource_limits.insert(name.into(), value_string(value));
    }

    /// Jailer argv: identity flags first, then spec-derived flags sorted by
    /// flag name. The caller appends `--` and the inner Firecracker argv.
    pub fn args(&self, vm_id: &str, exec_file: &Path) -> Vec<String> {
        let mut flags: Vec<(String, Option<String>)> = vec![
            ("--uid".to_string(), Some(self.uid.to_string())),
            ("--gid".to_string(), Some(self.gid.to_string())),
            (
                "--cgroup-version".to_string(),
                Some(self.cgroup_version.clone()),
            ),
            (
                "--chroot-base-dir".to_string(),
                Some(self.chroot_base_dir.to_string_lossy().into_owned()),
            ),
        ];
        if let Some(parent) = &self.parent_cgroup {
            flags.push(("--parent-cgroup".to_string(), Some(parent.clone())));
        }
        if let Some(netns) = &self.netns {
            flags.push((
                "--netns".to_string(),
                Some(netns.to_string_lossy().into_owned()),
            ));
        }
        if self.daemonize {
            flags.push(("--daemonize".to_string(), None));
        }
        if self.new_pid_ns {
            flags.push(("--new-pid-ns".to_string(), None));
        }
        for (name, value) in &self.cgroups {
            flags.push(("--cgroup".to_string(), Some(format!("{name}={value}"))));
        }
        for (name, value) in &self.resource_limits {
            flags.push((
                "--resource-limit".to_string(),
                Some(format!("{name}={value}")),
            ));
        }
        flags.sort_by(|a, b| a.0.cmp(&b.0));

        let mut args = vec![
            "--id".to_string(),
            vm_id.to_string(),
            "--exec-file".to_string(),
            exec_file.to_string_lossy().into_owned(),
        ];
        for (flag, value) in flags {
            args.push(flag);
            if let Some(value) = value {
                args.push(value);
            }
        }
        args
    }
}

fn string_field(options: &Map<String, Value>, name: &str) -> Option<String> {
    options.get(name).and_then(Value::as_str).map(str::to_string)
}

fn bool_field(options: &Map<String, Value>, name: &str) -> bool {
    options.get(name).and_then(Value::as_bool).unwrap_or(false)
}

fn map_field(options: &Map<String, Value>, name: &str) -> Result<BTreeMap<String, String>> {
    match options.get(name) {
        None => Ok(BTreeMap::new()),
        Some(Value::Object(entries)) => Ok(entries
            .iter()
            .map(|(key, value)| (key.clone(), value_string(value)))
            .collect()),
        Some(_) => Err(Error::invalid_option(name, "expected a map of name to value")),
    }
}

fn value_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
