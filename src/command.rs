// Command-line materialisation
//
// Turns a VM spec into the external binary's argv, plus the optional
// launch-time JSON config file. When a jailer is attached the wrapper binary
// runs first and the Firecracker argv follows a `--` separator. Argv is
// sorted by flag name so command lines are deterministic.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::resource::ResourceKind;
use crate::schema::FieldType;
use crate::vm::Vm;

/// CLI options recognised by the launch surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CliOption {
    ApiSock,
    BootTimer,
    ConfigFile,
    EnablePci,
    FirecrackerPath,
    HttpApiMaxPayloadSize,
    Id,
    Level,
    LogPath,
    Metadata,
    MetricsPath,
    MmdsSizeLimit,
    Module,
    NoApi,
    NoSeccomp,
    ParentCpuTimeUs,
    SeccompFilter,
    ShowLevel,
    ShowLogOrigin,
    StartTimeCpuUs,
    StartTimeUs,
}

impl CliOption {
    pub fn name(self) -> &'static str {
        match self {
            CliOption::ApiSock => "api_sock",
            CliOption::BootTimer => "boot_timer",
            CliOption::ConfigFile => "config_file",
            CliOption::EnablePci => "enable_pci",
            CliOption::FirecrackerPath => "firecracker_path",
            CliOption::HttpApiMaxPayloadSize => "http_api_max_payload_size",
            CliOption::Id => "id",
            CliOption::Level => "level",
            CliOption::LogPath => "log_path",
            CliOption::Metadata => "metadata",
            CliOption::MetricsPath => "metrics_path",
            CliOption::MmdsSizeLimit => "mmds_size_limit",
            CliOption::Module => "module",
            CliOption::NoApi => "no_api",
            CliOption::NoSeccomp => "no_seccomp",
            CliOption::ParentCpuTimeUs => "parent_cpu_time_us",
            CliOption::SeccompFilter => "seccomp_filter",
            CliOption::ShowLevel => "show_level",
            CliOption::ShowLogOrigin => "show_log_origin",
            CliOption::StartTimeCpuUs => "start_time_cpu_us",
            CliOption::StartTimeUs => "start_time_us",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "api_sock" => CliOption::ApiSock,
            "boot_timer" => CliOption::BootTimer,
            "config_file" => CliOption::ConfigFile,
            "enable_pci" => CliOption::EnablePci,
            "firecracker_path" => CliOption::FirecrackerPath,
            "http_api_max_payload_size" => CliOption::HttpApiMaxPayloadSize,
            "id" => CliOption::Id,
            "level" => CliOption::Level,
            "log_path" => CliOption::LogPath,
            "metadata" => CliOption::Metadata,
            "metrics_path" => CliOption::MetricsPath,
            "mmds_size_limit" => CliOption::MmdsSizeLimit,
            "module" => CliOption::Module,
            "no_api" => CliOption::NoApi,
            "no_seccomp" => CliOption::NoSeccomp,
            "parent_cpu_time_us" => CliOption::ParentCpuTimeUs,
            "seccomp_filter" => CliOption::SeccompFilter,
            "show_level" => CliOption::ShowLevel,
            "show_log_origin" => CliOption::ShowLogOrigin,
            "start_time_cpu_us" => CliOption::StartTimeCpuUs,
            "start_time_us" => CliOption::StartTimeUs,
            _ => return None,
        })
    }

    /// The `--lower-kebab-case` flag form
    pub fn flag(self) -> String {
        format!("--{}", self.name().replace('_', "-"))
    }

    pub fn value_type(self) -> FieldType {
        match self {
            CliOption::BootTimer
            | CliOption::EnablePci
            | CliOption::NoApi
            | CliOption::NoSeccomp
            | CliOption::ShowLevel
            | CliOption::ShowLogOrigin => FieldType::Bool,
            CliOption::HttpApiMaxPayloadSize
            | CliOption::MmdsSizeLimit
            | CliOption::ParentCpuTimeUs
            | CliOption::StartTimeCpuUs
            | CliOption::StartTimeUs => FieldType::NonNegInt,
            CliOption::ApiSock
            | CliOption::ConfigFile
            | CliOption::FirecrackerPath
            | CliOption::Id
            | CliOption::Level
            | CliOption::LogPath
            | CliOption::Metadata
            | CliOption::MetricsPath
            | CliOption::Module
            | CliOption::SeccompFilter => FieldType::Str,
        }
    }
}

/// A CLI option value: either a plain value, or a deferred computation
/// evaluated when the command line is materialised at start.
#[derive(Clone)]
pub enum OptionValue {
    Value(Value),
    Lazy(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl OptionValue {
    pub fn lazy(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        OptionValue::Lazy(Arc::new(f))
    }

    pub fn resolve(&self) -> Value {
        match self {
            OptionValue::Value(value) => value.clone(),
            OptionValue::Lazy(f) => f(),
        }
    }
}

impl std::fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Value(value) => write!(f, "OptionValue({value})"),
            OptionValue::Lazy(_) => f.write_str("OptionValue(<lazy>)"),
        }
    }
}

impl From<Value> for OptionValue {
    fn from(value: Value) -> Self {
        OptionValue::Value(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Value(Value::Bool(value))
    }
}

impl From<u64> for OptionValue {
    fn from(value: u64) -> Self {
        OptionValue::Value(Value::from(value))
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Value(Value::String(value.to_string()))
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Value(Value::String(value))
    }
}

/// Dry-run view of what `start` would launch and what `apply` would send
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub api_sock: Option<PathBuf>,
    /// Unapplied declarative state, keyed by the REST-path-style names
    pub config: Map<String, Value>,
}

/// Resolved command, ready to spawn
#[derive(Debug)]
pub(crate) struct BuiltCommand {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub config_file: Option<PathBuf>,
    /// Whether the config file was synthesized (and is ours to clean up)
    pub owns_config_file: bool,
}

/// Where the auto-generated launch config lands for this VM
pub(crate) fn auto_config_path(vm_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{vm_id}.config.json"))
}

/// The REST-shaped configuration map: one kebab-case key per unapplied
/// resource, collections as arrays of member bodies.
pub(crate) fn config_map(vm: &Vm) -> Map<String, Value> {
    let mut config = Map::new();
    for (kind, members) in [
        (ResourceKind::Drive, vm.collection(ResourceKind::Drive)),
        (
            ResourceKind::NetworkInterface,
            vm.collection(ResourceKind::NetworkInterface),
        ),
        (ResourceKind::Pmem, vm.collection(ResourceKind::Pmem)),
    ] {
        let bodies: Vec<Value> = members
            .values()
            .filter(|resource| !resource.applied())
            .map(|resource| resource.body())
            .collect();
        if !bodies.is_empty() {
            config.insert(kind.config_key().to_string(), Value::Array(bodies));
        }
    }
    for (kind, resource) in vm.singletons() {
        if !resource.applied() {
            config.insert(kind.config_key().to_string(), resource.body());
        }
    }
    config
}

/// Materialise the command, synthesizing the launch config file when the VM
/// runs API-less without an externally supplied one.
pub(crate) async fn build(vm: &Vm) -> Result<BuiltCommand> {
    let fc_binary = vm.resolve_binary();
    let mut config_file = vm.config_file_path().map(Path::to_path_buf);
    let mut owns_config_file = false;

    if vm.no_api() && config_file.is_none() {
        let path = auto_config_path(vm.id());
        let contents = serde_json::to_vec_pretty(&Value::Object(config_map(vm)))?;
        tokio::fs::write(&path, contents).await.map_err(|e| {
            Error::Startup(format!(
                "failed to write launch config {}: {e}",
                path.display()
            ))
        })?;
        config_file = Some(path);
        owns_config_file = true;
    }

    let fc_args = firecracker_args(vm, config_file.as_deref());
    Ok(match vm.jailer() {
        Some(jailer) => {
            let mut args = jailer.args(vm.id(), &fc_binary);
            args.push("--".to_string());
            args.extend(fc_args);
            BuiltCommand {
                binary: jailer.binary(),
                args,
                config_file,
                owns_config_file,
            }
        }
        None => BuiltCommand {
            binary: fc_binary,
            args: fc_args,
            config_file,
            owns_config_file,
        },
    })
}

/// Dry-run: same shape as [`build`] but nothing touches the filesystem
pub(crate) fn plan(vm: &Vm) -> LaunchPlan {
    let fc_binary = vm.resolve_binary();
    let config_file = vm
        .config_file_path()
        .map(Path::to_path_buf)
        .or_else(|| vm.no_api().then(|| auto_config_path(vm.id())));
    let fc_args = firecracker_args(vm, config_file.as_deref());

    let (binary, args) = match vm.jailer() {
        Some(jailer) => {
            let mut args = jailer.args(vm.id(), &fc_binary);
            args.push("--".to_string());
            args.extend(fc_args);
            (jailer.binary(), args)
        }
        None => (fc_binary, fc_args),
    };

    LaunchPlan {
        binary,
        args,
        api_sock: vm.api_socket_path().map(Path::to_path_buf),
        config: config_map(vm),
    }
}

/// Firecracker's own argv, sorted by flag name. Booleans set to false are
/// omitted; booleans set to true emit the bare flag.
fn firecracker_args(vm: &Vm, config_file: Option<&Path>) -> Vec<String> {
    let mut flags: Vec<(String, Option<String>)> = Vec::new();

    for (option, value) in vm.cli_options() {
        match value.resolve() {
            Value::Bool(true) => flags.push((option.flag(), None)),
            Value::Bool(false) | Value::Null => {}
            Value::String(s) => flags.push((option.flag(), Some(s))),
            other => flags.push((option.flag(), Some(other.to_string()))),
        }
    }

    // The jailer owns --id for the wrapped process.
    if vm.jailer().is_none() {
        flags.push(("--id".to_string(), Some(vm.id().to_string())));
    }
    if vm.no_api() {
        flags.push(("--no-api".to_string(), None));
    } else if let Some(sock) = vm.api_socket_path() {
        flags.push(("--api-sock".to_string(), Some(sock.display().to_string())));
    }
    if let Some(path) = config_file {
        flags.push(("--config-file".to_string(), Some(path.display().to_string())));
    }

    flags.sort_by(|a, b| a.0.cmp(&b.0));
    let mut args = Vec::with_capacity(flags.len() * 2);
    for (flag, value) in flags {
        args.push(flag);
        if let Some(value) = value {
            args.push(value);
        }
    }
    args
}
