// Public-API scenarios: a fully populated spec rendered as a dry-run plan,
// jailer argv composition, and the state gates a caller sees without a
// running microVM.

use kindling::{CliOption, Error, ResourceKind, SnapshotSpec, Vm, VmState};
use serde_json::{json, Map, Value};

fn bag(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("expected object")
}

#[test]
fn dry_run_of_fully_populated_spec() {
    let mut vm = Vm::new();
    vm.configure(
        ResourceKind::MachineConfig,
        bag(json!({"vcpu_count": 4, "mem_size_mib": 2048})),
    )
    .unwrap();
    vm.configure(
        ResourceKind::Balloon,
        bag(json!({"amount_mib": 256, "deflate_on_oom": true})),
    )
    .unwrap();
    vm.configure(
        ResourceKind::BootSource,
        bag(json!({"kernel_image_path": "/k"})),
    )
    .unwrap();
    vm.add(
        ResourceKind::Drive,
        "rootfs",
        bag(json!({"path_on_host": "/r", "is_root_device": true, "is_read_only": false})),
    )
    .unwrap();
    vm.add(
        ResourceKind::NetworkInterface,
        "eth0",
        bag(json!({"host_dev_name": "tap0", "guest_mac": "AA:FC:00:00:00:01"})),
    )
    .unwrap();
    vm.add(
        ResourceKind::Pmem,
        "pmem0",
        bag(json!({"path_on_host": "/p"})),
    )
    .unwrap();
    vm.configure(
        ResourceKind::Vsock,
        bag(json!({"guest_cid": 42, "uds_path": "/v"})),
    )
    .unwrap();
    vm.metadata(json!({"instance_id": "i-1"})).unwrap();

    let plan = vm.plan();

    // Kebab-case top-level names, snake_case inner fields.
    assert_eq!(plan.config["machine-config"]["vcpu_count"], json!(4));
    assert_eq!(plan.config["machine-config"]["mem_size_mib"], json!(2048));
    assert_eq!(plan.config["balloon"]["amount_mib"], json!(256));
    assert_eq!(plan.config["boot-source"]["kernel_image_path"], json!("/k"));
    assert_eq!(plan.config["drives"][0]["drive_id"], json!("rootfs"));
    assert_eq!(plan.config["drives"][0]["is_root_device"], json!(true));
    assert_eq!(
        plan.config["network-interfaces"][0]["guest_mac"],
        json!("AA:FC:00:00:00:01")
    );
    assert_eq!(plan.config["pmems"][0]["id"], json!("pmem0"));
    assert_eq!(plan.config["vsock"]["guest_cid"], json!(42));
    assert_eq!(plan.config["mmds"]["instance_id"], json!("i-1"));

    assert!(plan.args.contains(&"--api-sock".to_string()));
    assert!(plan.args.contains(&"--id".to_string()));
    assert!(plan.api_sock.is_some());
}

#[test]
fn plan_argv_is_sorted_and_deterministic() {
    let mut vm = Vm::new();
    vm.set_option(CliOption::Id, "det-vm").unwrap();
    vm.set_option(CliOption::NoSeccomp, true).unwrap();
    vm.set_option(CliOption::BootTimer, true).unwrap();
    vm.set_option(CliOption::MmdsSizeLimit, 2048u64).unwrap();
    vm.set_option(CliOption::Level, "Warn").unwrap();

    let first = vm.plan();
    let second = vm.plan();
    assert_eq!(first.args, second.args);

    let flags: Vec<&String> = first.args.iter().filter(|a| a.starts_with("--")).collect();
    let mut sorted = flags.clone();
    sorted.sort();
    assert_eq!(flags, sorted);
}

#[test]
fn jailered_plan_wraps_firecracker() {
    let mut vm = Vm::new();
    vm.set_option(CliOption::Id, "jailed").unwrap();
    vm.jail(bag(json!({
        "uid": 1000,
        "gid": 1000,
        "daemonize": true,
        "cgroups": {"cpu.shares": 512},
    })))
    .unwrap();
    vm.cgroup("cpuset.cpus", json!("0-1")).unwrap();
    vm.resource_limit("no-file", json!(1024)).unwrap();

    let plan = vm.plan();
    let separator = plan.args.iter().position(|a| a == "--").unwrap();
    let outer = &plan.args[..separator];
    let inner = &plan.args[separator + 1..];

    assert!(outer.contains(&"--exec-file".to_string()));
    assert!(outer.contains(&"--daemonize".to_string()));
    assert!(outer.contains(&"cpu.shares=512".to_string()));
    assert!(outer.contains(&"cpuset.cpus=0-1".to_string()));
    assert!(outer.contains(&"no-file=1024".to_string()));
    assert!(!inner.contains(&"--id".to_string()));
}

#[test]
fn lifecycle_gates_without_start() {
    let mut vm = Vm::new();
    assert_eq!(vm.state(), VmState::Initial);

    // Nothing past start is reachable from a bare spec.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    assert!(matches!(
        rt.block_on(vm.boot()),
        Err(Error::InvalidState { .. })
    ));
    assert!(matches!(
        rt.block_on(vm.pause()),
        Err(Error::InvalidState { .. })
    ));
    assert!(matches!(
        rt.block_on(vm.stop()),
        Err(Error::InvalidState { .. })
    ));
    assert!(matches!(
        rt.block_on(vm.snapshot(&SnapshotSpec::new("/m", "/s"))),
        Err(Error::InvalidState { .. })
    ));
}

#[test]
fn schema_violations_name_the_field() {
    let mut vm = Vm::new();

    let err = vm
        .configure(ResourceKind::Vsock, bag(json!({"uds_path": "/v"})))
        .unwrap_err();
    match err {
        Error::InvalidOption { field, .. } => assert_eq!(field, "guest_cid"),
        other => panic!("unexpected error: {other}"),
    }

    let err = vm
        .configure(
            ResourceKind::MachineConfig,
            bag(json!({"vcpu_count": 0, "mem_size_mib": 512})),
        )
        .unwrap_err();
    match err {
        Error::InvalidOption { field, .. } => assert_eq!(field, "vcpu_count"),
        other => panic!("unexpected error: {other}"),
    }

    let err = vm
        .add(
            ResourceKind::Drive,
            "rootfs",
            bag(json!({"is_root_device": true, "spin_speed": 7200})),
        )
        .unwrap_err();
    match err {
        Error::InvalidOption { field, .. } => assert_eq!(field, "spin_speed"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn reusing_a_member_id_updates_in_place() {
    let mut vm = Vm::new();
    vm.add(
        ResourceKind::Drive,
        "data",
        bag(json!({"is_root_device": false, "path_on_host": "/a"})),
    )
    .unwrap();
    vm.add(
        ResourceKind::Drive,
        "data",
        bag(json!({"path_on_host": "/b"})),
    )
    .unwrap();

    assert_eq!(vm.drives().len(), 1);
    assert_eq!(
        vm.drives()["data"].get("path_on_host"),
        Some(&json!("/b"))
    );
}
