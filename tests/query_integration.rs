use std::process::Command;

const INVENTORY: &str = r#"
entities:
  - kind: datacenter
    name: sjc
    children: [pool/api, pool/db]
  - kind: pool
    name: api
    attrs:
      - { key: pooltype, value: role }
    children: [server/web01, server/web02]
  - kind: pool
    name: db
    children: [server/db01, server/web02]
  - kind: server
    name: web01
    fields:
      hostname: web01.example.com
      ip: 10.1.2.3
    attrs:
      - { key: memory, subkey: size, value: 34359738368 }
  - kind: server
    name: web02
    fields:
      hostname: web02.example.com
      ip: 8.8.4.4
    attrs:
      - { key: memory, subkey: size, value: 17179869184 }
  - kind: server
    name: db01
    fields:
      hostname: db01.example.com
"#;

fn run_corral(args: &[&str]) -> std::process::Output {
    let inventory = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
    std::fs::write(inventory.path(), INVENTORY).unwrap();

    Command::new(env!("CARGO_BIN_EXE_corral"))
        .args(args)
        .arg("--inventory")
        .arg(inventory.path())
        .output()
        .expect("failed to execute process")
}

fn stdout_lines(output: &std::process::Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn matches_pool_membership() {
    let output = run_corral(&["pool = api"]);
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["web01", "web02"]);
}

#[test]
fn boolean_queries_compose() {
    let output = run_corral(&["pool = api and attr memory.size >= 32G"]);
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["web01"]);

    let output = run_corral(&["pool = api - pool = db"]);
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["web01"]);
}

#[test]
fn kind_filter_restricts_candidates() {
    let output = run_corral(&["not name = web01", "--kind", "server", "--format", "keys"]);
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["server/db01", "server/web02"]);
}

#[test]
fn cidr_query_end_to_end() {
    let output = run_corral(&["ip in_cidr 10.0.0.0/8"]);
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["web01"]);
}

#[test]
fn json_output_carries_role_and_ip_scope() {
    let output = run_corral(&["name = web01", "--format", "json"]);
    assert!(output.status.success());
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);

    let parsed: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(parsed["kind"], "server");
    assert_eq!(parsed["role"], "api");
    assert_eq!(parsed["ip_scope"], "private");
    assert_eq!(parsed["pools"], serde_json::Value::from(vec!["api"]));
}

#[test]
fn malformed_query_fails_fast() {
    let output = run_corral(&["pool = (api"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to parse"), "stderr: {stderr}");

    let output = run_corral(&["ip in_cidr 10.0.0.0/33"]);
    assert!(!output.status.success());

    let output = run_corral(&["pool = api trailing"]);
    assert!(!output.status.success());
}

#[test]
fn zero_matches_is_a_success() {
    let output = run_corral(&["pool = missing"]);
    assert!(output.status.success());
    assert!(stdout_lines(&output).is_empty());
}
