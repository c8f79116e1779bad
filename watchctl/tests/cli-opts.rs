use assert_cmd::Command;

const BIN: &str = "watchctl";

#[test]
fn test_empty_args() {
    let mut cmd = Command::cargo_bin(BIN).unwrap();
    cmd.assert().failure();
}

#[test]
fn test_help() {
    let mut cmd = Command::cargo_bin(BIN).unwrap();
    cmd.arg("-h").assert().success();
}

#[test]
fn test_version_opt() {
    let mut cmd = Command::cargo_bin(BIN).unwrap();
    cmd.arg("-V").assert().failure();
}

#[test]
fn test_version_keyword() {
    let mut cmd = Command::cargo_bin(BIN).unwrap();
    cmd.arg("version").assert().success();
}

#[test]
fn test_bad_keyword() {
    let mut cmd = Command::cargo_bin(BIN).unwrap();
    cmd.arg("bouh").assert().failure();
}

#[test]
fn test_list_empty() {
    let mut cmd = Command::cargo_bin(BIN).unwrap();
    cmd.arg("list").assert().failure();
}

#[test]
fn test_list_chokepoints() {
    let mut cmd = Command::cargo_bin(BIN).unwrap();
    cmd.arg("list").arg("chokepoints").assert().success();
}

#[test]
fn test_watch_bad_subject() {
    let mut cmd = Command::cargo_bin(BIN).unwrap();
    cmd.args(["watch", "plane:F-GXXX"]).assert().failure();
}

#[test]
fn test_watch_missing_config() {
    let mut cmd = Command::cargo_bin(BIN).unwrap();
    cmd.args(["-c", "/nonexistent/seawatch.hcl", "watch", "9321483"])
        .assert()
        .failure();
}
