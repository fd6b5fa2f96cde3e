//! End-to-end tests for the `rpcf` binary over throwaway Java projects.

#![allow(deprecated)] // cargo_bin is deprecated in assert_cmd but replacement not yet stable

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

type TestResult<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;

const CONTRACT: &str = r#"package com.acme.api;

import com.ctriposs.baiji.rpc.common.BaijiContract;

@BaijiContract(serviceName = "UserService")
public interface UserService {
    User getUser(long id);
    void saveUser(User user);
    String checkHealth();
}
"#;

const IMPL: &str = r#"package com.acme.user;

import com.acme.api.UserService;

public class UserServiceImpl implements UserService {
    @Override
    public User getUser(long id) {
        return null;
    }

    @Override
    public void saveUser(User user) {
    }

    public String checkHealth() {
        return "ok";
    }

    private void audit() {
    }
}
"#;

const GENERATED: &str = r#"package com.acme.generated;

import com.acme.api.UserService;

public class GeneratedUserService implements UserService {
    @Override
    public User getUser(long id) {
        return null;
    }
}
"#;

fn write(root: &Path, rel: &str, content: &str) -> TestResult {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().ok_or("no parent")?)?;
    std::fs::write(path, content)?;
    Ok(())
}

fn project() -> TestResult<TempDir> {
    let dir = TempDir::new()?;
    write(dir.path(), "api/src/com/acme/api/UserService.java", CONTRACT)?;
    write(dir.path(), "user/src/com/acme/user/UserServiceImpl.java", IMPL)?;
    write(dir.path(), "generated/com/acme/generated/GeneratedUserService.java", GENERATED)?;
    Ok(dir)
}

fn rpcf(root: &Path) -> TestResult<Command> {
    let mut cmd = Command::cargo_bin("rpcf")?;
    cmd.arg("--root").arg(root);
    Ok(cmd)
}

#[test]
fn test_help() -> TestResult {
    Command::cargo_bin("rpcf")?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("recent"));
    Ok(())
}

#[test]
fn test_search_json() -> TestResult {
    let dir = project()?;

    let output = rpcf(dir.path())?.args(["search", "getuser"]).output()?;
    assert!(output.status.success());

    let hits: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let hits = hits.as_array().ok_or("expected array")?;
    assert!(!hits.is_empty());
    assert_eq!(hits[0]["method_name"], "getUser");
    assert!(hits[0]["score"].is_i64());
    assert!(hits
        .iter()
        .any(|h| h["class_name"] == "com.acme.user.UserServiceImpl"));
    Ok(())
}

#[test]
fn test_search_text_with_highlight() -> TestResult {
    let dir = project()?;

    rpcf(dir.path())?
        .args(["--format", "text", "search", "gu", "--highlight"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[g]et[U]ser"))
        .stdout(predicate::str::contains("com.acme.user.UserServiceImpl"));
    Ok(())
}

#[test]
fn test_search_limit() -> TestResult {
    let dir = project()?;

    let output = rpcf(dir.path())?.args(["search", "e", "--limit", "1"]).output()?;
    let hits: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(hits.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[test]
fn test_search_without_results_exits_not_found() -> TestResult {
    let dir = project()?;

    rpcf(dir.path())?.args(["search", "zzz"]).assert().code(1);
    rpcf(dir.path())?.args(["search", "   "]).assert().code(1);
    Ok(())
}

#[test]
fn test_list_only_contract_methods() -> TestResult {
    let dir = project()?;

    rpcf(dir.path())?
        .args(["--format", "text", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("getUser"))
        .stdout(predicate::str::contains("saveUser"))
        .stdout(predicate::str::contains("checkHealth"))
        .stdout(predicate::str::contains("audit").not());
    Ok(())
}

#[test]
fn test_config_excludes_directories() -> TestResult {
    let dir = project()?;

    rpcf(dir.path())?
        .args(["--format", "text", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GeneratedUserService"));

    write(dir.path(), ".rpcfinder.toml", "exclude_dirs = [\"generated\"]\n")?;

    rpcf(dir.path())?
        .args(["--format", "text", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GeneratedUserService").not());
    Ok(())
}

#[test]
fn test_select_then_recent() -> TestResult {
    let dir = project()?;

    rpcf(dir.path())?
        .args(["select", "com.acme.user.UserServiceImpl", "saveUser"])
        .assert()
        .success();
    rpcf(dir.path())?
        .args(["select", "com.acme.user.UserServiceImpl", "getUser"])
        .assert()
        .success();
    assert!(dir.path().join(".rpcfinder/history.json").exists());

    let output = rpcf(dir.path())?.arg("recent").output()?;
    assert!(output.status.success());
    let recent: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let names: Vec<_> = recent
        .as_array()
        .ok_or("expected array")?
        .iter()
        .map(|r| r["method_name"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["getUser", "saveUser"]);

    let output = rpcf(dir.path())?.args(["recent", "--all"]).output()?;
    let all: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(all["recent"].as_array().map(Vec::len), Some(2));
    assert!(all["remaining"]
        .as_array()
        .ok_or("expected array")?
        .iter()
        .all(|r| r["method_name"] != "getUser" || r["class_name"] != "com.acme.user.UserServiceImpl"));
    Ok(())
}

#[test]
fn test_recent_drops_methods_that_disappeared() -> TestResult {
    let dir = project()?;

    rpcf(dir.path())?
        .args(["select", "com.acme.user.UserServiceImpl", "checkHealth"])
        .assert()
        .success();

    let without_health = IMPL.replace("checkHealth", "ping");
    write(dir.path(), "user/src/com/acme/user/UserServiceImpl.java", &without_health)?;

    rpcf(dir.path())?
        .arg("recent")
        .assert()
        .success()
        .stdout(predicate::str::contains("checkHealth").not());
    Ok(())
}

#[test]
fn test_select_unknown_method_exits_not_found() -> TestResult {
    let dir = project()?;

    rpcf(dir.path())?
        .args(["select", "com.acme.user.UserServiceImpl", "audit"])
        .assert()
        .code(1);
    assert!(!dir.path().join(".rpcfinder/history.json").exists());
    Ok(())
}

#[test]
fn test_missing_root_is_an_error() -> TestResult {
    let dir = TempDir::new()?;

    rpcf(&dir.path().join("nope"))?
        .args(["search", "user"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("CommandFailed"));
    Ok(())
}
