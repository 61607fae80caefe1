//! End-to-end tests of the demo harness: a scripted server and client
//! launched from one directory, as a demo script would run them.

#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use demo_expect::prelude::*;

const SERVER: &str = r#"#!/bin/sh
trap 'echo "server shutting down"; exit 0' INT
echo "Hello adapter ready"
while :; do
    if [ -f hello.request ]; then
        rm -f hello.request
        echo "Hello World!"
    fi
    sleep 0.05
done
"#;

const CLIENT: &str = r#"#!/bin/sh
touch hello.request
echo "sent hello"
exit 0
"#;

fn demo_dir() -> PathBuf {
    let root = std::env::temp_dir().join(format!("demo-expect-harness-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    let dir = root.join("demo/Ice/minimal");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::create_dir_all(root.join("demoscript")).unwrap();
    write_script(&dir.join("server.sh"), SERVER);
    write_script(&dir.join("client.sh"), CLIENT);
    dir
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

#[tokio::test]
async fn minimal_demo() {
    common::init_tracing();
    let dir = demo_dir();
    let root = find_root(&dir, "demoscript").unwrap();
    assert!(dir.starts_with(&root));

    let launcher = DemoLauncher::new(&dir)
        .naming(ExecutableNaming::suffix(".sh"))
        .base_config(SessionConfig::default().timeout(Duration::from_secs(5)));

    let mut server = launcher.spawn("server").await.unwrap();
    server.expect_regex(".* ready").await.unwrap();

    let mut client = launcher.spawn("client").await.unwrap();
    client.wait_success().await.unwrap();
    server.expect("Hello World!").await.unwrap();

    server.terminate(Signal::Interrupt).unwrap();
    server.expect("server shutting down").await.unwrap();
    server.wait_success().await.unwrap();

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn interpreted_programs_run_through_interpreter() {
    let dir = std::env::temp_dir().join(format!("demo-expect-interp-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    // Not executable: only reachable through the interpreter.
    std::fs::write(dir.join("client.sh"), "echo \"interpreted $1\"\n").unwrap();

    let launcher = DemoLauncher::new(&dir).naming(ExecutableNaming::interpreted("/bin/sh", ".sh"));
    let mut client = launcher.spawn_sync("client --flag").unwrap();
    client.expect("interpreted --flag").unwrap();
    assert!(client.wait_success().unwrap().success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn missing_demo_directory_is_rejected() {
    let launcher = DemoLauncher::new("/definitely/not/a/dir");
    let err = launcher.spawn("client").await.unwrap_err();
    assert!(matches!(
        err,
        ExpectError::Spawn(SpawnError::InvalidWorkingDir { .. })
    ));
}
