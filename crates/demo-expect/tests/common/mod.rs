//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Once;
use std::time::Duration;

use demo_expect::{Session, SessionConfig, TimeoutConfig};

/// A line-driven stand-in for a demo client: `i` prints a greeting, `x`
/// exits successfully, anything else is reported as unknown.
pub const HELLO_CLIENT: &str = r#"
while IFS= read -r line; do
    case "$line" in
        i) echo "Hello World!" ;;
        x) exit 0 ;;
        *) echo "unknown command: $line" ;;
    esac
done
exit 1
"#;

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Configuration running `script` under `/bin/sh` with short timeouts.
pub fn sh(script: &str) -> SessionConfig {
    SessionConfig::new("/bin/sh")
        .args(["-c", script])
        .timeout(Duration::from_secs(5))
}

/// Same as [`sh`] with a close timeout suited to tests.
pub fn sh_quick_close(script: &str) -> SessionConfig {
    let mut config = sh(script);
    config.timeout = TimeoutConfig::new(Duration::from_secs(5)).close(Duration::from_millis(300));
    config
}

/// Spawn `script` under `/bin/sh`.
pub async fn spawn_sh(script: &str) -> Session {
    init_tracing();
    Session::spawn_with_config(sh(script))
        .await
        .expect("spawn /bin/sh")
}

/// Whether `pid` still has an entry in the process table.
#[cfg(target_os = "linux")]
pub fn process_exists(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{pid}")).exists()
}
