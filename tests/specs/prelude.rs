// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the behavioral specs.

use lcm_core::der;
use lcm_engine::{Fork, LifecycleEnv};
use std::path::Path;
use std::sync::Once;
use std::time::{Duration, Instant};

static LOG_INIT: Once = Once::new();

/// Route engine diagnostics through the test harness, honouring RUST_LOG.
fn init_logging() {
    LOG_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub const DN_BAKKER: &str = "uid=bakker,dc=orvelte,dc=nep";
pub const DN_SMID: &str = "uid=smid,dc=orvelte,dc=nep";
pub const LCS_X: &str = "x . go@ gone@";
pub const LCS_Y: &str = "y aap@12345 . noot@ mies@";
pub const LCS_TWO_DOTS: &str = "y aap@12345 . noot@ . mies@";

/// Open an environment with drain-only handlers for `x` and `y`.
pub fn open_env() -> LifecycleEnv {
    open_env_with(&["x=cat > /dev/null", "y=cat > /dev/null"])
}

/// Open an environment with the given `name=command` handler arguments.
pub fn open_env_with(drivers: &[&str]) -> LifecycleEnv {
    init_logging();
    let mut args = vec!["lcm-spec".to_string()];
    args.extend(drivers.iter().map(|d| d.to_string()));
    LifecycleEnv::open(&args, 2).expect("environment opens")
}

/// Feed one addition, DER-framed like the replication driver does.
pub fn add(env: &LifecycleEnv, dn: &str, lcs: &str) -> bool {
    let (dn, lcs) = fork_bytes(dn, lcs);
    env.add(Fork {
        dn: &dn,
        lifecycle_state: &lcs,
    })
}

/// Feed one deletion, DER-framed like the replication driver does.
pub fn delete(env: &LifecycleEnv, dn: &str, lcs: &str) -> bool {
    let (dn, lcs) = fork_bytes(dn, lcs);
    env.delete(Fork {
        dn: &dn,
        lifecycle_state: &lcs,
    })
}

pub fn fork_bytes(dn: &str, lcs: &str) -> (Vec<u8>, Vec<u8>) {
    (
        der::encode(dn.as_bytes()).unwrap(),
        der::encode(lcs.as_bytes()).unwrap(),
    )
}

/// Poll a handler output file until `pred` accepts its content.
pub fn wait_for_file(path: &Path, timeout: Duration, pred: impl Fn(&str) -> bool) -> String {
    let start = Instant::now();
    loop {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if pred(&content) {
            return content;
        }
        assert!(
            start.elapsed() < timeout,
            "handler output never arrived; last content: {content:?}"
        );
        std::thread::sleep(Duration::from_millis(25));
    }
}
