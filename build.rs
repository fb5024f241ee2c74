// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=METER_CAPTURE_VERSION");

    // Packagers may pin the version explicitly
    let version = match std::env::var("METER_CAPTURE_VERSION") {
        Ok(v) => v,
        Err(_) => git_version(),
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn git_version() -> String {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if described.is_empty() {
                env!("CARGO_PKG_VERSION").to_string()
            } else {
                described
            }
        }
        _ => env!("CARGO_PKG_VERSION").to_string(),
    }
}
