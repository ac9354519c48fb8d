use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    let pkg = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let release = git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some();

    // Tagged releases report the bare version; anything else carries the commit.
    let version = match git(&["rev-parse", "--short", "HEAD"]) {
        Some(hash) if !release => format!("{pkg}-dev+{hash}"),
        _ => pkg,
    };

    println!("cargo:rustc-env=GALLEY_BUILD_VERSION={version}");
}
