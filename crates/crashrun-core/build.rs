//! Build script for crashrun-core
//!
//! Checks the toolchain and target before compilation:
//! - Minimum Rust version (Edition 2021 = Rust 1.56.0+, `Option::unzip` and `IsTerminal` need 1.70)
//! - Platform support (the process-control backend is Linux-only)

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::new(1, 70, 0);

        if rustc_version < min_rust_version {
            panic!(
                "crashrun-core requires Rust {} or newer, found {}",
                min_rust_version, rustc_version
            );
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }

    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os != "linux" {
        println!(
            "cargo:warning=crashrun-core has no process-control backend for {target_os}; `crashrun run` will report \
             an unsupported platform"
        );
    }

    let target_arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    if target_os == "linux" && target_arch != "x86_64" && target_arch != "aarch64" {
        println!("cargo:warning=register access is not implemented for {target_arch}; backtraces will be empty");
    }
}
