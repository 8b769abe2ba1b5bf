//! Version command implementation

use appcontainer::error::Result;

/// Run version command
pub fn run() -> Result<()> {
    println!("appcontainer {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Build info:");
    println!("  Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    println!("  Profile: {}", build_profile());
    println!("  Transports: http(s), sftp");
    println!("  Archives: zip, tar.gz");

    Ok(())
}

fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}
