//! `transport check` - runtime configuration report.

use crate::Result;

pub fn run() -> Result<()> {
    println!("transport {}", env!("CARGO_PKG_VERSION"));
    println!("available cores: {}", num_cpus::get());
    println!(
        "log filter: {}",
        std::env::var("RUST_LOG").unwrap_or_else(|_| "(default)".to_owned())
    );
    Ok(())
}
