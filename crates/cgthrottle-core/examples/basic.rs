//! Applies a fixed throttle configuration to the cgroup given on the
//! command line.
//!
//! ```text
//! cargo run -p cgthrottle-core --example basic -- /sys/fs/cgroup/system.slice/my-service.service
//! ```

use std::path::PathBuf;

const CONFIG: &str = r#"{
    "Classes": {
        "quota": [
            {
                "Devices": ["/dev/sda"],
                "ThrottleReadIOPS": "1000",
                "ThrottleWriteIOPS": "800",
                "ThrottleReadBps": "50M",
                "ThrottleWriteBps": "30M"
            }
        ]
    }
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let Some(cgroup) = std::env::args_os().nth(1).map(PathBuf::from) else {
        return Err("usage: basic <cgroup-path>".into());
    };

    tracing::info!(cgroup = %cgroup.display(), "applying example limits");
    let applied = cgthrottle_core::apply_from_json_str(CONFIG, &cgroup)?;
    tracing::info!(devices = applied.len(), "example limits applied");
    Ok(())
}
