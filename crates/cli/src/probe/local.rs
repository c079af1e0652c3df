use async_trait::async_trait;
use sysinfo::{DiskKind, Disks, System};
use tokio::process::Command;

use super::{DriveSpace, HostProbe, HostSnapshot, ProbeError, ServiceState};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Probes the machine shipshape itself runs on. Service control goes
/// through systemctl.
#[derive(Debug)]
pub struct LocalProbe;

impl LocalProbe {
    pub fn new() -> Self {
        Self
    }
}

async fn systemctl(args: &[&str]) -> Result<std::process::Output, ProbeError> {
    let command = format!("systemctl {}", args.join(" "));
    Command::new("systemctl")
        .args(args)
        .output()
        .await
        .map_err(|source| ProbeError::Command { command, source })
}

#[async_trait]
impl HostProbe for LocalProbe {
    async fn ping(&self) -> bool {
        true
    }

    async fn snapshot(&self) -> Result<HostSnapshot, ProbeError> {
        // CPU usage is a delta between two refreshes.
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let cpu_percent = sys.global_cpu_usage() as f64;
        let total = sys.total_memory() as f64;
        let used = sys.used_memory() as f64;
        let memory_percent = if total > 0.0 { used / total * 100.0 } else { 0.0 };

        let disks = Disks::new_with_refreshed_list();
        let mut drives = Vec::new();
        for disk in disks.list() {
            if disk.total_space() == 0 || !matches!(disk.kind(), DiskKind::HDD | DiskKind::SSD) {
                continue;
            }
            drives.push(DriveSpace {
                mount: disk.mount_point().to_string_lossy().into_owned(),
                free_gb: disk.available_space() as f64 / BYTES_PER_GB,
                total_gb: disk.total_space() as f64 / BYTES_PER_GB,
            });
        }

        Ok(HostSnapshot {
            cpu_percent,
            memory_percent,
            drives,
        })
    }

    async fn service_status(&self, service: &str) -> Result<ServiceState, ProbeError> {
        // `is-active` prints the unit state and exits non-zero for anything
        // but "active", so the text is the signal, not the exit code.
        let output = systemctl(&["is-active", service]).await?;
        let state = String::from_utf8_lossy(&output.stdout);
        if state.trim() == "active" {
            Ok(ServiceState::Running)
        } else {
            Ok(ServiceState::Stopped)
        }
    }

    async fn restart_service(&self, service: &str) -> Result<(), ProbeError> {
        let output = systemctl(&["restart", service]).await?;
        if !output.status.success() {
            let detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ProbeError::CommandFailed {
                command: format!("systemctl restart {service}"),
                detail,
            });
        }
        Ok(())
    }
}
