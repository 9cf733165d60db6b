//! System probing.
//!
//! Subprocess and sysinfo based, deliberately tolerant: any failure yields
//! the empty/CPU portion of the profile with a debug log, never an error.

use std::process::Command;

use sysinfo::System;
use tracing::{debug, info};

use super::{DeviceProfile, GpuDevice};

/// Inspect the machine. Called once at startup; the result is immutable.
pub fn probe() -> DeviceProfile {
    let profile = DeviceProfile {
        nvidia: probe_nvidia(),
        amd_detected: probe_amd(),
        total_ram_gb: probe_ram_gb(),
    };
    info!(
        cuda_devices = profile.nvidia.len(),
        amd = profile.amd_detected,
        ram_gb = profile.total_ram_gb,
        "hardware profile"
    );
    profile
}

fn probe_nvidia() -> Vec<GpuDevice> {
    let output = match Command::new("nvidia-smi")
        .args([
            "--query-gpu=name,memory.total,compute_cap",
            "--format=csv,noheader,nounits",
        ])
        .output()
    {
        Ok(out) if out.status.success() => out,
        Ok(out) => {
            debug!(status = %out.status, "nvidia-smi exited unsuccessfully");
            return Vec::new();
        }
        Err(e) => {
            debug!("nvidia-smi not available: {e}");
            return Vec::new();
        }
    };
    parse_nvidia_csv(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `name, memory.total [MiB], compute_cap` CSV lines. Lines that do
/// not parse are skipped rather than failing the probe.
fn parse_nvidia_csv(text: &str) -> Vec<GpuDevice> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split(',').map(str::trim);
            let name = parts.next()?.to_string();
            if name.is_empty() {
                return None;
            }
            let memory_mib: f64 = parts.next()?.parse().ok()?;
            let cap = parts.next()?;
            let (compute_major, compute_minor) = match cap.split_once('.') {
                Some((major, minor)) => (major.parse().ok()?, minor.parse().ok()?),
                None => (cap.parse().ok()?, 0),
            };
            Some(GpuDevice {
                name,
                memory_gb: memory_mib / 1024.0,
                compute_major,
                compute_minor,
            })
        })
        .collect()
}

#[cfg(target_os = "linux")]
fn probe_amd() -> bool {
    match Command::new("lspci").output() {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout).to_ascii_lowercase();
            text.lines().any(|line| {
                let is_display = line.contains("vga") || line.contains("display") || line.contains(" 3d ");
                is_display
                    && (line.contains("amd") || line.contains("radeon") || line.contains("ati"))
            })
        }
        Ok(out) => {
            debug!(status = %out.status, "lspci exited unsuccessfully");
            false
        }
        Err(e) => {
            debug!("lspci not available: {e}");
            false
        }
    }
}

#[cfg(target_os = "windows")]
fn probe_amd() -> bool {
    match Command::new("wmic")
        .args(["path", "win32_VideoController", "get", "name"])
        .output()
    {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout).to_ascii_lowercase();
            text.contains("amd") || text.contains("radeon")
        }
        Ok(out) => {
            debug!(status = %out.status, "wmic exited unsuccessfully");
            false
        }
        Err(e) => {
            debug!("wmic not available: {e}");
            false
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
fn probe_amd() -> bool {
    false
}

fn probe_ram_gb() -> f64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0)
}
