use serde::{Deserialize, Serialize};

/// Host hardware as reported by `/info/device`.
///
/// Byte quantities (RAM, VRAM, log size) are raw byte counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub hostname: String,
    /// Operating system family, e.g. "Linux", "Mac" or "Windows".
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub os_version: String,
    #[serde(default)]
    pub cpu_name: String,
    #[serde(default)]
    pub cpu_threads: u32,
    #[serde(default)]
    pub ram_installed: u64,
    #[serde(default)]
    pub ram_available: u64,
    /// Discrete GPUs; `null` on hosts without any.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub gpus: Vec<GpuInfo>,
    /// Size of the proxy log file.
    #[serde(default)]
    pub log_file_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub memory_total: u64,
    #[serde(default)]
    pub memory_used: u64,
    /// Celsius, when the driver exposes it.
    #[serde(default)]
    pub temperature: Option<f64>,
}

impl DeviceSnapshot {
    /// Used RAM as a rounded percentage of installed RAM.
    pub fn ram_usage_percent(&self) -> u16 {
        usage_percent(
            self.ram_installed.saturating_sub(self.ram_available),
            self.ram_installed,
        )
    }

    /// Total VRAM over all GPUs.
    pub fn total_vram(&self) -> u64 {
        self.gpus.iter().map(|gpu| gpu.memory_total).sum()
    }

    /// Whether the GPU probe found real GPUs (a zero-sized entry means "not found").
    pub fn has_gpus(&self) -> bool {
        !self.gpus.is_empty() && self.gpus.iter().all(|gpu| gpu.memory_total > 0)
    }
}

impl GpuInfo {
    pub fn usage_percent(&self) -> u16 {
        usage_percent(self.memory_used, self.memory_total)
    }
}

fn usage_percent(used: u64, total: u64) -> u16 {
    if total == 0 {
        return 0;
    }
    ((used as f64 / total as f64) * 100.0).round().min(100.0) as u16
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<GpuInfo>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<GpuInfo>>::deserialize(deserializer)?.unwrap_or_default())
}
