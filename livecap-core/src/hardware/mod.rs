//! Hardware profiling and engine settings selection.
//!
//! [`probe`] inspects the machine once at startup. The selection functions
//! are pure functions of the resulting [`DeviceProfile`], so the sizing
//! rules are testable without hardware.

pub mod probe;

pub use probe::probe;

use std::str::FromStr;

/// One CUDA-capable device as reported by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuDevice {
    pub name: String,
    /// Total device memory in GiB.
    pub memory_gb: f64,
    pub compute_major: u32,
    pub compute_minor: u32,
}

impl GpuDevice {
    /// Whether the device clears the bar for a wide decode beam: an
    /// RTX-class part or compute capability 7.0 (Volta) and up.
    pub fn is_modern(&self) -> bool {
        self.name.to_ascii_uppercase().contains("RTX") || self.compute_major >= 7
    }
}

/// Snapshot of the machine's compute resources, probed once at startup.
#[derive(Debug, Clone, Default)]
pub struct DeviceProfile {
    /// CUDA-capable devices; empty when unavailable.
    pub nvidia: Vec<GpuDevice>,
    /// An AMD/Radeon adapter is present. The engine cannot use it; its
    /// detection only drives a warning status on the protocol.
    pub amd_detected: bool,
    /// Total system RAM in GiB.
    pub total_ram_gb: f64,
}

impl DeviceProfile {
    pub fn cuda_available(&self) -> bool {
        !self.nvidia.is_empty()
    }
}

/// Compute device the engine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cpu,
    Cuda,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Cuda => write!(f, "cuda"),
        }
    }
}

/// Numeric precision for inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputePrecision {
    Int8,
    Float16,
}

impl std::fmt::Display for ComputePrecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputePrecision::Int8 => write!(f, "int8"),
            ComputePrecision::Float16 => write!(f, "float16"),
        }
    }
}

/// Model size tiers, smallest to largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    LargeV3,
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::LargeV3 => "large-v3",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ModelSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large-v3" | "large" => Ok(ModelSize::LargeV3),
            other => Err(format!(
                "unknown model size '{other}' (expected tiny, base, small, medium or large-v3)"
            )),
        }
    }
}

/// Complete engine configuration derived from the profile and overrides.
/// Immutable for the engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub device: DeviceKind,
    pub precision: ComputePrecision,
    pub beam_size: u32,
    pub vad_filter: bool,
    pub model: ModelSize,
}

/// User overrides applied on top of the probed profile.
#[derive(Debug, Clone, Default)]
pub struct SelectionOverrides {
    pub force_cpu: bool,
    /// Explicit model choice; always wins over the recommendation.
    pub model: Option<ModelSize>,
    /// RAM figure the CPU sizing rule uses instead of the probed total,
    /// for deterministic sizing on shared hosts and in tests.
    pub max_ram_gb: Option<u64>,
}

/// Derive the full engine configuration. First matching rule wins:
/// CUDA available and not force-disabled runs float16 with a beam of 5 on
/// modern devices and 3 otherwise; every other case runs int8 on CPU with
/// a beam of 1. VAD filtering is on in every branch.
pub fn select_engine_settings(
    profile: &DeviceProfile,
    overrides: &SelectionOverrides,
) -> EngineSettings {
    let (device, precision, beam_size) = if profile.cuda_available() && !overrides.force_cpu {
        let modern = profile.nvidia.iter().any(GpuDevice::is_modern);
        (
            DeviceKind::Cuda,
            ComputePrecision::Float16,
            if modern { 5 } else { 3 },
        )
    } else {
        (DeviceKind::Cpu, ComputePrecision::Int8, 1)
    };

    let model = overrides
        .model
        .unwrap_or_else(|| recommend_model_size(profile, overrides));

    EngineSettings {
        device,
        precision,
        beam_size,
        vad_filter: true,
        model,
    }
}

/// Recommend a model tier from available memory.
///
/// CUDA sizing follows the first device (the one the runtime selects by
/// default); CPU sizing follows total RAM, with a configured `max_ram_gb`
/// standing in for the probed value entirely.
pub fn recommend_model_size(profile: &DeviceProfile, overrides: &SelectionOverrides) -> ModelSize {
    if profile.cuda_available() && !overrides.force_cpu {
        let vram = profile.nvidia[0].memory_gb;
        return if vram >= 10.0 {
            ModelSize::LargeV3
        } else if vram >= 5.0 {
            ModelSize::Medium
        } else if vram >= 2.0 {
            ModelSize::Small
        } else {
            ModelSize::Tiny
        };
    }

    let ram = match overrides.max_ram_gb {
        Some(cap) => cap as f64,
        None => profile.total_ram_gb,
    };
    if ram >= 16.0 {
        ModelSize::Medium
    } else if ram >= 8.0 {
        ModelSize::Small
    } else {
        ModelSize::Base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu(name: &str, memory_gb: f64, major: u32, minor: u32) -> GpuDevice {
        GpuDevice {
            name: name.to_string(),
            memory_gb,
            compute_major: major,
            compute_minor: minor,
        }
    }

    fn gpu_profile(device: GpuDevice) -> DeviceProfile {
        DeviceProfile {
            nvidia: vec![device],
            amd_detected: false,
            total_ram_gb: 32.0,
        }
    }

    fn cpu_profile(ram_gb: f64) -> DeviceProfile {
        DeviceProfile {
            nvidia: Vec::new(),
            amd_detected: false,
            total_ram_gb: ram_gb,
        }
    }

    #[test]
    fn twelve_gib_rtx_card_gets_the_largest_tier_and_wide_beam() {
        let profile = gpu_profile(gpu("NVIDIA GeForce RTX 3080 Ti", 12.0, 8, 6));
        let settings = select_engine_settings(&profile, &SelectionOverrides::default());

        assert_eq!(settings.device, DeviceKind::Cuda);
        assert_eq!(settings.precision, ComputePrecision::Float16);
        assert_eq!(settings.beam_size, 5);
        assert_eq!(settings.model, ModelSize::LargeV3);
        assert!(settings.vad_filter);
    }

    #[test]
    fn older_cards_get_a_narrower_beam() {
        // Pascal-era part: neither RTX-branded nor compute 7.x.
        let profile = gpu_profile(gpu("NVIDIA GeForce GTX 1080", 8.0, 6, 1));
        let settings = select_engine_settings(&profile, &SelectionOverrides::default());

        assert_eq!(settings.device, DeviceKind::Cuda);
        assert_eq!(settings.beam_size, 3);
        assert_eq!(settings.model, ModelSize::Medium);
    }

    #[test]
    fn compute_capability_alone_marks_a_device_modern() {
        assert!(gpu("Tesla T4", 16.0, 7, 5).is_modern());
        assert!(gpu("NVIDIA RTX A2000", 6.0, 8, 6).is_modern());
        assert!(!gpu("NVIDIA GeForce GTX 1660", 6.0, 6, 2).is_modern());
    }

    #[test]
    fn vram_tiers_step_down_with_memory() {
        let cases = [
            (11.0, ModelSize::LargeV3),
            (10.0, ModelSize::LargeV3),
            (6.0, ModelSize::Medium),
            (4.0, ModelSize::Small),
            (1.5, ModelSize::Tiny),
        ];
        for (vram, expected) in cases {
            let profile = gpu_profile(gpu("NVIDIA GeForce RTX 3060", vram, 8, 6));
            assert_eq!(
                recommend_model_size(&profile, &SelectionOverrides::default()),
                expected,
                "vram={vram}"
            );
        }
    }

    #[test]
    fn cpu_only_machines_size_by_ram() {
        let cases = [
            (32.0, ModelSize::Medium),
            (16.0, ModelSize::Medium),
            (8.0, ModelSize::Small),
            (4.0, ModelSize::Base),
        ];
        for (ram, expected) in cases {
            assert_eq!(
                recommend_model_size(&cpu_profile(ram), &SelectionOverrides::default()),
                expected,
                "ram={ram}"
            );
        }
    }

    #[test]
    fn ram_cap_override_replaces_the_probed_total() {
        let overrides = SelectionOverrides {
            max_ram_gb: Some(4),
            ..Default::default()
        };
        let settings = select_engine_settings(&cpu_profile(64.0), &overrides);

        assert_eq!(settings.model, ModelSize::Base);
        assert_eq!(settings.device, DeviceKind::Cpu);
        assert_eq!(settings.precision, ComputePrecision::Int8);
        assert_eq!(settings.beam_size, 1);
    }

    #[test]
    fn a_ram_cap_above_the_probed_total_raises_the_tier() {
        // The override is an assumption, not a clamp: sizing trusts it even
        // when the machine has less.
        let overrides = SelectionOverrides {
            max_ram_gb: Some(16),
            ..Default::default()
        };
        assert_eq!(
            select_engine_settings(&cpu_profile(8.0), &overrides).model,
            ModelSize::Medium
        );
    }

    #[test]
    fn force_cpu_ignores_an_available_gpu() {
        let mut profile = gpu_profile(gpu("NVIDIA GeForce RTX 4090", 24.0, 8, 9));
        profile.total_ram_gb = 8.0;
        let overrides = SelectionOverrides {
            force_cpu: true,
            ..Default::default()
        };
        let settings = select_engine_settings(&profile, &overrides);

        assert_eq!(settings.device, DeviceKind::Cpu);
        assert_eq!(settings.beam_size, 1);
        assert_eq!(settings.model, ModelSize::Small);
    }

    #[test]
    fn explicit_model_override_beats_the_recommendation() {
        let profile = gpu_profile(gpu("NVIDIA GeForce RTX 4090", 24.0, 8, 9));
        let overrides = SelectionOverrides {
            model: Some(ModelSize::Tiny),
            ..Default::default()
        };
        assert_eq!(
            select_engine_settings(&profile, &overrides).model,
            ModelSize::Tiny
        );
    }

    #[test]
    fn amd_only_machines_use_the_plain_cpu_settings() {
        let profile = DeviceProfile {
            nvidia: Vec::new(),
            amd_detected: true,
            total_ram_gb: 16.0,
        };
        let settings = select_engine_settings(&profile, &SelectionOverrides::default());

        assert_eq!(settings.device, DeviceKind::Cpu);
        assert_eq!(settings.precision, ComputePrecision::Int8);
        assert_eq!(settings.beam_size, 1);
        assert_eq!(settings.model, ModelSize::Medium);
    }

    #[test]
    fn model_size_round_trips_through_strings() {
        for size in [
            ModelSize::Tiny,
            ModelSize::Base,
            ModelSize::Small,
            ModelSize::Medium,
            ModelSize::LargeV3,
        ] {
            assert_eq!(size.to_string().parse::<ModelSize>().unwrap(), size);
        }
        assert_eq!("large".parse::<ModelSize>().unwrap(), ModelSize::LargeV3);
        assert!("huge".parse::<ModelSize>().is_err());
    }
}
