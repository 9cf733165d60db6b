//! Input device enumeration and selection.
//!
//! Captioning targets what the machine is playing, so system-audio capture
//! endpoints (loopback/monitor devices) are preferred by default and a real
//! microphone only on request. An explicit device-name match always wins.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;
use tracing::{info, warn};

use crate::error::{CaptionError, Result};

/// What kind of input the session wants to caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePreference {
    /// Desktop/system audio via a loopback-style endpoint.
    SystemAudio,
    /// A spoken-voice microphone.
    Microphone,
}

const LOOPBACK_KEYWORDS: &[&str] = &[
    "stereo mix",
    "wave out",
    "what u hear",
    "what you hear",
    "loopback",
    "virtual output",
    "monitor of",
    "mixage stereo",
    "mezcla estereo",
    "mix stereo",
    "speakers (",
    "headphones (",
];

const MIC_KEYWORDS: &[&str] = &[
    "microphone",
    "mic",
    "array",
    "headset",
    "headphone mic",
    "input",
    "line in",
    "usb",
    "webcam",
];

/// Best-effort heuristic for loopback/system-output capture device names.
pub fn is_loopback_like_name(name: &str) -> bool {
    let lowered = name.trim().to_ascii_lowercase();
    LOOPBACK_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Score a device name for system-audio capture. Higher is better.
pub fn system_audio_score(name: &str) -> i32 {
    let lowered = name.trim().to_ascii_lowercase();
    let mut score = 0;
    if is_loopback_like_name(&lowered) {
        score += 10;
    }
    // Pulse/PipeWire monitors are exact copies of an output sink.
    if lowered.contains("monitor of") {
        score += 4;
    }
    if MIC_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        score -= 6;
    }
    score
}

/// Score a device name for spoken-voice capture. Higher is better.
pub fn microphone_score(name: &str) -> i32 {
    let lowered = name.trim().to_ascii_lowercase();
    let mut score = 0;
    if is_loopback_like_name(&lowered) {
        score -= 16;
    } else {
        score += 8;
    }
    if MIC_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        score += 6;
    }
    if lowered.contains("default") {
        score += 1;
    }
    score
}

fn preference_score(name: &str, preference: CapturePreference) -> i32 {
    match preference {
        CapturePreference::SystemAudio => system_audio_score(name),
        CapturePreference::Microphone => microphone_score(name),
    }
}

/// Pick an input device.
///
/// Resolution order: a device whose name contains `preferred_name`
/// (case-insensitive), then the best-scoring device for `preference`, then
/// the host default input. For [`CapturePreference::SystemAudio`] a host
/// with no loopback-like endpoint at all falls back to the default input
/// with a warning rather than failing.
pub fn choose_input_device(
    preferred_name: Option<&str>,
    preference: CapturePreference,
) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(preferred) = preferred_name {
        let needle = preferred.to_ascii_lowercase();
        match host.input_devices() {
            Ok(mut devices) => {
                let found = devices.find(|device| {
                    device
                        .name()
                        .map(|name| name.to_ascii_lowercase().contains(&needle))
                        .unwrap_or(false)
                });
                if let Some(device) = found {
                    return Ok(device);
                }
                warn!("input device matching '{preferred}' not found, falling back");
            }
            Err(e) => {
                warn!("failed to list input devices while resolving preference: {e}");
            }
        }
    }

    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let mut best: Option<(i32, Device)> = None;
    if let Ok(devices) = host.input_devices() {
        for device in devices {
            let Ok(name) = device.name() else { continue };
            let mut score = preference_score(&name, preference);
            if default_name.as_deref() == Some(name.as_str()) {
                score += 2;
            }
            if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                best = Some((score, device));
            }
        }
    }

    match best {
        Some((score, device)) => {
            if preference == CapturePreference::SystemAudio && score <= 0 {
                warn!("no loopback capture endpoint found, using the default input device");
                if let Some(default) = host.default_input_device() {
                    return Ok(default);
                }
            }
            info!(
                device = device.name().unwrap_or_default().as_str(),
                score, "input device selected"
            );
            Ok(device)
        }
        None => host
            .default_input_device()
            .ok_or(CaptionError::NoCaptureDevice),
    }
}
