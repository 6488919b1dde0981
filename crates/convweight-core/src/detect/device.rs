//! Target device resolution.
//!
//! Devices are found by asking vendor command-line tools (nvidia-smi,
//! rocm-smi, vulkaninfo, clinfo) whether a device with the requested ordinal
//! exists. The CPU is always present.

use std::process::Command;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::DeviceConfig;
use crate::error::{join_choices, ConvertError, Result};

/// Backend family of a compute device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Cuda,
    Rocm,
    Metal,
    Vulkan,
    OpenCl,
}

impl DeviceKind {
    pub const ALL: &'static [DeviceKind] = &[
        DeviceKind::Cpu,
        DeviceKind::Cuda,
        DeviceKind::Rocm,
        DeviceKind::Metal,
        DeviceKind::Vulkan,
        DeviceKind::OpenCl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Cpu => "cpu",
            DeviceKind::Cuda => "cuda",
            DeviceKind::Rocm => "rocm",
            DeviceKind::Metal => "metal",
            DeviceKind::Vulkan => "vulkan",
            DeviceKind::OpenCl => "opencl",
        }
    }

    /// Look up a kind by its `--device` name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An explicit `--device` value such as `cuda` or `vulkan:1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHint {
    pub kind: DeviceKind,
    pub ordinal: u32,
}

impl DeviceHint {
    /// Parse a `--device` value. `auto` maps to `None`.
    pub fn parse(hint: &str) -> Result<Option<Self>> {
        if hint == crate::config::AppConfig::AUTO {
            return Ok(None);
        }

        let invalid = |message: String| ConvertError::InvalidDeviceHint {
            hint: hint.to_string(),
            message,
        };

        let (kind_str, ordinal) = match hint.split_once(':') {
            Some((kind, ordinal)) => {
                let ordinal = ordinal
                    .parse::<u32>()
                    .map_err(|_| invalid(format!("device ordinal {ordinal:?} is not a number")))?;
                (kind, ordinal)
            }
            None => (hint, 0),
        };

        let kind = DeviceKind::parse(kind_str).ok_or_else(|| {
            invalid(format!(
                "choices: auto, {}",
                join_choices(DeviceKind::ALL.iter().map(|k| k.as_str()))
            ))
        })?;

        Ok(Some(Self { kind, ordinal }))
    }
}

/// A concrete device the conversion will run on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub kind: DeviceKind,
    pub ordinal: u32,
    /// Product name reported by the driver tooling, when available.
    pub name: Option<String>,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.ordinal)?;
        if let Some(name) = &self.name {
            write!(f, " ({name})")?;
        }
        Ok(())
    }
}

/// Answers whether a device exists on this machine.
pub trait DeviceProbe: Send + Sync {
    /// Return the device if `kind:ordinal` is present.
    fn probe(&self, kind: DeviceKind, ordinal: u32) -> Option<Device>;
}

/// Probe backed by the vendor tools found on `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl SystemProbe {
    pub fn new() -> Self {
        Self
    }

    /// Run a tool and return stdout on success.
    fn run_tool(program: &str, args: &[&str]) -> Option<String> {
        match Command::new(program).args(args).output() {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                debug!(
                    "{} returned non-zero: {}",
                    program,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(e) => {
                debug!("Failed to run {}: {}", program, e);
                None
            }
        }
    }

    /// Device names listed by the tool for `kind`, in ordinal order.
    fn list_devices(&self, kind: DeviceKind) -> Vec<String> {
        match kind {
            DeviceKind::Cpu => vec![cpu_name()],
            DeviceKind::Cuda => Self::run_tool(
                "nvidia-smi",
                &["--query-gpu=name", "--format=csv,noheader"],
            )
            .map(|out| parse_nvidia_smi_names(&out))
            .unwrap_or_default(),
            DeviceKind::Rocm => Self::run_tool("rocm-smi", &["--showproductname"])
                .map(|out| parse_rocm_smi_names(&out))
                .unwrap_or_default(),
            DeviceKind::Metal => {
                if cfg!(target_os = "macos") {
                    Self::run_tool("system_profiler", &["SPDisplaysDataType"])
                        .map(|out| parse_system_profiler_names(&out))
                        .unwrap_or_default()
                } else {
                    Vec::new()
                }
            }
            DeviceKind::Vulkan => Self::run_tool("vulkaninfo", &["--summary"])
                .map(|out| parse_vulkaninfo_names(&out))
                .unwrap_or_default(),
            DeviceKind::OpenCl => Self::run_tool("clinfo", &["-l"])
                .map(|out| parse_clinfo_names(&out))
                .unwrap_or_default(),
        }
    }
}

impl DeviceProbe for SystemProbe {
    fn probe(&self, kind: DeviceKind, ordinal: u32) -> Option<Device> {
        let names = self.list_devices(kind);
        debug!("Probed {}: {} device(s)", kind, names.len());
        names.into_iter().nth(ordinal as usize).map(|name| Device {
            kind,
            ordinal,
            name: Some(name),
        })
    }
}

/// Host CPU brand, as reported by sysinfo.
fn cpu_name() -> String {
    let mut system = sysinfo::System::new();
    system.refresh_cpu_all();
    system
        .cpus()
        .first()
        .map(|cpu| cpu.brand().trim().to_string())
        .filter(|brand| !brand.is_empty())
        .unwrap_or_else(|| "host cpu".to_string())
}

fn parse_nvidia_smi_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lines look like `GPU[0]		: Card series:		Navi 21`.
fn parse_rocm_smi_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|l| l.to_lowercase().contains("card series"))
        .filter_map(|l| l.rsplit(':').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lines look like `      Chipset Model: Apple M2 Pro`.
fn parse_system_profiler_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter_map(|l| l.strip_prefix("Chipset Model:"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Lines look like `	deviceName         = NVIDIA GeForce RTX 3090`.
fn parse_vulkaninfo_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("deviceName"))
        .filter_map(|l| l.split_once('='))
        .map(|(_, name)| name.trim().to_string())
        .collect()
}

/// Lines look like ` `-- Device #0: gfx1030`.
fn parse_clinfo_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|l| l.contains("Device #"))
        .filter_map(|l| l.split_once(": "))
        .map(|(_, name)| name.trim().to_string())
        .collect()
}

/// Resolve a device hint to a concrete device.
///
/// `None` probes [`DeviceConfig::AUTO_DETECT_ORDER`] at ordinal 0 and picks the
/// first present device. The CPU is never auto-selected.
pub fn detect_device(hint: Option<DeviceHint>, probe: &dyn DeviceProbe) -> Result<Device> {
    let Some(hint) = hint else {
        for kind in DeviceConfig::AUTO_DETECT_ORDER {
            if let Some(device) = probe.probe(*kind, 0) {
                info!("Using device: {}", device);
                return Ok(device);
            }
        }
        return Err(ConvertError::NoDeviceAvailable {
            probed: join_choices(DeviceConfig::AUTO_DETECT_ORDER.iter().map(|k| k.as_str())),
        });
    };

    let device = probe
        .probe(hint.kind, hint.ordinal)
        .ok_or_else(|| ConvertError::DeviceNotFound(format!("{}:{}", hint.kind, hint.ordinal)))?;
    info!("Using device: {}", device);
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(Vec<(DeviceKind, u32)>);

    impl DeviceProbe for FixedProbe {
        fn probe(&self, kind: DeviceKind, ordinal: u32) -> Option<Device> {
            self.0.contains(&(kind, ordinal)).then(|| Device {
                kind,
                ordinal,
                name: None,
            })
        }
    }

    #[test]
    fn test_parse_hint() {
        assert_eq!(DeviceHint::parse("auto").unwrap(), None);
        assert_eq!(
            DeviceHint::parse("cuda").unwrap(),
            Some(DeviceHint {
                kind: DeviceKind::Cuda,
                ordinal: 0
            })
        );
        assert_eq!(
            DeviceHint::parse("vulkan:2").unwrap(),
            Some(DeviceHint {
                kind: DeviceKind::Vulkan,
                ordinal: 2
            })
        );
    }

    #[test]
    fn test_kind_parse() {
        for kind in DeviceKind::ALL {
            assert_eq!(DeviceKind::parse(kind.as_str()), Some(*kind));
        }
        assert_eq!(DeviceKind::parse("tpu"), None);
    }

    #[test]
    fn test_parse_hint_rejects_garbage() {
        assert!(matches!(
            DeviceHint::parse("tpu").unwrap_err(),
            ConvertError::InvalidDeviceHint { .. }
        ));
        assert!(matches!(
            DeviceHint::parse("cuda:x").unwrap_err(),
            ConvertError::InvalidDeviceHint { .. }
        ));
    }

    #[test]
    fn test_auto_picks_first_in_order() {
        let probe = FixedProbe(vec![(DeviceKind::Vulkan, 0), (DeviceKind::Rocm, 0)]);
        let device = detect_device(None, &probe).unwrap();
        assert_eq!(device.kind, DeviceKind::Rocm);
    }

    #[test]
    fn test_auto_without_devices_fails() {
        let probe = FixedProbe(vec![(DeviceKind::Cpu, 0)]);
        let err = detect_device(None, &probe).unwrap_err();
        assert!(matches!(err, ConvertError::NoDeviceAvailable { .. }));
        assert!(err.to_string().contains("cuda"));
    }

    #[test]
    fn test_explicit_missing_device() {
        let probe = FixedProbe(vec![(DeviceKind::Cuda, 0)]);
        let hint = DeviceHint::parse("cuda:1").unwrap();
        let err = detect_device(hint, &probe).unwrap_err();
        assert_eq!(err.to_string(), "Device is not found on this machine: cuda:1");
    }

    #[test]
    fn test_system_probe_always_has_cpu() {
        let device = SystemProbe::new().probe(DeviceKind::Cpu, 0).unwrap();
        assert_eq!(device.kind, DeviceKind::Cpu);
        assert!(device.name.is_some());
        assert!(SystemProbe::new().probe(DeviceKind::Cpu, 1).is_none());
    }

    #[test]
    fn test_parse_tool_output() {
        assert_eq!(
            parse_nvidia_smi_names("NVIDIA A100\nNVIDIA A10\n"),
            vec!["NVIDIA A100", "NVIDIA A10"]
        );
        assert_eq!(
            parse_rocm_smi_names("GPU[0]\t\t: Card series:\t\tNavi 21\nGPU[0]\t\t: Card model:\t\t0x73bf\n"),
            vec!["Navi 21"]
        );
        assert_eq!(
            parse_vulkaninfo_names("GPU0:\n\tdeviceName         = AMD Radeon RX 6800\n"),
            vec!["AMD Radeon RX 6800"]
        );
        assert_eq!(
            parse_system_profiler_names(
                "Graphics/Displays:\n\n    Apple M2 Pro:\n\n      Chipset Model: Apple M2 Pro\n      Type: GPU\n"
            ),
            vec!["Apple M2 Pro"]
        );
        assert_eq!(
            parse_clinfo_names("Platform #0: AMD\n `-- Device #0: gfx1030\n"),
            vec!["gfx1030"]
        );
    }
}
