// SPDX-License-Identifier: AGPL-3.0-only

//! GPU adapter discovery and selection.
//!
//! Selection runs on [`AdapterInfo`] summaries so the policy is testable
//! without hardware; only the final pick touches the live adapter list.

use crate::error::RigidError;

/// Adapter selector: index, name substring, or `auto`.
pub const ADAPTER_ENV: &str = "HOTSPRING_GPU_ADAPTER";
/// Backend restriction: `vulkan`, `metal`, `dx12`.
pub const BACKEND_ENV: &str = "HOTSPRING_WGPU_BACKEND";

/// Summary of a discovered GPU adapter.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    /// Enumeration index (stable within a single run).
    pub index: usize,
    pub name: String,
    /// Driver name (e.g. `"NVIDIA"`, `"NVK"`, `"radv"`).
    pub driver: String,
    pub has_f64: bool,
    pub device_type: wgpu::DeviceType,
}

impl AdapterInfo {
    fn describe(index: usize, adapter: &wgpu::Adapter) -> Self {
        let info = adapter.get_info();
        let features = adapter.features();
        Self {
            index,
            name: info.name,
            driver: info.driver,
            has_f64: features.contains(wgpu::Features::SHADER_F64),
            device_type: info.device_type,
        }
    }
}

impl std::fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let precision = if self.has_f64 { "f64" } else { "f32" };
        let kind = match self.device_type {
            wgpu::DeviceType::DiscreteGpu => "discrete",
            wgpu::DeviceType::IntegratedGpu => "integrated",
            wgpu::DeviceType::VirtualGpu => "virtual",
            wgpu::DeviceType::Cpu => "cpu",
            wgpu::DeviceType::Other => "other",
        };
        write!(
            f,
            "[{}] {} ({}, {kind}, {precision})",
            self.index, self.name, self.driver
        )
    }
}

/// Parsed value of [`ADAPTER_ENV`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterSelector {
    /// First discrete adapter with `SHADER_F64`, else any with `SHADER_F64`.
    Auto,
    /// Enumeration index; out-of-range values fall back to a name match on
    /// the digits (so `"4070"` still finds an RTX 4070).
    Index(usize),
    /// Case-insensitive name substring.
    Name(String),
}

impl AdapterSelector {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim().to_lowercase();
        if s.is_empty() || s == "auto" {
            Self::Auto
        } else if let Ok(idx) = s.parse::<usize>() {
            Self::Index(idx)
        } else {
            Self::Name(s)
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(&std::env::var(ADAPTER_ENV).unwrap_or_default())
    }

    /// Position in `candidates` this selector picks.
    ///
    /// # Errors
    ///
    /// [`RigidError::NoAdapter`] when nothing qualifies under `Auto` or the
    /// list is empty; [`RigidError::DeviceCreation`] when a name matches
    /// nothing.
    pub fn choose(&self, candidates: &[AdapterInfo]) -> Result<usize, RigidError> {
        if candidates.is_empty() {
            return Err(RigidError::NoAdapter);
        }
        let by_name = |needle: &str| {
            candidates
                .iter()
                .position(|c| c.name.to_lowercase().contains(needle))
                .ok_or_else(|| {
                    RigidError::DeviceCreation(format!("No adapter matching '{needle}'"))
                })
        };
        match self {
            Self::Auto => candidates
                .iter()
                .position(|c| c.has_f64 && c.device_type == wgpu::DeviceType::DiscreteGpu)
                .or_else(|| candidates.iter().position(|c| c.has_f64))
                .ok_or(RigidError::NoAdapter),
            Self::Index(idx) if *idx < candidates.len() => Ok(*idx),
            Self::Index(idx) => by_name(&idx.to_string()),
            Self::Name(needle) => by_name(needle),
        }
    }
}

fn backends_from(value: Option<&str>) -> wgpu::Backends {
    match value {
        Some("vulkan") => wgpu::Backends::VULKAN,
        Some("metal") => wgpu::Backends::METAL,
        Some("dx12") => wgpu::Backends::DX12,
        _ => wgpu::Backends::all(),
    }
}

fn create_instance() -> wgpu::Instance {
    let backends = backends_from(std::env::var(BACKEND_ENV).ok().as_deref());
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    })
}

/// Summaries of every adapter the configured backends expose.
#[must_use]
pub fn enumerate_adapters() -> Vec<AdapterInfo> {
    create_instance()
        .enumerate_adapters(wgpu::Backends::all())
        .iter()
        .enumerate()
        .map(|(i, a)| AdapterInfo::describe(i, a))
        .collect()
}

/// Adapter picked by [`ADAPTER_ENV`] (auto-detect when unset).
///
/// # Errors
///
/// As [`AdapterSelector::choose`].
pub fn select_adapter() -> Result<wgpu::Adapter, RigidError> {
    let mut adapters = create_instance().enumerate_adapters(wgpu::Backends::all());
    let infos: Vec<AdapterInfo> = adapters
        .iter()
        .enumerate()
        .map(|(i, a)| AdapterInfo::describe(i, a))
        .collect();
    let idx = AdapterSelector::from_env().choose(&infos)?;
    Ok(adapters.swap_remove(idx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(index: usize, name: &str, has_f64: bool, device_type: wgpu::DeviceType) -> AdapterInfo {
        AdapterInfo {
            index,
            name: name.into(),
            driver: "test".into(),
            has_f64,
            device_type,
        }
    }

    fn rig() -> Vec<AdapterInfo> {
        vec![
            info(0, "llvmpipe", true, wgpu::DeviceType::Cpu),
            info(1, "Intel UHD 770", false, wgpu::DeviceType::IntegratedGpu),
            info(2, "NVIDIA GeForce RTX 4070", true, wgpu::DeviceType::DiscreteGpu),
        ]
    }

    #[test]
    fn selector_parsing() {
        assert_eq!(AdapterSelector::parse(""), AdapterSelector::Auto);
        assert_eq!(AdapterSelector::parse(" AUTO "), AdapterSelector::Auto);
        assert_eq!(AdapterSelector::parse("1"), AdapterSelector::Index(1));
        assert_eq!(
            AdapterSelector::parse("Titan"),
            AdapterSelector::Name("titan".into())
        );
    }

    #[test]
    fn auto_prefers_discrete_f64() {
        assert_eq!(AdapterSelector::Auto.choose(&rig()).expect("pick"), 2);
        let no_discrete = &rig()[..2];
        assert_eq!(AdapterSelector::Auto.choose(no_discrete).expect("pick"), 0);
        let no_f64 = &rig()[1..2];
        assert!(matches!(
            AdapterSelector::Auto.choose(no_f64),
            Err(RigidError::NoAdapter)
        ));
    }

    #[test]
    fn index_then_digit_name_fallback() {
        assert_eq!(AdapterSelector::Index(1).choose(&rig()).expect("pick"), 1);
        assert_eq!(AdapterSelector::Index(4070).choose(&rig()).expect("pick"), 2);
        assert!(AdapterSelector::Index(9).choose(&rig()).is_err());
    }

    #[test]
    fn name_match_is_case_insensitive() {
        let sel = AdapterSelector::parse("intel");
        assert_eq!(sel.choose(&rig()).expect("pick"), 1);
        assert!(matches!(
            AdapterSelector::parse("radeon").choose(&rig()),
            Err(RigidError::DeviceCreation(_))
        ));
        assert!(matches!(
            AdapterSelector::Auto.choose(&[]),
            Err(RigidError::NoAdapter)
        ));
    }

    #[test]
    fn backend_names_map_to_single_backends() {
        assert_eq!(backends_from(Some("vulkan")), wgpu::Backends::VULKAN);
        assert_eq!(backends_from(Some("metal")), wgpu::Backends::METAL);
        assert_eq!(backends_from(Some("dx12")), wgpu::Backends::DX12);
        assert_eq!(backends_from(Some("opengl")), wgpu::Backends::all());
        assert_eq!(backends_from(None), wgpu::Backends::all());
    }

    #[test]
    fn adapter_info_display_tags_precision() {
        let a = info(2, "Test GPU", true, wgpu::DeviceType::DiscreteGpu);
        assert_eq!(a.to_string(), "[2] Test GPU (test, discrete, f64)");
    }
}
