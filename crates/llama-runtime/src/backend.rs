//! Backend selection and GPU offload for model loading.
//!
//! Provides:
//! - [`Backend`] enum, GPU variants gated by cargo features (`cuda`, `vulkan`, `metal`)
//! - [`BackendSelector`]: picks the best available backend at startup and turns
//!   it into a GPU layer count for the loader

use std::fmt;
use std::str::FromStr;

/// Layer count that asks llama.cpp to offload every layer.
pub const OFFLOAD_ALL_LAYERS: u32 = 999;

/// Compute backend for inference.
///
/// `Cpu` is always compiled; GPU variants only exist when the matching cargo
/// feature is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Cpu,
    #[cfg(feature = "cuda")]
    Cuda,
    #[cfg(feature = "vulkan")]
    Vulkan,
    #[cfg(feature = "metal")]
    Metal,
}

impl Backend {
    /// All backends enabled at compile time, most preferred first.
    pub fn compiled() -> &'static [Backend] {
        &[
            #[cfg(feature = "metal")]
            Backend::Metal,
            #[cfg(feature = "cuda")]
            Backend::Cuda,
            #[cfg(feature = "vulkan")]
            Backend::Vulkan,
            Backend::Cpu,
        ]
    }

    pub fn is_gpu(&self) -> bool {
        !matches!(self, Backend::Cpu)
    }

    /// Best-effort probe for a usable device.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Cpu => true,
            #[cfg(feature = "cuda")]
            Backend::Cuda => {
                std::path::Path::new("/dev/nvidia0").exists()
                    || std::path::Path::new("/dev/nvidiactl").exists()
                    || cfg!(target_os = "windows")
            }
            #[cfg(feature = "vulkan")]
            Backend::Vulkan => true,
            #[cfg(feature = "metal")]
            Backend::Metal => cfg!(target_os = "macos"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Cpu => "cpu",
            #[cfg(feature = "cuda")]
            Backend::Cuda => "cuda",
            #[cfg(feature = "vulkan")]
            Backend::Vulkan => "vulkan",
            #[cfg(feature = "metal")]
            Backend::Metal => "metal",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Backend::compiled()
            .iter()
            .copied()
            .find(|b| b.as_str() == name)
            .ok_or_else(|| match name.as_str() {
                "cuda" | "vulkan" | "metal" => BackendError::NotCompiled(name),
                _ => BackendError::Unknown(name),
            })
    }
}

/// Errors from backend selection.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend {0} not compiled (missing cargo feature)")]
    NotCompiled(String),
    #[error("unknown backend {0:?} (expected cpu, cuda, vulkan or metal)")]
    Unknown(String),
    #[error("backend {0} has no usable device")]
    Unavailable(Backend),
}

/// Selects the active backend and the GPU offload that goes with it.
///
/// Use [`BackendSelector::auto`] for best-backend detection, or
/// [`BackendSelector::with_backend`] to force one.
#[derive(Debug, Clone)]
pub struct BackendSelector {
    active: Backend,
    gpu_layers: u32,
}

impl BackendSelector {
    /// Pick the first compiled backend with a usable device.
    ///
    /// Preference order: Metal > CUDA > Vulkan > CPU.
    pub fn auto() -> Self {
        let active = Backend::compiled()
            .iter()
            .copied()
            .find(Backend::is_available)
            .unwrap_or(Backend::Cpu);
        Self::for_backend(active)
    }

    /// Force a specific backend. Fails if no device is usable.
    pub fn with_backend(backend: Backend) -> Result<Self, BackendError> {
        if !backend.is_available() {
            return Err(BackendError::Unavailable(backend));
        }
        Ok(Self::for_backend(backend))
    }

    /// Resolve an optional backend name and layer override from configuration.
    pub fn from_config(backend: Option<&str>, gpu_layers: Option<u32>) -> Result<Self, BackendError> {
        let selector = match backend {
            None => Self::auto(),
            Some(name) if name.eq_ignore_ascii_case("auto") => Self::auto(),
            Some(name) => Self::with_backend(name.parse()?)?,
        };
        Ok(match gpu_layers {
            Some(layers) => selector.with_gpu_layers(layers),
            None => selector,
        })
    }

    /// Override the number of offloaded layers (ignored on CPU).
    pub fn with_gpu_layers(mut self, layers: u32) -> Self {
        if self.active.is_gpu() {
            self.gpu_layers = layers;
        }
        self
    }

    /// The currently active backend.
    pub fn active(&self) -> Backend {
        self.active
    }

    /// Layers to offload when loading the model.
    pub fn gpu_layers(&self) -> u32 {
        self.gpu_layers
    }

    fn for_backend(active: Backend) -> Self {
        let gpu_layers = if active.is_gpu() { OFFLOAD_ALL_LAYERS } else { 0 };
        Self { active, gpu_layers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_compiled_includes_cpu() {
        assert!(Backend::compiled().contains(&Backend::Cpu));
        assert_eq!(Backend::compiled().last(), Some(&Backend::Cpu));
    }

    #[test]
    fn cpu_is_always_available() {
        assert!(Backend::Cpu.is_available());
        assert!(!Backend::Cpu.is_gpu());
    }

    #[test]
    fn backend_selector_auto_picks_compiled_backend() {
        let selector = BackendSelector::auto();
        assert!(Backend::compiled().contains(&selector.active()));
    }

    #[test]
    fn cpu_offloads_nothing() {
        let selector = BackendSelector::with_backend(Backend::Cpu).unwrap();
        assert_eq!(selector.active(), Backend::Cpu);
        assert_eq!(selector.gpu_layers(), 0);
        assert_eq!(selector.with_gpu_layers(12).gpu_layers(), 0);
    }

    #[test]
    fn parse_backend_names() {
        assert_eq!("CPU".parse::<Backend>().unwrap(), Backend::Cpu);
        assert!(matches!("tpu".parse::<Backend>(), Err(BackendError::Unknown(_))));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn parse_uncompiled_backend() {
        assert!(matches!("cuda".parse::<Backend>(), Err(BackendError::NotCompiled(_))));
    }

    #[test]
    fn from_config_defaults_to_auto() {
        let selector = BackendSelector::from_config(None, None).unwrap();
        assert_eq!(selector.active(), BackendSelector::auto().active());
        let selector = BackendSelector::from_config(Some("auto"), None).unwrap();
        assert_eq!(selector.active(), BackendSelector::auto().active());
    }

    #[test]
    fn from_config_forces_cpu() {
        let selector = BackendSelector::from_config(Some("cpu"), Some(40)).unwrap();
        assert_eq!(selector.active(), Backend::Cpu);
        assert_eq!(selector.gpu_layers(), 0);
    }

    #[test]
    fn backend_display() {
        assert_eq!(format!("{}", Backend::Cpu), "cpu");
    }
}
