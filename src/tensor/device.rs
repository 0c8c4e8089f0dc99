//! # Device Placement
//!
//! Represents where tensor data lives. The backend in this crate computes
//! on the CPU; `Device::best_available` is the single place that polls for
//! an accelerator so that callers pick placement the same way everywhere.

use serde::{Deserialize, Serialize};

/// Represents the device where the tensor data resides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda(usize),
}

impl Device {
    /// Returns the number of accelerators this backend can compute on.
    pub fn cuda_device_count() -> usize {
        0
    }

    pub fn cuda_is_available() -> bool {
        Self::cuda_device_count() > 0
    }

    /// Picks the first accelerator if one is available, the CPU otherwise.
    pub fn best_available() -> Self {
        if Self::cuda_is_available() {
            Device::Cuda(0)
        } else {
            Device::Cpu
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_backend_falls_back_to_cpu() {
        assert!(!Device::cuda_is_available());
        assert_eq!(Device::best_available(), Device::Cpu);
    }

    #[test]
    fn display_matches_torch_style_names() {
        assert_eq!(Device::Cpu.to_string(), "cpu");
        assert_eq!(Device::Cuda(1).to_string(), "cuda:1");
    }
}
