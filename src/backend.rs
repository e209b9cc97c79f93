use std::str::FromStr;

/// Execution backend selector.
///
/// Picks where tensors live and nothing else: the pipeline behaves
/// identically on every target. Each target is only available when the
/// crate feature of the same name was compiled in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceTarget {
    /// CPU through the ndarray backend.
    #[default]
    Cpu,
    /// Portable GPU through wgpu.
    Wgpu,
    /// NVIDIA GPU through CUDA.
    Cuda,
}

impl DeviceTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Wgpu => "wgpu",
            Self::Cuda => "cuda",
        }
    }
}

impl FromStr for DeviceTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "wgpu" | "gpu" => Ok(Self::Wgpu),
            "cuda" => Ok(Self::Cuda),
            other => Err(format!(
                "unknown device target `{other}`, expected one of: cpu, wgpu, cuda"
            )),
        }
    }
}
