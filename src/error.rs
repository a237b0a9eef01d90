// --- File: error.rs ---
// Error types for solver and renderer construction.
//
// Both are only produced at creation time. Once built, a solver never fails a tick.

use std::collections::TryReserveError;
use std::fmt;

/// Reasons a [`crate::MicrobeSolver`] cannot be created.
#[derive(Debug)]
pub enum SolverError {
    /// `max_organisms` was zero.
    ZeroCapacity,
    /// Capacity-derived element counts or byte sizes overflowed `usize`.
    CapacityOverflow,
    /// The largest working buffer exceeds the configured per-buffer limit.
    BufferTooLarge { requested: u64, limit: u64 },
    /// Particle indices would not fit the grid's signed 32-bit links.
    IndexSpaceExceeded(usize),
    /// Pre-sizing a store failed.
    Allocation(TryReserveError),
    /// The worker pool could not be started.
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ZeroCapacity => write!(f, "solver capacity must be at least one organism"),
            Self::CapacityOverflow => write!(f, "capacity-derived buffer size overflows"),
            Self::BufferTooLarge { requested, limit } => {
                write!(f, "buffer of {requested} bytes exceeds limit of {limit} bytes")
            }
            Self::IndexSpaceExceeded(count) => {
                write!(f, "{count} particles exceed the grid index space")
            }
            Self::Allocation(err) => write!(f, "allocation failed: {err}"),
            Self::ThreadPool(err) => write!(f, "worker pool unavailable: {err}"),
        }
    }
}

impl std::error::Error for SolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Allocation(err) => Some(err),
            Self::ThreadPool(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TryReserveError> for SolverError {
    fn from(err: TryReserveError) -> Self {
        Self::Allocation(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for SolverError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(err)
    }
}

/// Reasons the GPU renderer cannot be created.
#[derive(Debug)]
pub enum RendererError {
    /// No adapter matched the surface.
    NoAdapter,
    /// Only a software rasterizer is available.
    SoftwareAdapter(String),
    /// The adapter lacks a capability the metaball passes rely on.
    MissingCapability(&'static str),
    /// The splat buffer for the solver's capacity does not fit the device.
    BufferLimit { requested: u64, limit: u64 },
    Surface(wgpu::CreateSurfaceError),
    Device(wgpu::RequestDeviceError),
}

impl fmt::Display for RendererError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NoAdapter => write!(f, "no suitable GPU adapter found"),
            Self::SoftwareAdapter(name) => {
                write!(f, "refusing software adapter '{name}'")
            }
            Self::MissingCapability(what) => write!(f, "adapter lacks {what}"),
            Self::BufferLimit { requested, limit } => {
                write!(f, "splat buffer of {requested} bytes exceeds device limit of {limit}")
            }
            Self::Surface(err) => write!(f, "surface creation failed: {err}"),
            Self::Device(err) => write!(f, "device request failed: {err}"),
        }
    }
}

impl std::error::Error for RendererError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Surface(err) => Some(err),
            Self::Device(err) => Some(err),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for RendererError {
    fn from(err: wgpu::CreateSurfaceError) -> Self {
        Self::Surface(err)
    }
}

impl From<wgpu::RequestDeviceError> for RendererError {
    fn from(err: wgpu::RequestDeviceError) -> Self {
        Self::Device(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_mention_sizes() {
        let err = SolverError::BufferTooLarge {
            requested: 4096,
            limit: 1024,
        };
        let text = err.to_string();
        assert!(text.contains("4096") && text.contains("1024"), "{text}");
        assert!(std::error::Error::source(&err).is_none());
    }
}
