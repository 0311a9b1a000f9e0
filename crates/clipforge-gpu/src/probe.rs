//! GPU capability probing.
//!
//! [`probe`] answers one question for the hosting UI: can this environment
//! composite on the GPU, and if so, with which adapter? Every failure is
//! folded into [`CapabilityResult::Unsupported`] with a reason string; the
//! probe itself never errors.

use crate::context::{DeviceContext, DeviceLossSignal};
use clipforge_core::{ClipforgeError, Result};
use std::future::Future;
use tracing::{info, warn};

pub const NO_ENTRY_POINT: &str = "GPU acceleration not supported in this environment";
pub const NO_ADAPTER: &str = "Failed to acquire GPU adapter";

/// Informational description of the granted adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: String,
    pub architecture: String,
    pub backend: String,
    /// Software / fallback adapter (e.g. llvmpipe, WARP).
    pub is_fallback_adapter: bool,
}

impl AdapterInfo {
    pub fn from_wgpu(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            vendor: vendor_name(info.vendor),
            architecture: architecture_name(info.device_type).to_string(),
            backend: format!("{:?}", info.backend),
            is_fallback_adapter: info.device_type == wgpu::DeviceType::Cpu,
        }
    }
}

fn vendor_name(id: u32) -> String {
    match id {
        0x1002 => "amd".to_string(),
        0x106b => "apple".to_string(),
        0x10de => "nvidia".to_string(),
        0x13b5 => "arm".to_string(),
        0x5143 => "qualcomm".to_string(),
        0x8086 => "intel".to_string(),
        0 => "unknown".to_string(),
        other => format!("{other:#06x}"),
    }
}

fn architecture_name(device_type: wgpu::DeviceType) -> &'static str {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => "discrete",
        wgpu::DeviceType::IntegratedGpu => "integrated",
        wgpu::DeviceType::VirtualGpu => "virtual",
        wgpu::DeviceType::Cpu => "cpu",
        wgpu::DeviceType::Other => "other",
    }
}

/// Outcome of a capability probe.
#[derive(Debug)]
pub enum CapabilityResult<D = DeviceContext> {
    Unsupported { reason: String },
    Supported { adapter_info: AdapterInfo, device: D },
}

impl<D> CapabilityResult<D> {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported {
            reason: reason.into(),
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported { .. })
    }

    /// Reason string when unsupported.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Unsupported { reason } => Some(reason),
            Self::Supported { .. } => None,
        }
    }
}

/// The host environment's GPU entry points.
///
/// Implemented over `wgpu::Instance` by [`WgpuHost`]; tests substitute
/// scripted hosts.
pub trait GpuHost {
    type Adapter;
    type Device;

    /// Whether the host exposes any GPU acceleration API at all.
    fn has_entry_point(&self) -> bool;

    fn request_adapter(
        &self,
        power_preference: wgpu::PowerPreference,
    ) -> impl Future<Output = Option<Self::Adapter>>;

    fn adapter_info(&self, adapter: &Self::Adapter) -> AdapterInfo;

    /// Acquire a logical device and register `loss` as its device-loss listener.
    fn request_device(
        &self,
        adapter: Self::Adapter,
        loss: DeviceLossSignal,
    ) -> impl Future<Output = Result<Self::Device>>;
}

/// Probe `host` for GPU acceleration.
///
/// A failed device request after a granted adapter is reported as
/// `Unsupported` rather than propagated.
pub async fn probe<H: GpuHost>(host: &H) -> CapabilityResult<H::Device> {
    if !host.has_entry_point() {
        warn!("{}", NO_ENTRY_POINT);
        return CapabilityResult::unsupported(NO_ENTRY_POINT);
    }

    let Some(adapter) = host
        .request_adapter(wgpu::PowerPreference::HighPerformance)
        .await
    else {
        warn!("{}", NO_ADAPTER);
        return CapabilityResult::unsupported(NO_ADAPTER);
    };

    let adapter_info = host.adapter_info(&adapter);
    info!(
        name = %adapter_info.name,
        vendor = %adapter_info.vendor,
        backend = %adapter_info.backend,
        "GPU adapter granted"
    );

    match host.request_device(adapter, DeviceLossSignal::new()).await {
        Ok(device) => CapabilityResult::Supported {
            adapter_info,
            device,
        },
        Err(e) => {
            warn!("Device request failed: {}", e);
            CapabilityResult::unsupported(format!("Failed to acquire GPU device: {e}"))
        }
    }
}

/// [`GpuHost`] backed by a `wgpu::Instance`.
///
/// With no backends enabled there is no instance, which is how an
/// environment without a GPU entry point is represented.
pub struct WgpuHost {
    instance: Option<wgpu::Instance>,
}

impl WgpuHost {
    /// Create a host over the platform's preferred backends.
    pub fn new() -> Self {
        // Prefer Metal on macOS, Vulkan/DX12 elsewhere, WebGPU in the browser
        #[cfg(target_os = "macos")]
        let backends = wgpu::Backends::METAL;
        #[cfg(target_arch = "wasm32")]
        let backends = wgpu::Backends::BROWSER_WEBGPU;
        #[cfg(not(any(target_os = "macos", target_arch = "wasm32")))]
        let backends = wgpu::Backends::VULKAN | wgpu::Backends::DX12;

        Self::with_backends(backends)
    }

    pub fn with_backends(backends: wgpu::Backends) -> Self {
        let instance = (!backends.is_empty()).then(|| {
            wgpu::Instance::new(wgpu::InstanceDescriptor {
                backends,
                ..Default::default()
            })
        });
        Self { instance }
    }

    /// Create a presentable surface for a window.
    pub fn create_surface(
        &self,
        target: impl Into<wgpu::SurfaceTarget<'static>>,
    ) -> Result<wgpu::Surface<'static>> {
        let instance = self
            .instance
            .as_ref()
            .ok_or_else(|| ClipforgeError::Surface(NO_ENTRY_POINT.to_string()))?;
        instance
            .create_surface(target)
            .map_err(|e| ClipforgeError::Surface(format!("Failed to create surface: {e}")))
    }
}

impl Default for WgpuHost {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuHost for WgpuHost {
    type Adapter = wgpu::Adapter;
    type Device = DeviceContext;

    fn has_entry_point(&self) -> bool {
        self.instance.is_some()
    }

    async fn request_adapter(
        &self,
        power_preference: wgpu::PowerPreference,
    ) -> Option<wgpu::Adapter> {
        self.instance
            .as_ref()?
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
    }

    fn adapter_info(&self, adapter: &wgpu::Adapter) -> AdapterInfo {
        AdapterInfo::from_wgpu(&adapter.get_info())
    }

    async fn request_device(
        &self,
        adapter: wgpu::Adapter,
        loss: DeviceLossSignal,
    ) -> Result<DeviceContext> {
        DeviceContext::acquire(adapter, loss).await
    }
}
