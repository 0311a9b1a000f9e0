//! Integration tests for capability probing and the view's probe status.
//!
//! Scripted hosts stand in for the platform's GPU entry points.

use clipforge_core::{ClipforgeError, Result};
use clipforge_gpu::probe::{NO_ADAPTER, NO_ENTRY_POINT};
use clipforge_gpu::{probe, AdapterInfo, DeviceLossSignal, GpuHost, GpuView, ProbeStatus};
use tokio::sync::Notify;

#[derive(Debug)]
struct FakeDevice {
    loss: DeviceLossSignal,
}

fn fake_adapter_info() -> AdapterInfo {
    AdapterInfo {
        name: "Fake Adapter".into(),
        vendor: "nvidia".into(),
        architecture: "discrete".into(),
        backend: "Vulkan".into(),
        is_fallback_adapter: false,
    }
}

struct ScriptedHost {
    entry_point: bool,
    adapter: bool,
    device: bool,
    /// When set, adapter requests wait for a notification.
    gate: Option<Notify>,
}

impl ScriptedHost {
    fn supported() -> Self {
        Self {
            entry_point: true,
            adapter: true,
            device: true,
            gate: None,
        }
    }
}

impl GpuHost for ScriptedHost {
    type Adapter = ();
    type Device = FakeDevice;

    fn has_entry_point(&self) -> bool {
        self.entry_point
    }

    async fn request_adapter(&self, power_preference: wgpu::PowerPreference) -> Option<()> {
        assert_eq!(power_preference, wgpu::PowerPreference::HighPerformance);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.adapter.then_some(())
    }

    fn adapter_info(&self, _adapter: &()) -> AdapterInfo {
        fake_adapter_info()
    }

    async fn request_device(&self, _adapter: (), loss: DeviceLossSignal) -> Result<FakeDevice> {
        if self.device {
            Ok(FakeDevice { loss })
        } else {
            Err(ClipforgeError::Gpu("out of memory".into()))
        }
    }
}

#[tokio::test]
async fn missing_entry_point_is_unsupported_with_a_reason() {
    let host = ScriptedHost {
        entry_point: false,
        ..ScriptedHost::supported()
    };
    let result = probe(&host).await;
    assert!(!result.is_supported());
    let reason = result.reason().unwrap();
    assert!(!reason.is_empty());
    assert_eq!(reason, NO_ENTRY_POINT);
}

#[tokio::test]
async fn missing_adapter_is_unsupported() {
    let host = ScriptedHost {
        adapter: false,
        ..ScriptedHost::supported()
    };
    assert_eq!(probe(&host).await.reason(), Some(NO_ADAPTER));
}

#[tokio::test]
async fn device_failure_is_reported_not_propagated() {
    let host = ScriptedHost {
        device: false,
        ..ScriptedHost::supported()
    };
    let result = probe(&host).await;
    let reason = result.reason().unwrap();
    assert!(reason.starts_with("Failed to acquire GPU device"));
    assert!(reason.contains("out of memory"));
}

#[tokio::test]
async fn supported_probe_wires_the_loss_signal() {
    let result = probe(&ScriptedHost::supported()).await;
    let clipforge_gpu::CapabilityResult::Supported {
        adapter_info,
        device,
    } = result
    else {
        panic!("expected a supported result");
    };
    assert_eq!(adapter_info, fake_adapter_info());
    assert!(!device.loss.is_lost());
    device.loss.raise("removed");
    assert_eq!(device.loss.reason().as_deref(), Some("removed"));
}

#[tokio::test]
async fn live_view_publishes_the_result() {
    let view = GpuView::new();
    assert_eq!(view.status(), ProbeStatus::Checking);

    let device = view.refresh(&ScriptedHost::supported()).await;
    assert!(device.is_some());
    assert_eq!(
        view.status(),
        ProbeStatus::Supported {
            adapter_info: fake_adapter_info()
        }
    );

    let unsupported = ScriptedHost {
        adapter: false,
        ..ScriptedHost::supported()
    };
    assert!(view.refresh(&unsupported).await.is_none());
    assert_eq!(
        view.status(),
        ProbeStatus::Unsupported {
            reason: NO_ADAPTER.into()
        }
    );
}

#[tokio::test]
async fn teardown_during_probe_publishes_nothing() {
    let host = ScriptedHost {
        gate: Some(Notify::new()),
        ..ScriptedHost::supported()
    };
    let view = GpuView::new();

    let (device, ()) = tokio::join!(view.refresh(&host), async {
        // The probe is parked on the gate by now
        view.teardown();
        if let Some(gate) = &host.gate {
            gate.notify_one();
        }
    });

    assert!(device.is_none());
    assert_eq!(view.status(), ProbeStatus::Checking);
}
