//! GPU device context management.

use clipforge_core::{ClipforgeError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Raised once when the device becomes unusable.
///
/// The device-loss callback fires on whatever thread wgpu chooses; the frame
/// loop polls this signal at the start of every iteration.
#[derive(Debug, Clone, Default)]
pub struct DeviceLossSignal(Arc<Mutex<Option<String>>>);

impl DeviceLossSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a loss. Only the first reason is kept.
    pub fn raise(&self, reason: impl Into<String>) {
        let mut slot = self.0.lock();
        if slot.is_none() {
            *slot = Some(reason.into());
        }
    }

    pub fn is_lost(&self) -> bool {
        self.0.lock().is_some()
    }

    pub fn reason(&self) -> Option<String> {
        self.0.lock().clone()
    }
}

/// GPU context holding adapter, device and queue for one view.
///
/// Dropping the context destroys the device.
pub struct DeviceContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    loss: DeviceLossSignal,
}

impl DeviceContext {
    /// Request a device from `adapter` and wire its loss and error callbacks.
    pub async fn acquire(adapter: wgpu::Adapter, loss: DeviceLossSignal) -> Result<Self> {
        // Downlevel defaults keep GL/older adapters usable; raise the texture
        // limits to whatever the adapter supports so 4K frames fit.
        let required_limits =
            wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("ClipForge Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| ClipforgeError::Gpu(format!("Failed to create device: {}", e)))?;

        let signal = loss.clone();
        device.set_device_lost_callback(move |reason, message| match reason {
            wgpu::DeviceLostReason::Destroyed => {
                debug!("GPU device destroyed: {}", message);
            }
            other => {
                error!("GPU device lost ({:?}): {}", other, message);
                signal.raise(format!("{other:?}: {message}"));
            }
        });

        // The default handler panics; log instead so a bad frame cannot take
        // the whole window down.
        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            error!("Uncaptured wgpu error: {}", err);
        }));

        info!("GPU device ready");

        Ok(Self {
            adapter,
            device,
            queue,
            loss,
        })
    }

    /// Why the device was lost, if it was.
    pub fn lost_reason(&self) -> Option<String> {
        self.loss.reason()
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        debug!("Releasing GPU device");
        self.device.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_signal_keeps_first_reason() {
        let signal = DeviceLossSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_lost());

        signal.raise("driver reset");
        signal.raise("second");
        assert!(observer.is_lost());
        assert_eq!(observer.reason().as_deref(), Some("driver reset"));
    }
}
