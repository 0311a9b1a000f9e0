//! Capability status for the hosting view.
//!
//! A view shows "checking" while the probe runs, then either the adapter it
//! got or the reason it could not get one. The probe may finish after the
//! view has been torn down; its result is then thrown away.

use crate::probe::{probe, AdapterInfo, CapabilityResult, GpuHost};
use clipforge_core::CancelToken;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What the view currently displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Checking,
    Unsupported { reason: String },
    Supported { adapter_info: AdapterInfo },
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checking => write!(f, "Checking GPU support..."),
            Self::Unsupported { reason } => write!(f, "GPU acceleration unavailable: {reason}"),
            Self::Supported { adapter_info } => {
                writeln!(f, "GPU acceleration supported")?;
                writeln!(f, "  Adapter:      {}", adapter_info.name)?;
                writeln!(f, "  Vendor:       {}", adapter_info.vendor)?;
                writeln!(f, "  Architecture: {}", adapter_info.architecture)?;
                writeln!(f, "  Backend:      {}", adapter_info.backend)?;
                write!(
                    f,
                    "  Fallback:     {}",
                    if adapter_info.is_fallback_adapter {
                        "Yes"
                    } else {
                        "No"
                    }
                )
            }
        }
    }
}

/// Probe status owned by one view, guarded by the view's liveness token.
#[derive(Debug, Clone)]
pub struct GpuView {
    status: Arc<Mutex<ProbeStatus>>,
    liveness: CancelToken,
}

impl GpuView {
    pub fn new() -> Self {
        Self {
            status: Arc::new(Mutex::new(ProbeStatus::Checking)),
            liveness: CancelToken::new(),
        }
    }

    pub fn status(&self) -> ProbeStatus {
        self.status.lock().clone()
    }

    /// Token cancelled by [`teardown`](Self::teardown).
    pub fn liveness(&self) -> &CancelToken {
        &self.liveness
    }

    /// Mark the view as gone. Pending probes will discard their results.
    ///
    /// Waits out a publish already holding the status.
    pub fn teardown(&self) {
        let _status = self.status.lock();
        self.liveness.cancel();
    }

    /// Run a probe and publish its result.
    ///
    /// Returns the device when supported and the view is still live. If the
    /// view was torn down while the probe was in flight, nothing is published
    /// and the device is dropped.
    pub async fn refresh<H: GpuHost>(&self, host: &H) -> Option<H::Device> {
        {
            let mut status = self.status.lock();
            if self.liveness.is_live() {
                *status = ProbeStatus::Checking;
            }
        }

        let result = probe(host).await;
        self.publish(result)
    }

    /// Store `result` unless the view is gone. The liveness check happens
    /// under the status lock so a concurrent teardown cannot slip in between.
    fn publish<D>(&self, result: CapabilityResult<D>) -> Option<D> {
        let mut status = self.status.lock();
        if self.liveness.is_cancelled() {
            debug!("View torn down during probe, discarding result");
            return None;
        }

        match result {
            CapabilityResult::Unsupported { reason } => {
                *status = ProbeStatus::Unsupported { reason };
                None
            }
            CapabilityResult::Supported {
                adapter_info,
                device,
            } => {
                *status = ProbeStatus::Supported { adapter_info };
                Some(device)
            }
        }
    }

    /// Blocking [`refresh`](Self::refresh) for synchronous hosts.
    pub fn refresh_blocking<H: GpuHost>(&self, host: &H) -> Option<H::Device> {
        pollster::block_on(self.refresh(host))
    }
}

impl Default for GpuView {
    fn default() -> Self {
        Self::new()
    }
}
