//! ClipForge GPU - wgpu compositing pipeline for the live preview
//!
//! Setup runs once per view: probe the host, acquire a device, configure the
//! surface, build the pipeline. The [`FrameScheduler`] then drives one
//! upload + draw + submit per display refresh until the view goes away.

pub mod context;
pub mod pipeline;
pub mod probe;
pub mod scheduler;
pub mod session;
pub mod surface;
pub mod texture;
pub mod view;

pub use context::{DeviceContext, DeviceLossSignal};
pub use pipeline::{CompositePipeline, QuadVertex, COMPOSITE_SHADER, QUAD_VERTICES};
pub use probe::{probe, AdapterInfo, CapabilityResult, GpuHost, WgpuHost};
pub use scheduler::{FrameBackend, FrameScheduler, RenderStatus, SchedulerState, TickOutcome};
pub use session::GpuSession;
pub use surface::{PresentationSurface, SurfaceOptions};
pub use texture::{TextureStreamer, VideoTexture};
pub use view::{GpuView, ProbeStatus};
