//! Frame pipeline: session lifecycle and per-frame routing.
//!
//! Three execution contexts are involved:
//!
//! ```text
//! session queue   configure / start / stop / tear down (serialized, blocking)
//! capture thread  frame → transform (inline) → post to delivery
//! delivery        callback(frame)
//! ```
//!
//! The transform and callback live in a single lock-guarded slot pair that
//! is copied once per frame, so swapping either from another thread never
//! blocks capture for longer than an `Arc` clone.

mod controller;
mod delivery;
mod handlers;
mod queue;
mod session;
mod stats;

pub use controller::{FramePipeline, PipelineError, DELIVERY_QUEUE_LABEL, SESSION_QUEUE_LABEL};
pub use delivery::{DeliveryContext, DeliveryJob, PostedDelivery};
pub use handlers::{DeliveryCallback, HandlerSlots, Handlers, Transform};
pub use queue::{QueueError, SerialQueue};
pub use session::Session;
pub use stats::{PipelineStats, StatsSnapshot};

pub(crate) use session::{SessionState, SharedSession};
