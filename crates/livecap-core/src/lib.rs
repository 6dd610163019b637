//! Live captions core.
//!
//! Aggregates per-stream caption events from a video session into a short,
//! self-expiring list of "who said what", rendered as plain text.
//! Pure Rust, no SDK dependencies: the SDK binding layer feeds a
//! [`LiveSession`] through a [`SessionSender`].

pub mod captions;
pub mod errors;
pub mod events;
pub mod names;
pub mod roster;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod surface;

pub use captions::{
    CaptionAggregator, CaptionEntry, DEFAULT_CAPTION_TIMEOUT, DEFAULT_MAX_CAPTIONS_ON_SCREEN,
};
pub use errors::LivecapError;
pub use events::{
    CaptionReceived, Connection, EventEmitter, SessionEvent, SessionEventListener, Signal, Stream,
    Subscription,
};
pub use names::{NameCache, guest_name};
pub use roster::SessionRoster;
pub use scheduler::{Expiry, ManualScheduler, Scheduler, TimerId, TokioScheduler};
pub use session::{LiveSession, SessionInput, SessionSender};
pub use settings::{Settings, SettingsStore};
pub use surface::{EmittingSurface, RenderSurface, TextSurface};
