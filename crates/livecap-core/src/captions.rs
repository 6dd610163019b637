use std::time::Duration;

use crate::events::{CaptionReceived, Connection, Subscription};
use crate::names::NameCache;
use crate::scheduler::{Expiry, Scheduler, TimerId};
use crate::surface::RenderSurface;

/// Most captions shown at once.
pub const DEFAULT_MAX_CAPTIONS_ON_SCREEN: usize = 4;

/// How long a caption stays up without a newer one from the same stream.
pub const DEFAULT_CAPTION_TIMEOUT: Duration = Duration::from_millis(5000);

/// One line of the caption box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionEntry {
    pub stream_id: String,
    pub caption_text: String,
    pub name: String,
    timer: TimerId,
}

impl CaptionEntry {
    pub fn line(&self) -> String {
        format!("{}: {}", self.name, self.caption_text)
    }
}

/// Keeps the latest caption per speaking stream, newest first, and renders
/// them to a surface.
///
/// Each entry expires on its own timer; a new caption from the same stream
/// moves it back to the top and restarts the timer. When a new stream pushes
/// the list past capacity, the entry sitting at the capacity index is evicted.
pub struct CaptionAggregator<S, R> {
    names: NameCache,
    captions: Vec<CaptionEntry>,
    scheduler: S,
    surface: R,
    max_on_screen: usize,
    timeout: Duration,
}

impl<S: Scheduler, R: RenderSurface> CaptionAggregator<S, R> {
    pub fn new(scheduler: S, surface: R) -> Self {
        Self::with_limits(
            scheduler,
            surface,
            DEFAULT_MAX_CAPTIONS_ON_SCREEN,
            DEFAULT_CAPTION_TIMEOUT,
        )
    }

    pub fn with_limits(scheduler: S, surface: R, max_on_screen: usize, timeout: Duration) -> Self {
        Self {
            names: NameCache::new(),
            captions: Vec::new(),
            scheduler,
            surface,
            max_on_screen,
            timeout,
        }
    }

    /// Record a speaker's chosen name. Does not re-render.
    pub fn on_name_signal(&mut self, connection_id: &str, name: &str) {
        if !self.names.record_signal(connection_id, name) {
            tracing::debug!(
                "name signal from {connection_id} ignored: guest name already assigned"
            );
        }
    }

    pub fn resolve_name(&mut self, connection: &Connection) -> String {
        self.names.resolve(connection).to_string()
    }

    pub fn on_caption(&mut self, event: CaptionReceived, subscription: &Subscription) {
        let name = self.resolve_name(subscription.connection());
        let timer = self.scheduler.schedule(self.timeout, &event.stream_id);
        let entry = CaptionEntry {
            stream_id: event.stream_id,
            caption_text: event.caption,
            name,
            timer,
        };

        if self.clear_stream(&entry.stream_id).is_some() {
            tracing::debug!("caption refreshed for stream {}", entry.stream_id);
            self.captions.insert(0, entry);
            self.render();
            return;
        }

        tracing::debug!("caption added for stream {}", entry.stream_id);
        self.captions.insert(0, entry);
        if self.captions.len() > self.max_on_screen {
            let evicted = self.captions[self.max_on_screen].stream_id.clone();
            self.clear_stream(&evicted);
            tracing::debug!("caption evicted for stream {evicted}");
        }
        self.render();
    }

    /// Handle a timer firing. Returns whether an entry was removed.
    ///
    /// Firings for timers that were cancelled or replaced after being
    /// delivered are ignored.
    pub fn on_expired(&mut self, expiry: Expiry) -> bool {
        let Some(index) = self
            .captions
            .iter()
            .position(|e| e.stream_id == expiry.stream_id && e.timer == expiry.timer)
        else {
            tracing::debug!("stale expiry for stream {} ignored", expiry.stream_id);
            return false;
        };

        let entry = self.captions.remove(index);
        self.scheduler.cancel(entry.timer);
        tracing::debug!("caption expired for stream {}", entry.stream_id);
        self.render();
        true
    }

    /// Drop every caption and cancel their timers. Renders the empty box.
    pub fn clear(&mut self) {
        for entry in self.captions.drain(..) {
            self.scheduler.cancel(entry.timer);
        }
        self.render();
    }

    pub fn render(&mut self) {
        let text = self.rendered_text();
        self.surface.replace_text(&text);
    }

    pub fn rendered_text(&self) -> String {
        self.captions
            .iter()
            .map(CaptionEntry::line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn entries(&self) -> &[CaptionEntry] {
        &self.captions
    }

    pub fn names(&self) -> &NameCache {
        &self.names
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    fn clear_stream(&mut self, stream_id: &str) -> Option<CaptionEntry> {
        let index = self.captions.iter().position(|e| e.stream_id == stream_id)?;
        let entry = self.captions.remove(index);
        self.scheduler.cancel(entry.timer);
        Some(entry)
    }
}
