use std::sync::{Arc, RwLock};

use crate::events::{EventEmitter, SessionEvent};

/// The on-screen caption box. Every render replaces its whole text.
pub trait RenderSurface {
    fn replace_text(&mut self, text: &str);
}

/// Shared text buffer. Clones read and write the same content.
#[derive(Debug, Clone, Default)]
pub struct TextSurface {
    text: Arc<RwLock<String>>,
}

impl TextSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.text.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }
}

impl RenderSurface for TextSurface {
    fn replace_text(&mut self, text: &str) {
        let mut current = self.text.write().unwrap_or_else(|e| e.into_inner());
        current.clear();
        current.push_str(text);
    }
}

/// Forwards renders to an inner surface and announces them to session listeners.
pub struct EmittingSurface<R> {
    inner: R,
    emitter: EventEmitter,
}

impl<R: RenderSurface> EmittingSurface<R> {
    pub fn new(inner: R, emitter: EventEmitter) -> Self {
        Self { inner, emitter }
    }
}

impl<R: RenderSurface> RenderSurface for EmittingSurface<R> {
    fn replace_text(&mut self, text: &str) {
        self.inner.replace_text(text);
        self.emitter.emit(SessionEvent::CaptionsRendered(text.to_string()));
    }
}
