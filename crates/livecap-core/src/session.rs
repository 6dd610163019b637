use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::captions::CaptionAggregator;
use crate::errors::LivecapError;
use crate::events::{
    CaptionReceived, Connection, EventEmitter, SessionEvent, SessionEventListener, Signal, Stream,
    Subscription,
};
use crate::names::NAME_SIGNAL_TYPE;
use crate::roster::SessionRoster;
use crate::scheduler::{Expiry, TokioScheduler};
use crate::settings::Settings;
use crate::surface::{EmittingSurface, RenderSurface};

/// Events pushed into a live session by the SDK binding layer.
#[derive(Debug, Clone)]
pub enum SessionInput {
    Signal(Signal),
    CaptionsReceived {
        event: CaptionReceived,
        subscription: Subscription,
    },
    ConnectionCreated(Connection),
    ConnectionDestroyed(String),
    StreamCreated(Stream),
    StreamDestroyed(String),
    Disconnected,
    SetCaptionsEnabled(bool),
}

enum Command {
    Input(SessionInput),
    Dispose,
}

/// Cloneable handle for delivering SDK events to a session.
#[derive(Clone)]
pub struct SessionSender {
    tx: mpsc::UnboundedSender<Command>,
    closed: Arc<AtomicBool>,
}

impl SessionSender {
    /// Queue an input for the session loop.
    ///
    /// Fails with `SessionClosed` once the session has started closing.
    pub fn send(&self, input: SessionInput) -> Result<(), LivecapError> {
        if self.is_closed() {
            return Err(LivecapError::SessionClosed);
        }
        self.tx
            .send(Command::Input(input))
            .map_err(|_| LivecapError::SessionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn signal(&self, signal: Signal) -> Result<(), LivecapError> {
        self.send(SessionInput::Signal(signal))
    }

    pub fn captions_received(
        &self,
        event: CaptionReceived,
        subscription: Subscription,
    ) -> Result<(), LivecapError> {
        self.send(SessionInput::CaptionsReceived { event, subscription })
    }
}

type SessionAggregator<R> = CaptionAggregator<TokioScheduler, EmittingSurface<R>>;

/// A connected session's caption state and event loop.
///
/// All caption, signal and timer events are handled one at a time on a
/// single task, which owns the aggregator outright.
pub struct LiveSession {
    sender: SessionSender,
    emitter: EventEmitter,
    roster: Arc<Mutex<SessionRoster>>,
    task: JoinHandle<()>,
}

impl LiveSession {
    /// Start a session rendering captions to `surface`. Must be called within a tokio runtime.
    pub fn init<R>(settings: &Settings, surface: R) -> Self
    where
        R: RenderSurface + Send + 'static,
    {
        let emitter = EventEmitter::new();
        let roster = Arc::new(Mutex::new(SessionRoster::new()));
        let (tx, commands) = mpsc::unbounded_channel();
        let (scheduler, expiries) = TokioScheduler::new();

        let aggregator = CaptionAggregator::with_limits(
            scheduler,
            EmittingSurface::new(surface, emitter.clone()),
            settings.max_captions_on_screen.max(1),
            settings.caption_timeout(),
        );

        tracing::info!(
            "session init: captions_enabled={} max_on_screen={} timeout_ms={}",
            settings.captions_enabled,
            settings.max_captions_on_screen,
            settings.caption_timeout_ms
        );

        let task = tokio::spawn(Self::event_loop(
            commands,
            expiries,
            aggregator,
            roster.clone(),
            emitter.clone(),
            settings.captions_enabled,
        ));

        Self {
            sender: SessionSender {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            emitter,
            roster,
            task,
        }
    }

    pub fn sender(&self) -> SessionSender {
        self.sender.clone()
    }

    pub fn send(&self, input: SessionInput) -> Result<(), LivecapError> {
        self.sender.send(input)
    }

    /// Register a listener for session events.
    pub fn add_listener(&self, listener: Arc<dyn SessionEventListener>) {
        self.emitter.add_listener(listener);
    }

    pub async fn streams(&self) -> Vec<Stream> {
        self.roster.lock().await.streams().to_vec()
    }

    pub async fn connections(&self) -> Vec<Connection> {
        self.roster.lock().await.connections().to_vec()
    }

    /// Stop accepting inputs and ask the loop to shut down.
    ///
    /// Every `SessionSender` fails from here on. Inputs queued before the
    /// call are still handled before the loop stops.
    pub fn close(&self) {
        if self.sender.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.sender.tx.send(Command::Dispose).is_err() {
            tracing::warn!("session event loop already stopped");
        }
    }

    /// Stop the session: cancels pending expiries and clears the caption box.
    pub async fn dispose(self) {
        self.close();
        if let Err(e) = self.task.await {
            tracing::warn!("session event loop failed: {e}");
        }
    }

    async fn event_loop<R: RenderSurface>(
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut expiries: mpsc::UnboundedReceiver<Expiry>,
        mut aggregator: SessionAggregator<R>,
        roster: Arc<Mutex<SessionRoster>>,
        emitter: EventEmitter,
        mut captions_enabled: bool,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Input(input)) => {
                        Self::handle_input(input, &mut aggregator, &roster, &emitter, &mut captions_enabled).await;
                    }
                    Some(Command::Dispose) | None => {
                        commands.close();
                        break;
                    }
                },
                Some(expiry) = expiries.recv() => {
                    aggregator.on_expired(expiry);
                }
            }
        }

        aggregator.clear();
        roster.lock().await.clear();
        tracing::info!("session event loop ended");
    }

    async fn handle_input<R: RenderSurface>(
        input: SessionInput,
        aggregator: &mut SessionAggregator<R>,
        roster: &Mutex<SessionRoster>,
        emitter: &EventEmitter,
        captions_enabled: &mut bool,
    ) {
        match input {
            SessionInput::Signal(signal) => match signal.signal_type.as_deref() {
                Some(NAME_SIGNAL_TYPE) => {
                    tracing::debug!("name signal: from={} name={}", signal.from, signal.data);
                    aggregator.on_name_signal(&signal.from, &signal.data);
                    emitter.emit(SessionEvent::NameSignalled {
                        connection_id: signal.from,
                        name: signal.data,
                    });
                }
                other => {
                    tracing::debug!("signal type={other:?} from={} (ignored)", signal.from);
                }
            },

            SessionInput::CaptionsReceived { event, subscription } => {
                if !*captions_enabled {
                    tracing::debug!("captions disabled, dropping caption for {}", event.stream_id);
                    return;
                }
                if event.stream_id != subscription.stream.stream_id {
                    tracing::warn!(
                        "caption stream {} does not match subscription stream {}",
                        event.stream_id,
                        subscription.stream.stream_id
                    );
                }
                aggregator.on_caption(event, &subscription);
            }

            SessionInput::ConnectionCreated(connection) => {
                roster.lock().await.add_connection(connection.clone());
                emitter.emit(SessionEvent::ConnectionCreated(connection));
            }

            SessionInput::ConnectionDestroyed(connection_id) => {
                roster.lock().await.remove_connection(&connection_id);
                emitter.emit(SessionEvent::ConnectionDestroyed(connection_id));
            }

            SessionInput::StreamCreated(stream) => {
                roster.lock().await.add_stream(stream.clone());
                emitter.emit(SessionEvent::StreamCreated(stream));
            }

            SessionInput::StreamDestroyed(stream_id) => {
                roster.lock().await.remove_stream(&stream_id);
                emitter.emit(SessionEvent::StreamDestroyed(stream_id));
            }

            SessionInput::Disconnected => {
                tracing::info!("session disconnected");
                roster.lock().await.clear();
                emitter.emit(SessionEvent::SessionDisconnected);
            }

            SessionInput::SetCaptionsEnabled(enabled) => {
                tracing::info!("captions enabled={enabled}");
                *captions_enabled = enabled;
                if !enabled {
                    aggregator.clear();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::guest_name;
    use crate::surface::TextSurface;
    use std::time::Duration;

    struct EventCapture {
        events: std::sync::Mutex<Vec<SessionEvent>>,
    }

    impl EventCapture {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn events(&self) -> Vec<SessionEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl SessionEventListener for EventCapture {
        fn on_event(&self, event: SessionEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn subscription(stream_id: &str, connection_id: &str, creation_time: u64) -> Subscription {
        Subscription::new(Stream {
            stream_id: stream_id.to_string(),
            connection: Connection::new(connection_id, creation_time),
        })
    }

    fn caption(session: &LiveSession, sub: &Subscription, text: &str) {
        session
            .sender()
            .captions_received(
                CaptionReceived {
                    stream_id: sub.stream.stream_id.clone(),
                    caption: text.to_string(),
                },
                sub.clone(),
            )
            .unwrap();
    }

    /// Let the session task drain its queue.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn five_streams_render_newest_four() {
        let surface = TextSurface::new();
        let session = LiveSession::init(&Settings::default(), surface.clone());

        let times: Vec<u64> = (1..=5).map(|i| 1_700_000_000_000 + i * 1_000).collect();
        for (i, time) in times.iter().enumerate() {
            let n = i + 1;
            let sub = subscription(&format!("S{n}"), &format!("c{n}"), *time);
            caption(&session, &sub, &format!("caption {n}"));
        }
        settle().await;

        let expected: Vec<String> = (1..5)
            .rev()
            .map(|i| format!("{}: caption {}", guest_name(times[i]), i + 1))
            .collect();
        assert_eq!(surface.lines(), expected);
        session.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn caption_clears_after_timeout() {
        let surface = TextSurface::new();
        let session = LiveSession::init(&Settings::default(), surface.clone());

        caption(&session, &subscription("S1", "c1", 1_700_000_123_456), "hi");
        settle().await;
        assert_eq!(surface.text(), "Guest12345: hi");

        tokio::time::sleep(Duration::from_millis(6000)).await;
        assert_eq!(surface.text(), "");
        session.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refreshed_caption_stays_visible() {
        let surface = TextSurface::new();
        let session = LiveSession::init(&Settings::default(), surface.clone());
        let sub = subscription("S1", "c1", 1_700_000_123_456);

        for text in ["one", "two", "three"] {
            caption(&session, &sub, text);
            tokio::time::sleep(Duration::from_millis(4000)).await;
        }
        assert_eq!(surface.text(), "Guest12345: three");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(surface.text(), "");
        session.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn name_signal_names_speaker() {
        let surface = TextSurface::new();
        let session = LiveSession::init(&Settings::default(), surface.clone());
        let capture = EventCapture::new();
        session.add_listener(capture.clone());

        session.sender().signal(Signal::name("c1", "Alice")).unwrap();
        session
            .sender()
            .signal(Signal {
                signal_type: Some("chat".into()),
                from: "c1".into(),
                data: "Mallory".into(),
            })
            .unwrap();
        caption(&session, &subscription("S1", "c1", 1_700_000_123_456), "hello");
        settle().await;

        assert_eq!(surface.text(), "Alice: hello");
        assert_eq!(
            capture.events(),
            vec![
                SessionEvent::NameSignalled {
                    connection_id: "c1".into(),
                    name: "Alice".into(),
                },
                SessionEvent::CaptionsRendered("Alice: hello".into()),
            ]
        );
        session.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn roster_tracks_streams_and_connections() {
        let session = LiveSession::init(&Settings::default(), TextSurface::new());
        let capture = EventCapture::new();
        session.add_listener(capture.clone());
        let sub = subscription("S1", "c1", 1_700_000_123_456);

        session
            .send(SessionInput::ConnectionCreated(sub.stream.connection.clone()))
            .unwrap();
        session
            .send(SessionInput::StreamCreated(sub.stream.clone()))
            .unwrap();
        settle().await;
        assert_eq!(session.streams().await, vec![sub.stream.clone()]);
        assert_eq!(session.connections().await, vec![sub.stream.connection.clone()]);

        session
            .send(SessionInput::StreamDestroyed("S1".into()))
            .unwrap();
        settle().await;
        assert!(session.streams().await.is_empty());
        assert_eq!(session.connections().await.len(), 1);

        session.send(SessionInput::Disconnected).unwrap();
        settle().await;
        assert!(session.connections().await.is_empty());
        assert_eq!(capture.events().last(), Some(&SessionEvent::SessionDisconnected));
        session.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_leaves_captions_to_expire() {
        let surface = TextSurface::new();
        let session = LiveSession::init(&Settings::default(), surface.clone());
        let sub = subscription("S1", "c1", 1_700_000_123_456);
        session
            .send(SessionInput::StreamCreated(sub.stream.clone()))
            .unwrap();

        caption(&session, &sub, "hi");
        session.send(SessionInput::Disconnected).unwrap();
        settle().await;
        assert!(session.streams().await.is_empty());
        assert_eq!(surface.text(), "Guest12345: hi");

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(surface.text(), "");
        session.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn destroyed_stream_caption_expires_normally() {
        let surface = TextSurface::new();
        let session = LiveSession::init(&Settings::default(), surface.clone());
        let sub = subscription("S1", "c1", 1_700_000_123_456);
        session
            .send(SessionInput::StreamCreated(sub.stream.clone()))
            .unwrap();

        caption(&session, &sub, "bye");
        session
            .send(SessionInput::StreamDestroyed("S1".into()))
            .unwrap();
        settle().await;
        assert_eq!(surface.text(), "Guest12345: bye");

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(surface.text(), "");
        session.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn close_rejects_cloned_senders_immediately() {
        let surface = TextSurface::new();
        let session = LiveSession::init(&Settings::default(), surface.clone());
        let sender = session.sender();

        session.close();
        // The loop has not run yet; the sender must still refuse.
        assert!(sender.is_closed());
        assert!(matches!(
            sender.captions_received(
                CaptionReceived {
                    stream_id: "S1".into(),
                    caption: "late".into(),
                },
                subscription("S1", "c1", 1_700_000_123_456),
            ),
            Err(LivecapError::SessionClosed)
        ));

        session.dispose().await;
        assert_eq!(surface.text(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_captions_clears_and_drops() {
        let surface = TextSurface::new();
        let session = LiveSession::init(&Settings::default(), surface.clone());
        let sub = subscription("S1", "c1", 1_700_000_123_456);

        caption(&session, &sub, "hi");
        settle().await;
        assert_eq!(surface.text(), "Guest12345: hi");

        session.send(SessionInput::SetCaptionsEnabled(false)).unwrap();
        caption(&session, &sub, "ignored");
        settle().await;
        assert_eq!(surface.text(), "");

        session.send(SessionInput::SetCaptionsEnabled(true)).unwrap();
        caption(&session, &sub, "back");
        settle().await;
        assert_eq!(surface.text(), "Guest12345: back");
        session.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn settings_disable_captions_from_start() {
        let surface = TextSurface::new();
        let settings = Settings {
            captions_enabled: false,
            ..Settings::default()
        };
        let session = LiveSession::init(&settings, surface.clone());

        caption(&session, &subscription("S1", "c1", 1_700_000_123_456), "hi");
        settle().await;
        assert_eq!(surface.text(), "");
        session.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn settings_capacity_is_honoured() {
        let surface = TextSurface::new();
        let settings = Settings {
            max_captions_on_screen: 2,
            ..Settings::default()
        };
        let session = LiveSession::init(&settings, surface.clone());
        for i in 1..=3u64 {
            caption(
                &session,
                &subscription(&format!("S{i}"), &format!("c{i}"), 1_700_000_000_000 + i * 1_000),
                "x",
            );
        }
        settle().await;
        assert_eq!(surface.lines().len(), 2);
        session.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_clears_surface_and_closes_sender() {
        let surface = TextSurface::new();
        let session = LiveSession::init(&Settings::default(), surface.clone());
        let sender = session.sender();

        caption(&session, &subscription("S1", "c1", 1_700_000_123_456), "hi");
        settle().await;
        assert_eq!(surface.text(), "Guest12345: hi");

        session.dispose().await;
        assert_eq!(surface.text(), "");
        assert!(matches!(
            sender.send(SessionInput::Disconnected),
            Err(LivecapError::SessionClosed)
        ));
    }
}
