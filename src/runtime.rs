use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::warn;

use crate::session::Keystroke;

/// What the practice loop reacts to
#[derive(Clone, Debug)]
pub enum RoteEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    Tick,
}

/// Where key presses and resizes come from
pub trait EventSource: Send + 'static {
    /// Wait at most `timeout` for the next event.
    fn recv_timeout(&self, timeout: Duration) -> Result<RoteEvent, RecvTimeoutError>;
}

/// Production event source reading crossterm events on a background thread
pub struct CrosstermEventSource {
    rx: Receiver<RoteEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let evt = match event::read() {
                // key release/repeat reports on some platforms would double-type
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => RoteEvent::Key(key),
                Ok(CtEvent::Resize(w, h)) => RoteEvent::Resize(w, h),
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "terminal event stream closed");
                    break;
                }
            };
            if tx.send(evt).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<RoteEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// How long the loop waits before polling timers
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed event source for tests
pub struct TestEventSource {
    rx: Receiver<RoteEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<RoteEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<RoteEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Pulls one event at a time, substituting `Tick` when the source is quiet
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    pub fn step(&self) -> RoteEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => RoteEvent::Tick,
        }
    }
}

/// Classify a terminal key for the typing engine. Characters chorded with
/// Control or Alt are shortcuts, not text.
pub fn keystroke(key: &KeyEvent) -> Keystroke {
    match key.code {
        KeyCode::Char(_) if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            Keystroke::Other
        }
        KeyCode::Char(c) => Keystroke::Char(c),
        KeyCode::Tab => Keystroke::Tab,
        KeyCode::Enter => Keystroke::Enter,
        KeyCode::Backspace => Keystroke::Backspace,
        _ => Keystroke::Other,
    }
}
