//! In-process publish/subscribe between the typing session and the views
//! and recorders that react to it.
//!
//! The bus is single threaded: handlers run synchronously inside
//! [`EventBus::publish`], in registration order. A handler that panics is
//! logged and skipped so the remaining handlers still see the event.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use tracing::{error, trace, warn};

use crate::store::SnippetId;

/// Topic names; `Display` and `AsRef<str>` give the snake_case names
/// (`completed`, `pick_random`, ...).
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Topic {
    Completed,
    Deleted,
    Updated,
    Added,
    PickRandom,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A session for `id` reached its target after `elapsed_ms` of typing.
    Completed { id: SnippetId, elapsed_ms: u64 },
    Deleted(SnippetId),
    Updated(SnippetId),
    Added,
    /// The user asked for a different snippet at random.
    PickRandom,
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Completed { .. } => Topic::Completed,
            Event::Deleted(_) => Topic::Deleted,
            Event::Updated(_) => Topic::Updated,
            Event::Added => Topic::Added,
            Event::PickRandom => Topic::PickRandom,
        }
    }
}

type Handler = Rc<RefCell<dyn FnMut(&Event)>>;

struct Subscriber {
    id: u64,
    topic: Topic,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl Registry {
    fn contains(&self, id: u64) -> bool {
        self.subscribers.iter().any(|s| s.id == id)
    }
}

/// Cheap to clone; every clone talks to the same set of subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.registry.borrow().subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: FnMut(&Event) + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        let handler: Handler = Rc::new(RefCell::new(handler));
        registry.subscribers.push(Subscriber { id, topic, handler });
        trace!(%topic, subscriber = id, "subscribed");

        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every handler registered for its topic and return
    /// how many ran to completion.
    pub fn publish(&self, event: Event) -> usize {
        let topic = event.topic();

        // Snapshot so handlers may subscribe, cancel or publish while we iterate.
        let targets: Vec<(u64, Handler)> = self
            .registry
            .borrow()
            .subscribers
            .iter()
            .filter(|s| s.topic == topic)
            .map(|s| (s.id, Rc::clone(&s.handler)))
            .collect();

        let mut delivered = 0;
        for (id, handler) in targets {
            // cancelled by an earlier handler during this publish
            if !self.registry.borrow().contains(id) {
                continue;
            }

            let Ok(mut handler) = handler.try_borrow_mut() else {
                warn!(%topic, subscriber = id, "handler re-entered by its own publish; skipped");
                continue;
            };

            match panic::catch_unwind(AssertUnwindSafe(|| (&mut *handler)(&event))) {
                Ok(()) => delivered += 1,
                Err(payload) => error!(
                    %topic,
                    subscriber = id,
                    panic = %panic_message(payload.as_ref()),
                    "subscriber panicked"
                ),
            }
        }

        trace!(%topic, delivered, "published");
        delivered
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.registry
            .borrow()
            .subscribers
            .iter()
            .filter(|s| s.topic == topic)
            .count()
    }
}

/// Handle returned by [`EventBus::subscribe`]. Dropping it leaves the handler
/// registered; call [`Subscription::cancel`] to remove it.
#[must_use = "a subscription can only be cancelled through its handle"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    /// Remove exactly this handler. Safe to call any number of times.
    pub fn cancel(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().subscribers.retain(|s| s.id != self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.borrow().contains(self.id))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
