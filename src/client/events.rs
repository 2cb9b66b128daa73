use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Weak,
};

use parking_lot::Mutex;

use crate::types::{Permissions, Rank, RenameStatus, TurnStatus, User, VoteStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Empty `username` is a system message.
    Chat { username: String, message: String },
    AddUser(User),
    RemUser(User),
    Flag,
    Rename { old_name: String, new_name: String, is_self: bool },
    RenameStatus(RenameStatus),
    Turn(TurnStatus),
    Vote(VoteStatus),
    VoteEnd,
    /// Seconds until another vote may be started.
    VoteCooldown(u32),
    Login { rank: Rank, permissions: Permissions },
    BadPassword,
    AccountLoginFailed(Option<String>),
    /// Auth API endpoint the server expects account sessions from.
    Auth(String),
    Close { expected: bool },
    /// Every decoded instruction, before it is applied. Only built while
    /// something is subscribed to it.
    Instruction(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Chat,
    AddUser,
    RemUser,
    Flag,
    Rename,
    RenameStatus,
    Turn,
    Vote,
    VoteEnd,
    VoteCooldown,
    Login,
    BadPassword,
    AccountLoginFailed,
    Auth,
    Close,
    Instruction,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Chat { .. } => EventKind::Chat,
            Event::AddUser(_) => EventKind::AddUser,
            Event::RemUser(_) => EventKind::RemUser,
            Event::Flag => EventKind::Flag,
            Event::Rename { .. } => EventKind::Rename,
            Event::RenameStatus(_) => EventKind::RenameStatus,
            Event::Turn(_) => EventKind::Turn,
            Event::Vote(_) => EventKind::Vote,
            Event::VoteEnd => EventKind::VoteEnd,
            Event::VoteCooldown(_) => EventKind::VoteCooldown,
            Event::Login { .. } => EventKind::Login,
            Event::BadPassword => EventKind::BadPassword,
            Event::AccountLoginFailed(_) => EventKind::AccountLoginFailed,
            Event::Auth(_) => EventKind::Auth,
            Event::Close { .. } => EventKind::Close,
            Event::Instruction(_) => EventKind::Instruction,
        }
    }
}

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Entry {
    id: u64,
    kind: EventKind,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry>>,
}

impl Registry {
    fn remove(&self, id: u64) {
        self.entries.lock().retain(|e| e.id != id);
    }
}

/// Synchronous publish/subscribe keyed by [`EventKind`].
///
/// Handlers run on the emitting thread in subscription order. The handler
/// list is copied before dispatch, so subscribing or unsubscribing from
/// inside a handler only affects later emissions.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Registry>,
}

/// Handle returned by [`EventBus::on`]. Dropping it keeps the handler
/// subscribed; call [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.insert(id, kind, Arc::new(handler))
    }

    /// Like [`EventBus::on`], but the handler removes itself after its first call.
    pub fn once<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::downgrade(&self.registry);
        let fired = AtomicBool::new(false);
        let wrapped = move |event: &Event| {
            if fired.swap(true, Ordering::AcqRel) {
                return;
            }
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
            handler(event);
        };
        self.insert(id, kind, Arc::new(wrapped))
    }

    pub fn emit(&self, event: &Event) {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .registry
            .entries
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| Arc::clone(&e.handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.registry.entries.lock().iter().filter(|e| e.kind == kind).count()
    }

    fn insert(&self, id: u64, kind: EventKind, handler: Handler) -> Subscription {
        self.registry.entries.lock().push(Entry { id, kind, handler });
        Subscription { id, registry: Arc::downgrade(&self.registry) }
    }
}
