use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::ClientError;
use crate::types::VmListing;

/// Identifies a request whose answer arrives as its own server instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKey {
    Connect,
    List,
    GetIp(String),
    QemuMonitor,
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKey::Connect => f.write_str("connect"),
            RequestKey::List => f.write_str("list"),
            RequestKey::GetIp(user) => write!(f, "getip({user})"),
            RequestKey::QemuMonitor => f.write_str("qemu monitor"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Connect(bool),
    List(Vec<VmListing>),
    GetIp { username: String, ip: String },
    QemuOutput(String),
}

impl Response {
    pub fn key(&self) -> RequestKey {
        match self {
            Response::Connect(_) => RequestKey::Connect,
            Response::List(_) => RequestKey::List,
            Response::GetIp { username, .. } => RequestKey::GetIp(username.clone()),
            Response::QemuOutput(_) => RequestKey::QemuMonitor,
        }
    }
}

/// Single-shot waiters, at most one per [`RequestKey`].
///
/// Dropping a waiter's sender (on close) makes its receiver fail, which the
/// caller reports as [`ClientError::Closed`].
#[derive(Default)]
pub struct Correlator {
    pending: Mutex<HashMap<RequestKey, oneshot::Sender<Response>>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, key: RequestKey) -> Result<oneshot::Receiver<Response>, ClientError> {
        let mut pending = self.pending.lock();
        // A waiter whose caller went away no longer blocks the key.
        if pending.get(&key).is_some_and(|tx| !tx.is_closed()) {
            return Err(ClientError::RequestPending(key.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(key, tx);
        Ok(rx)
    }

    /// Hands `response` to its waiter. Returns false when nobody was waiting.
    pub fn resolve(&self, response: Response) -> bool {
        let Some(tx) = self.pending.lock().remove(&response.key()) else {
            return false;
        };
        tx.send(response).is_ok()
    }

    pub fn cancel(&self, key: &RequestKey) {
        self.pending.lock().remove(key);
    }

    pub fn fail_all(&self) {
        self.pending.lock().clear();
    }

    pub fn is_pending(&self, key: &RequestKey) -> bool {
        self.pending.lock().get(key).is_some_and(|tx| !tx.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[tokio::test]
    async fn test_resolve_delivers_to_waiter() {
        let correlator = Correlator::new();
        let rx = correlator.register(RequestKey::List).unwrap();
        assert!(correlator.resolve(Response::List(vec![])));
        assert_eq!(rx.await.unwrap(), Response::List(vec![]));
        assert!(!correlator.is_pending(&RequestKey::List));
    }

    #[test]
    fn test_waiter_stays_pending_until_resolved() {
        let correlator = Correlator::new();
        let rx = correlator.register(RequestKey::QemuMonitor).unwrap();
        let mut fut = task::spawn(rx);
        assert_pending!(fut.poll());

        correlator.resolve(Response::QemuOutput("ok".into()));
        assert!(fut.is_woken());
        assert_ready_eq!(fut.poll(), Ok(Response::QemuOutput("ok".into())));
    }

    #[test]
    fn test_second_request_with_same_key_rejected() {
        let correlator = Correlator::new();
        let _rx = correlator.register(RequestKey::List).unwrap();
        let err = correlator.register(RequestKey::List).unwrap_err();
        assert!(matches!(err, ClientError::RequestPending(ref k) if k == "list"));
    }

    #[test]
    fn test_different_keys_coexist() {
        let correlator = Correlator::new();
        let _a = correlator.register(RequestKey::GetIp("alice".into())).unwrap();
        let _b = correlator.register(RequestKey::GetIp("bob".into())).unwrap();
        let _c = correlator.register(RequestKey::List).unwrap();
        assert!(correlator.is_pending(&RequestKey::GetIp("bob".into())));
    }

    #[test]
    fn test_dropped_waiter_frees_key() {
        let correlator = Correlator::new();
        drop(correlator.register(RequestKey::Connect).unwrap());
        assert!(correlator.register(RequestKey::Connect).is_ok());
    }

    #[test]
    fn test_response_without_waiter_is_dropped() {
        let correlator = Correlator::new();
        assert!(!correlator.resolve(Response::Connect(true)));
    }

    #[test]
    fn test_getip_matches_username() {
        let correlator = Correlator::new();
        let _rx = correlator.register(RequestKey::GetIp("alice".into())).unwrap();
        assert!(!correlator.resolve(Response::GetIp { username: "bob".into(), ip: "1.1.1.1".into() }));
        assert!(correlator.is_pending(&RequestKey::GetIp("alice".into())));
    }

    #[tokio::test]
    async fn test_fail_all_rejects_waiters() {
        let correlator = Correlator::new();
        let rx = correlator.register(RequestKey::List).unwrap();
        correlator.fail_all();
        assert!(rx.await.is_err());
    }
}
