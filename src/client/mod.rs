pub mod correlator;
pub mod countdown;
pub mod events;
pub mod state;
pub mod transport;

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::{stream::SplitStream, StreamExt};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::config::Config;
use crate::error::ClientError;
use crate::protocol::{self, ClientCommand, ServerMessage};
use crate::types::{MuteState, Permissions, Rank, TurnStatus, User, VmListing, VoteStatus};

use self::correlator::{Correlator, RequestKey, Response};
use self::countdown::Countdown;
use self::events::{Event, EventBus, EventKind, Subscription};
use self::state::{Output, SessionState};
use self::transport::WsStream;

const KEYSYM_CONTROL_L: u32 = 0xffe3;
const KEYSYM_ALT_L: u32 = 0xffe9;
const KEYSYM_DELETE: u32 = 0xffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Opening,
    Open,
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// How long correlated requests wait for their answer. `None` waits
    /// until the answer arrives or the connection closes.
    pub request_timeout: Option<Duration>,
}

struct Inner {
    conn: ConnectionState,
    session: SessionState,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    reader: Option<JoinHandle<()>>,
    turn_countdown: Countdown,
    vote_countdown: Countdown,
}

struct Shared {
    this: Weak<Shared>,
    url: String,
    options: ClientOptions,
    events: EventBus,
    correlator: Correlator,
    /// Held for a whole apply-and-emit step and by `close`, so once `close`
    /// returns no handler runs for this client again.
    dispatch: ReentrantMutex<()>,
    inner: Mutex<Inner>,
}

/// One session against one CollabVM server.
///
/// Cloning is cheap and every clone drives the same connection.
#[derive(Clone)]
pub struct VmClient {
    shared: Arc<Shared>,
}

/// Non-owning handle for event handlers that need to call back into the client.
#[derive(Clone)]
pub struct WeakVmClient {
    shared: Weak<Shared>,
}

impl WeakVmClient {
    pub fn upgrade(&self) -> Option<VmClient> {
        self.shared.upgrade().map(|shared| VmClient { shared })
    }
}

impl VmClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_options(url, ClientOptions::default())
    }

    pub fn with_options(url: impl Into<String>, options: ClientOptions) -> Self {
        let url = url.into();
        let shared = Arc::new_cyclic(|this| Shared {
            this: this.clone(),
            url,
            options,
            events: EventBus::new(),
            correlator: Correlator::new(),
            dispatch: ReentrantMutex::new(()),
            inner: Mutex::new(Inner {
                conn: ConnectionState::Idle,
                session: SessionState::new(),
                outbound: None,
                reader: None,
                turn_countdown: Countdown::new(),
                vote_countdown: Countdown::new(),
            }),
        });
        Self { shared }
    }

    pub fn from_config(config: &Config) -> Self {
        let options = ClientOptions {
            request_timeout: config.client.request_timeout_ms.map(Duration::from_millis),
        };
        Self::with_options(config.server.url.clone(), options)
    }

    pub fn downgrade(&self) -> WeakVmClient {
        WeakVmClient { shared: Arc::downgrade(&self.shared) }
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Opens the socket. Failure does not surface here: the client moves to
    /// `Closed` and emits `Close { expected: false }`.
    pub async fn open(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.conn != ConnectionState::Idle {
                tracing::debug!("open called in state {:?}, ignoring", inner.conn);
                return;
            }
            inner.conn = ConnectionState::Opening;
        }

        let ws = match transport::connect(&self.shared.url).await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::warn!("failed to open {}: {e}", self.shared.url);
                self.shared.shutdown(false);
                return;
            }
        };

        let (sink, stream) = ws.split();
        let _dispatch = self.shared.dispatch.lock();
        let mut inner = self.shared.inner.lock();
        if inner.conn != ConnectionState::Opening {
            // closed while the handshake was in flight
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(transport::write_loop(sink, rx));
        inner.outbound = Some(tx);
        inner.reader = Some(tokio::spawn(read_loop(Arc::downgrade(&self.shared), stream)));
        inner.conn = ConnectionState::Open;
        tracing::info!("connected to {}", self.shared.url);
    }

    /// Closes the connection. Only the first call has an effect.
    pub fn close(&self) {
        self.shared.shutdown(true);
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().conn
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    // -- events --

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.events.on(kind, handler)
    }

    pub fn once<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.events.once(kind, handler)
    }

    // -- state --

    pub fn users(&self) -> Vec<User> {
        self.shared.inner.lock().session.users().to_vec()
    }

    pub fn turn_status(&self) -> TurnStatus {
        self.shared.inner.lock().session.turn().clone()
    }

    pub fn vote_status(&self) -> Option<VoteStatus> {
        self.shared.inner.lock().session.vote().cloned()
    }

    pub fn rank(&self) -> Rank {
        self.shared.inner.lock().session.rank()
    }

    pub fn permissions(&self) -> Permissions {
        self.shared.inner.lock().session.permissions()
    }

    pub fn username(&self) -> Option<String> {
        self.shared.inner.lock().session.username().map(str::to_string)
    }

    pub fn node(&self) -> Option<String> {
        self.shared.inner.lock().session.node().map(str::to_string)
    }

    pub fn turn_position(&self) -> i32 {
        self.shared.inner.lock().session.turn_position()
    }

    pub fn turn_seconds_remaining(&self) -> u64 {
        self.shared.inner.lock().turn_countdown.remaining()
    }

    pub fn vote_seconds_remaining(&self) -> u64 {
        self.shared.inner.lock().vote_countdown.remaining()
    }

    // -- requests --

    /// Renames (or asks for a server-assigned name) and joins `node`.
    pub async fn connect(&self, node: &str, username: Option<&str>) -> Result<bool, ClientError> {
        let commands = vec![
            ClientCommand::Rename(username.map(str::to_string)),
            ClientCommand::Connect(node.to_string()),
        ];
        match self.request(RequestKey::Connect, commands).await? {
            Response::Connect(joined) => {
                if joined {
                    self.shared.inner.lock().session.set_node(node);
                }
                Ok(joined)
            }
            other => Err(unexpected(other)),
        }
    }

    pub async fn list(&self) -> Result<Vec<VmListing>, ClientError> {
        match self.request(RequestKey::List, vec![ClientCommand::List]).await? {
            Response::List(vms) => Ok(vms),
            other => Err(unexpected(other)),
        }
    }

    pub async fn get_ip(&self, username: &str) -> Result<String, ClientError> {
        let key = RequestKey::GetIp(username.to_string());
        match self.request(key, vec![ClientCommand::GetIp(username.to_string())]).await? {
            Response::GetIp { ip, .. } => Ok(ip),
            other => Err(unexpected(other)),
        }
    }

    pub async fn qemu_monitor(&self, command: &str) -> Result<String, ClientError> {
        let node = self.node().ok_or(ClientError::NoNode)?;
        let cmd = ClientCommand::QemuMonitor { node, command: command.to_string() };
        match self.request(RequestKey::QemuMonitor, vec![cmd]).await? {
            Response::QemuOutput(output) => Ok(output),
            other => Err(unexpected(other)),
        }
    }

    async fn request(&self, key: RequestKey, commands: Vec<ClientCommand>) -> Result<Response, ClientError> {
        if !self.is_open() {
            return Err(ClientError::NotOpen);
        }
        let rx = self.shared.correlator.register(key.clone())?;
        for cmd in commands {
            if !self.shared.send(cmd) {
                self.shared.correlator.cancel(&key);
                return Err(ClientError::NotOpen);
            }
        }

        let answer = match self.shared.options.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(answer) => answer,
                Err(_) => {
                    self.shared.correlator.cancel(&key);
                    return Err(ClientError::Timeout(limit));
                }
            },
            None => rx.await,
        };
        answer.map_err(|_| ClientError::Closed)
    }

    // -- commands --

    /// Sends a raw command. Dropped when the connection is not open.
    pub fn send(&self, cmd: ClientCommand) {
        self.shared.send(cmd);
    }

    pub fn chat(&self, message: &str) {
        self.send(ClientCommand::Chat(message.to_string()));
    }

    pub fn xss(&self, message: &str) {
        self.send(ClientCommand::Xss(message.to_string()));
    }

    pub fn turn(&self, take: bool) {
        self.send(ClientCommand::Turn(take));
    }

    pub fn key(&self, keysym: u32, down: bool) {
        self.send(ClientCommand::Key { keysym, down });
    }

    pub fn mouse(&self, x: u32, y: u32, mask: u8) {
        self.send(ClientCommand::Mouse { x, y, mask });
    }

    pub fn ctrl_alt_del(&self) {
        for keysym in [KEYSYM_CONTROL_L, KEYSYM_ALT_L, KEYSYM_DELETE] {
            self.key(keysym, true);
        }
        for keysym in [KEYSYM_CONTROL_L, KEYSYM_ALT_L, KEYSYM_DELETE] {
            self.key(keysym, false);
        }
    }

    pub fn rename(&self, username: Option<&str>) {
        self.send(ClientCommand::Rename(username.map(str::to_string)));
    }

    pub fn vote(&self, yes: bool) {
        self.send(ClientCommand::Vote(yes));
    }

    /// Staff login. The verdict arrives as a `Login` or `BadPassword` event.
    pub fn login(&self, password: &str) {
        self.send(ClientCommand::Login(password.to_string()));
    }

    /// Account login with a session token from the auth service.
    pub fn login_account(&self, token: &str) {
        self.send(ClientCommand::AccountLogin(token.to_string()));
    }

    pub fn restore(&self) {
        self.send_to_node(ClientCommand::Restore);
    }

    pub fn reboot(&self) {
        self.send_to_node(ClientCommand::Reboot);
    }

    pub fn clear_queue(&self) {
        self.send_to_node(ClientCommand::ClearQueue);
    }

    pub fn ban(&self, username: &str) {
        self.send(ClientCommand::Ban(username.to_string()));
    }

    pub fn force_vote(&self, yes: bool) {
        self.send(ClientCommand::ForceVote(yes));
    }

    pub fn mute(&self, username: &str, state: MuteState) {
        self.send(ClientCommand::Mute { username: username.to_string(), state });
    }

    pub fn kick(&self, username: &str) {
        self.send(ClientCommand::Kick(username.to_string()));
    }

    pub fn end_turn(&self, username: &str) {
        self.send(ClientCommand::EndTurn(username.to_string()));
    }

    pub fn rename_user(&self, old_name: &str, new_name: &str) {
        self.send(ClientCommand::RenameUser { old_name: old_name.to_string(), new_name: new_name.to_string() });
    }

    pub fn bypass_turn(&self) {
        self.send(ClientCommand::BypassTurn);
    }

    pub fn indefinite_turn(&self) {
        self.send(ClientCommand::IndefiniteTurn);
    }

    pub fn admin(&self, args: Vec<String>) {
        self.send(ClientCommand::Admin(args));
    }

    fn send_to_node(&self, build: impl FnOnce(String) -> ClientCommand) {
        match self.node() {
            Some(node) => self.send(build(node)),
            None => tracing::debug!("no node joined, dropping node command"),
        }
    }
}

fn unexpected(response: Response) -> ClientError {
    ClientError::UnexpectedResponse(format!("{response:?}"))
}

impl Shared {
    fn send(&self, cmd: ClientCommand) -> bool {
        let inner = self.inner.lock();
        let tx = match (&inner.outbound, inner.conn) {
            (Some(tx), ConnectionState::Open) => tx,
            _ => {
                tracing::debug!("connection not open, dropping {:?}", cmd);
                return false;
            }
        };
        let frame = protocol::encode(&cmd.to_fields());
        tx.send(Message::Text(frame)).is_ok()
    }

    fn handle_frame(&self, text: &str) {
        let _dispatch = self.dispatch.lock();
        for instruction in protocol::decode(text) {
            let fields = match instruction {
                Ok(fields) => fields,
                Err(e) => {
                    tracing::warn!("dropping rest of frame: {e}");
                    return;
                }
            };
            if self.events.subscriber_count(EventKind::Instruction) > 0 {
                if self.inner.lock().conn != ConnectionState::Open {
                    return;
                }
                self.events.emit(&Event::Instruction(fields.clone()));
            }

            let msg = ServerMessage::parse(fields);
            if let ServerMessage::Unrecognized(tag) = &msg {
                tracing::debug!("ignoring message {tag:?}");
                continue;
            }

            let outputs = {
                let mut inner = self.inner.lock();
                if inner.conn != ConnectionState::Open {
                    return;
                }
                let outputs = inner.session.apply(msg);
                inner.sync_countdowns(&outputs, &self.this);
                outputs
            };

            for output in outputs {
                match output {
                    Output::Emit(event) => {
                        if self.inner.lock().conn != ConnectionState::Open {
                            return;
                        }
                        self.events.emit(&event);
                    }
                    Output::Resolve(response) => {
                        let key = response.key();
                        if !self.correlator.resolve(response) {
                            tracing::debug!("no pending {key} request, dropping response");
                        }
                    }
                    Output::Reply(cmd) => {
                        self.send(cmd);
                    }
                }
            }
        }
    }

    fn shutdown(&self, expected: bool) {
        let _dispatch = self.dispatch.lock();
        let previous = {
            let mut inner = self.inner.lock();
            let previous = inner.conn;
            if previous == ConnectionState::Closed {
                return;
            }
            inner.conn = ConnectionState::Closed;
            inner.session = SessionState::new();
            inner.turn_countdown.stop();
            inner.vote_countdown.stop();
            // Dropping the sender lets the writer flush and send a close frame.
            inner.outbound = None;
            if let Some(reader) = inner.reader.take() {
                reader.abort();
            }
            previous
        };
        self.correlator.fail_all();

        if previous == ConnectionState::Idle {
            return;
        }
        if expected {
            tracing::info!("closed connection to {}", self.url);
        } else {
            tracing::warn!("connection to {} lost", self.url);
        }
        self.events.emit(&Event::Close { expected });
    }
}

impl Shared {
    /// The vote timed out locally without a `vote,2` from the server.
    fn expire_vote(&self) {
        let mut inner = self.inner.lock();
        // a newer vote restarted the countdown
        if inner.vote_countdown.remaining() > 0 {
            return;
        }
        if inner.session.clear_vote() {
            tracing::debug!("vote timed out locally");
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(reader) = self.inner.get_mut().reader.take() {
            reader.abort();
        }
    }
}

impl Inner {
    fn sync_countdowns(&mut self, outputs: &[Output], shared: &Weak<Shared>) {
        for output in outputs {
            match output {
                Output::Emit(Event::Turn(status)) => match status.turn_time.or(status.queue_time) {
                    Some(time) => self.turn_countdown.start(whole_seconds(time)),
                    None => self.turn_countdown.stop(),
                },
                Output::Emit(Event::Vote(status)) => {
                    let secs = whole_seconds(status.time_left);
                    if secs == 0 {
                        self.vote_countdown.stop();
                        self.session.clear_vote();
                        continue;
                    }
                    let shared = shared.clone();
                    self.vote_countdown.start_then(secs, move || {
                        if let Some(shared) = shared.upgrade() {
                            shared.expire_vote();
                        }
                    });
                }
                Output::Emit(Event::VoteEnd) => self.vote_countdown.stop(),
                _ => {}
            }
        }
    }
}

fn whole_seconds(time: Duration) -> u64 {
    (time.as_millis() as u64).div_ceil(1000)
}

async fn read_loop(shared: Weak<Shared>, mut stream: SplitStream<WsStream>) {
    while let Some(frame) = stream.next().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        match frame {
            Ok(Message::Text(text)) => shared.handle_frame(&text),
            Ok(Message::Close(frame)) => {
                tracing::info!("server sent close: {frame:?}");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("ws read error: {e}");
                break;
            }
        }
    }
    if let Some(shared) = shared.upgrade() {
        shared.shutdown(false);
    }
}
