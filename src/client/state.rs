use std::time::Duration;

use crate::client::correlator::Response;
use crate::client::events::Event;
use crate::protocol::{ClientCommand, LoginResult, RenameNotice, ServerMessage, TurnPush, VotePush};
use crate::types::{Permissions, Rank, TurnStatus, User, VoteStatus};

/// What applying one server message asks the caller to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Emit(Event),
    Resolve(Response),
    Reply(ClientCommand),
}

/// Session state driven by server pushes. Pure: no IO, no timers.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    username: Option<String>,
    node: Option<String>,
    users: Vec<User>,
    turn: TurnStatus,
    vote: Option<VoteStatus>,
    rank: Rank,
    permissions: Permissions,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn set_node(&mut self, node: impl Into<String>) {
        self.node = Some(node.into());
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn turn(&self) -> &TurnStatus {
        &self.turn
    }

    pub fn vote(&self) -> Option<&VoteStatus> {
        self.vote.as_ref()
    }

    /// Drops the running vote. Returns false when none was running.
    pub fn clear_vote(&mut self) -> bool {
        self.vote.take().is_some()
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// Our own turn value: -1 not queued, 0 holding the turn, n queued.
    pub fn turn_position(&self) -> i32 {
        self.username.as_deref().map_or(-1, |me| self.turn.position_of(me))
    }

    pub fn apply(&mut self, msg: ServerMessage) -> Vec<Output> {
        match msg {
            ServerMessage::Nop => vec![Output::Reply(ClientCommand::Nop)],
            ServerMessage::Chat(lines) => lines
                .into_iter()
                .map(|(username, message)| Output::Emit(Event::Chat { username, message }))
                .collect(),
            ServerMessage::AddUser(users) => users
                .into_iter()
                .map(|(name, rank)| Output::Emit(Event::AddUser(self.add_user(name, rank))))
                .collect(),
            ServerMessage::RemUser(names) => names
                .into_iter()
                .filter_map(|name| self.remove_user(&name))
                .map(|user| Output::Emit(Event::RemUser(user)))
                .collect(),
            ServerMessage::Rename(notice) => self.apply_rename(notice),
            ServerMessage::Turn(push) => {
                self.apply_turn(push);
                vec![Output::Emit(Event::Turn(self.turn.clone()))]
            }
            ServerMessage::Vote(push) => self.apply_vote(push),
            ServerMessage::Login(result) => self.apply_login(result),
            ServerMessage::AccountLogin { success: true, .. } => {
                self.rank = Rank::Registered;
                self.permissions = Permissions::none();
                vec![self.login_event()]
            }
            ServerMessage::AccountLogin { success: false, error } => {
                vec![Output::Emit(Event::AccountLoginFailed(error))]
            }
            ServerMessage::Auth(endpoint) => vec![Output::Emit(Event::Auth(endpoint))],
            ServerMessage::Flag(flags) => {
                for (name, code) in flags {
                    if let Some(user) = self.users.iter_mut().find(|u| u.username == name) {
                        user.country_code = Some(code);
                    }
                }
                vec![Output::Emit(Event::Flag)]
            }
            ServerMessage::List(vms) => vec![Output::Resolve(Response::List(vms))],
            ServerMessage::Connect(ok) => vec![Output::Resolve(Response::Connect(ok))],
            ServerMessage::GetIp { username, ip } => vec![Output::Resolve(Response::GetIp { username, ip })],
            ServerMessage::QemuOutput(output) => vec![Output::Resolve(Response::QemuOutput(output))],
            ServerMessage::Screen | ServerMessage::Unrecognized(_) => Vec::new(),
        }
    }

    fn add_user(&mut self, name: String, rank: Rank) -> User {
        if let Some(existing) = self.users.iter_mut().find(|u| u.username == name) {
            existing.rank = rank;
            return existing.clone();
        }
        let user = User::new(name, rank);
        self.users.push(user.clone());
        user
    }

    fn remove_user(&mut self, name: &str) -> Option<User> {
        let idx = self.users.iter().position(|u| u.username == name)?;
        Some(self.users.remove(idx))
    }

    /// Usernames stay unique: an entry already holding `new` is replaced by
    /// the renamed one.
    fn rename_everywhere(&mut self, old: &str, new: &str) {
        if old == new || !self.users.iter().any(|u| u.username == old) {
            return;
        }
        self.users.retain(|u| u.username != new);
        self.turn.queue.retain(|u| u.username != new);
        if self.turn.active.as_ref().is_some_and(|u| u.username == new) {
            self.turn.active = None;
        }

        let turn_users = self.turn.active.iter_mut().chain(self.turn.queue.iter_mut());
        for user in self.users.iter_mut().chain(turn_users) {
            if user.username == old {
                user.username = new.to_string();
            }
        }
    }

    fn apply_rename(&mut self, notice: RenameNotice) -> Vec<Output> {
        match notice {
            RenameNotice::Other { old_name, new_name } => {
                self.rename_everywhere(&old_name, &new_name);
                vec![Output::Emit(Event::Rename { old_name, new_name, is_self: false })]
            }
            RenameNotice::Own { status, new_name } => {
                let mut out = Vec::new();
                if let Some(status) = status {
                    out.push(Output::Emit(Event::RenameStatus(status)));
                }
                // A rejected rename still carries the name the server gave us.
                let old_name = self.username.clone().unwrap_or_default();
                if status.is_none() || old_name != new_name {
                    self.rename_everywhere(&old_name, &new_name);
                    self.username = Some(new_name.clone());
                    out.push(Output::Emit(Event::Rename { old_name, new_name, is_self: true }));
                }
                out
            }
        }
    }

    fn apply_turn(&mut self, push: TurnPush) {
        for user in &mut self.users {
            user.turn = -1;
        }

        let active = push.active.as_deref().and_then(|name| {
            let user = self.users.iter_mut().find(|u| u.username == name)?;
            user.turn = 0;
            Some(user.clone())
        });

        let mut queue: Vec<User> = Vec::new();
        for name in &push.queue {
            let already_placed = push.active.as_deref() == Some(name.as_str())
                || queue.iter().any(|u| &u.username == name);
            if already_placed {
                continue;
            }
            if let Some(user) = self.users.iter_mut().find(|u| &u.username == name) {
                user.turn = queue.len() as i32 + 1;
                queue.push(user.clone());
            }
        }

        let me = self.username.as_deref();
        let holds_turn = me.is_some() && active.as_ref().map(|u| u.username.as_str()) == me;
        let waiting = me.is_some_and(|me| queue.iter().any(|u| u.username == me));

        self.turn = TurnStatus {
            active,
            queue,
            turn_time: holds_turn.then(|| Duration::from_millis(push.turn_time_ms)),
            queue_time: if waiting { push.queue_time_ms.map(Duration::from_millis) } else { None },
        };
    }

    fn apply_vote(&mut self, push: VotePush) -> Vec<Output> {
        match push {
            VotePush::Status { time_left_ms, yes, no } => {
                let status = VoteStatus { yes, no, time_left: Duration::from_millis(time_left_ms) };
                self.vote = Some(status.clone());
                vec![Output::Emit(Event::Vote(status))]
            }
            VotePush::Ended => {
                self.vote = None;
                vec![Output::Emit(Event::VoteEnd)]
            }
            VotePush::Cooldown(secs) => vec![Output::Emit(Event::VoteCooldown(secs))],
        }
    }

    fn apply_login(&mut self, result: LoginResult) -> Vec<Output> {
        match result {
            LoginResult::BadPassword => return vec![Output::Emit(Event::BadPassword)],
            LoginResult::Admin => {
                self.rank = Rank::Admin;
                self.permissions = Permissions::from_bits(Permissions::ALL);
            }
            LoginResult::Moderator(bits) => {
                self.rank = Rank::Moderator;
                self.permissions = Permissions::from_bits(bits);
            }
        }
        vec![self.login_event()]
    }

    fn login_event(&self) -> Output {
        Output::Emit(Event::Login { rank: self.rank, permissions: self.permissions })
    }
}
