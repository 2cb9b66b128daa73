use std::time::Duration;

use bit::BitIndex;
use serde::{Deserialize, Serialize};

/// Authorization tier of a user, with the server's wire values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    #[default]
    Unregistered,
    Registered,
    Admin,
    Moderator,
}

impl Rank {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "0" => Some(Rank::Unregistered),
            "1" => Some(Rank::Registered),
            "2" => Some(Rank::Admin),
            "3" => Some(Rank::Moderator),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub rank: Rank,
    /// -1 when not queued, 0 while holding the turn, n for queue position n.
    pub turn: i32,
    pub country_code: Option<String>,
}

impl User {
    pub fn new(username: impl Into<String>, rank: Rank) -> Self {
        Self { username: username.into(), rank, turn: -1, country_code: None }
    }
}

/// Staff capabilities granted by a login. Bit positions follow the server's
/// permission mask; ending turns and clearing the queue ride on the bypass bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub restore: bool,
    pub reboot: bool,
    pub ban: bool,
    pub force_vote: bool,
    pub mute: bool,
    pub kick: bool,
    pub bypass_turn: bool,
    pub end_turn: bool,
    pub clear_queue: bool,
    pub rename: bool,
    pub grab_ip: bool,
    pub xss: bool,
}

impl Permissions {
    /// Mask the server implies for a full admin login.
    pub const ALL: u32 = 65535;

    pub fn from_bits(bits: u32) -> Self {
        Self {
            restore: bits.bit(0),
            reboot: bits.bit(1),
            ban: bits.bit(2),
            force_vote: bits.bit(3),
            mute: bits.bit(4),
            kick: bits.bit(5),
            bypass_turn: bits.bit(6),
            end_turn: bits.bit(6),
            clear_queue: bits.bit(6),
            rename: bits.bit(7),
            grab_ip: bits.bit(8),
            xss: bits.bit(9),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MuteState {
    Temporary,
    Permanent,
    Unmuted,
}

impl MuteState {
    pub fn as_wire(self) -> &'static str {
        match self {
            MuteState::Temporary => "0",
            MuteState::Permanent => "1",
            MuteState::Unmuted => "2",
        }
    }
}

/// Snapshot of who holds the turn and who is waiting.
///
/// `turn_time` is only known while the local user holds the turn, and
/// `queue_time` only while the local user is waiting in the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnStatus {
    pub active: Option<User>,
    pub queue: Vec<User>,
    pub turn_time: Option<Duration>,
    pub queue_time: Option<Duration>,
}

impl TurnStatus {
    /// Turn value for `username`: 0 when active, queue position, or -1.
    pub fn position_of(&self, username: &str) -> i32 {
        if self.active.as_ref().is_some_and(|u| u.username == username) {
            return 0;
        }
        self.queue
            .iter()
            .position(|u| u.username == username)
            .map_or(-1, |i| i as i32 + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStatus {
    pub yes: u32,
    pub no: u32,
    pub time_left: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenameStatus {
    Taken,
    Invalid,
    Blacklisted,
}

/// One entry of a server's VM listing. The thumbnail stays base64 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmListing {
    pub id: String,
    pub display_name: String,
    pub thumbnail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_from_wire() {
        assert_eq!(Rank::from_wire("0"), Some(Rank::Unregistered));
        assert_eq!(Rank::from_wire("1"), Some(Rank::Registered));
        assert_eq!(Rank::from_wire("2"), Some(Rank::Admin));
        assert_eq!(Rank::from_wire("3"), Some(Rank::Moderator));
        assert_eq!(Rank::from_wire("4"), None);
        assert_eq!(Rank::from_wire("x"), None);
    }

    #[test]
    fn test_permissions_decode_single_bits() {
        let p = Permissions::from_bits(0b1);
        assert!(p.restore);
        assert!(!p.reboot);

        let p = Permissions::from_bits(1 << 8);
        assert!(p.grab_ip);
        assert!(!p.xss);
        assert!(!p.restore);
    }

    #[test]
    fn test_permissions_bypass_grants_turn_controls() {
        let p = Permissions::from_bits(1 << 6);
        assert!(p.bypass_turn);
        assert!(p.end_turn);
        assert!(p.clear_queue);
        assert!(!p.kick);
    }

    #[test]
    fn test_permissions_all() {
        let p = Permissions::from_bits(Permissions::ALL);
        assert!(p.restore && p.reboot && p.ban && p.force_vote && p.mute && p.kick);
        assert!(p.bypass_turn && p.end_turn && p.clear_queue && p.rename && p.grab_ip && p.xss);
    }

    #[test]
    fn test_turn_position() {
        let status = TurnStatus {
            active: Some(User::new("bob", Rank::Unregistered)),
            queue: vec![User::new("carol", Rank::Registered), User::new("dave", Rank::Unregistered)],
            turn_time: None,
            queue_time: None,
        };
        assert_eq!(status.position_of("bob"), 0);
        assert_eq!(status.position_of("carol"), 1);
        assert_eq!(status.position_of("dave"), 2);
        assert_eq!(status.position_of("erin"), -1);
    }

    #[test]
    fn test_mute_wire_values() {
        assert_eq!(MuteState::Temporary.as_wire(), "0");
        assert_eq!(MuteState::Permanent.as_wire(), "1");
        assert_eq!(MuteState::Unmuted.as_wire(), "2");
    }
}
