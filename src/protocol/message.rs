use crate::types::{Rank, RenameStatus, VmListing};

/// A decoded server instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Nop,
    /// `(username, message)` pairs; an empty username marks a system message.
    Chat(Vec<(String, String)>),
    AddUser(Vec<(String, Rank)>),
    RemUser(Vec<String>),
    Rename(RenameNotice),
    Turn(TurnPush),
    Vote(VotePush),
    Login(LoginResult),
    AccountLogin { success: bool, error: Option<String> },
    Auth(String),
    /// `(username, country code)` pairs.
    Flag(Vec<(String, String)>),
    List(Vec<VmListing>),
    Connect(bool),
    GetIp { username: String, ip: String },
    QemuOutput(String),
    /// Display updates; decoding the screen is not handled here.
    Screen,
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameNotice {
    /// Answer to our own rename. `status` is `None` when it was accepted.
    Own { status: Option<RenameStatus>, new_name: String },
    Other { old_name: String, new_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPush {
    pub turn_time_ms: u64,
    pub active: Option<String>,
    pub queue: Vec<String>,
    /// Trailing wait time, only sent to a client that is in the queue.
    pub queue_time_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VotePush {
    Status { time_left_ms: u64, yes: u32, no: u32 },
    Ended,
    Cooldown(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginResult {
    BadPassword,
    Admin,
    Moderator(u32),
}

impl ServerMessage {
    pub fn parse(fields: Vec<String>) -> Self {
        let Some(tag) = fields.first() else {
            return ServerMessage::Unrecognized(String::new());
        };
        parse_fields(tag, &fields[1..]).unwrap_or_else(|| ServerMessage::Unrecognized(tag.clone()))
    }
}

fn parse_fields(tag: &str, args: &[String]) -> Option<ServerMessage> {
    let msg = match tag {
        "nop" => ServerMessage::Nop,
        "chat" => ServerMessage::Chat(pairs(args)?),
        "adduser" => {
            let users = pairs(args.get(1..)?)?
                .into_iter()
                .map(|(name, rank)| Some((name, Rank::from_wire(&rank)?)))
                .collect::<Option<Vec<_>>>()?;
            ServerMessage::AddUser(users)
        }
        "remuser" => ServerMessage::RemUser(args.get(1..)?.to_vec()),
        "rename" => ServerMessage::Rename(parse_rename(args)?),
        "turn" => ServerMessage::Turn(parse_turn(args)?),
        "vote" => ServerMessage::Vote(parse_vote(args)?),
        "admin" => parse_admin(args)?,
        "login" => ServerMessage::AccountLogin {
            success: args.first()? == "1",
            error: args.get(1).cloned(),
        },
        "auth" => ServerMessage::Auth(args.first()?.clone()),
        "flag" => ServerMessage::Flag(pairs(args)?),
        "list" => {
            if args.len() % 3 != 0 {
                return None;
            }
            let vms = args
                .chunks_exact(3)
                .map(|c| VmListing { id: c[0].clone(), display_name: c[1].clone(), thumbnail: c[2].clone() })
                .collect();
            ServerMessage::List(vms)
        }
        "connect" => ServerMessage::Connect(args.first()? == "1"),
        "size" | "png" | "sync" | "cursor" => ServerMessage::Screen,
        _ => return None,
    };
    Some(msg)
}

fn pairs(args: &[String]) -> Option<Vec<(String, String)>> {
    if args.len() % 2 != 0 {
        return None;
    }
    Some(args.chunks_exact(2).map(|c| (c[0].clone(), c[1].clone())).collect())
}

fn parse_rename(args: &[String]) -> Option<RenameNotice> {
    match args.first()?.as_str() {
        "0" => {
            let status = match args.get(1)?.as_str() {
                "0" => None,
                "1" => Some(RenameStatus::Taken),
                "2" => Some(RenameStatus::Invalid),
                "3" => Some(RenameStatus::Blacklisted),
                _ => return None,
            };
            Some(RenameNotice::Own { status, new_name: args.get(2)?.clone() })
        }
        "1" => Some(RenameNotice::Other { old_name: args.get(1)?.clone(), new_name: args.get(2)?.clone() }),
        _ => None,
    }
}

fn parse_turn(args: &[String]) -> Option<TurnPush> {
    let turn_time_ms = args.first()?.parse().ok()?;
    let count: usize = args.get(1)?.parse().ok()?;
    let end = count.checked_add(2)?;
    let names = args.get(2..end)?;
    let queue_time_ms = match args.get(end) {
        Some(t) => Some(t.parse().ok()?),
        None => None,
    };
    let (active, queue) = match names.split_first() {
        Some((first, rest)) => (Some(first.clone()), rest.to_vec()),
        None => (None, Vec::new()),
    };
    Some(TurnPush { turn_time_ms, active, queue, queue_time_ms })
}

fn parse_vote(args: &[String]) -> Option<VotePush> {
    match args.first()?.as_str() {
        "0" | "1" => Some(VotePush::Status {
            time_left_ms: args.get(1)?.parse().ok()?,
            yes: args.get(2)?.parse().ok()?,
            no: args.get(3)?.parse().ok()?,
        }),
        "2" => Some(VotePush::Ended),
        "3" => Some(VotePush::Cooldown(args.get(1)?.parse().ok()?)),
        _ => None,
    }
}

fn parse_admin(args: &[String]) -> Option<ServerMessage> {
    match args.first()?.as_str() {
        "0" => {
            let result = match args.get(1)?.as_str() {
                "0" => LoginResult::BadPassword,
                "1" => LoginResult::Admin,
                "3" => LoginResult::Moderator(args.get(2)?.parse().ok()?),
                _ => return None,
            };
            Some(ServerMessage::Login(result))
        }
        "2" => Some(ServerMessage::QemuOutput(args.get(1)?.clone())),
        "19" => Some(ServerMessage::GetIp { username: args.get(1)?.clone(), ip: args.get(2)?.clone() }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(fields: &[&str]) -> ServerMessage {
        ServerMessage::parse(fields.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_parse_chat_pairs() {
        assert_eq!(
            parse(&["chat", "alice", "hi", "", "system"]),
            ServerMessage::Chat(vec![("alice".into(), "hi".into()), ("".into(), "system".into())])
        );
        assert_eq!(parse(&["chat", "alice"]), ServerMessage::Unrecognized("chat".into()));
    }

    #[test]
    fn test_parse_adduser() {
        assert_eq!(
            parse(&["adduser", "2", "alice", "1", "bob", "2"]),
            ServerMessage::AddUser(vec![("alice".into(), Rank::Registered), ("bob".into(), Rank::Admin)])
        );
        assert_eq!(parse(&["adduser", "1", "alice", "9"]), ServerMessage::Unrecognized("adduser".into()));
    }

    #[test]
    fn test_parse_remuser() {
        assert_eq!(
            parse(&["remuser", "2", "alice", "bob"]),
            ServerMessage::RemUser(vec!["alice".into(), "bob".into()])
        );
    }

    #[test]
    fn test_parse_rename_variants() {
        assert_eq!(
            parse(&["rename", "0", "0", "newme"]),
            ServerMessage::Rename(RenameNotice::Own { status: None, new_name: "newme".into() })
        );
        assert_eq!(
            parse(&["rename", "0", "1", "guest1"]),
            ServerMessage::Rename(RenameNotice::Own { status: Some(RenameStatus::Taken), new_name: "guest1".into() })
        );
        assert_eq!(
            parse(&["rename", "1", "old", "new"]),
            ServerMessage::Rename(RenameNotice::Other { old_name: "old".into(), new_name: "new".into() })
        );
    }

    #[test]
    fn test_parse_turn_with_queue_time() {
        assert_eq!(
            parse(&["turn", "18000", "3", "bob", "carol", "dave", "9000"]),
            ServerMessage::Turn(TurnPush {
                turn_time_ms: 18000,
                active: Some("bob".into()),
                queue: vec!["carol".into(), "dave".into()],
                queue_time_ms: Some(9000),
            })
        );
    }

    #[test]
    fn test_parse_turn_empty() {
        assert_eq!(
            parse(&["turn", "0", "0"]),
            ServerMessage::Turn(TurnPush { turn_time_ms: 0, active: None, queue: vec![], queue_time_ms: None })
        );
    }

    #[test]
    fn test_parse_turn_short_is_unrecognized() {
        assert_eq!(parse(&["turn", "1000", "3", "bob"]), ServerMessage::Unrecognized("turn".into()));
        assert_eq!(parse(&["turn", "abc", "0"]), ServerMessage::Unrecognized("turn".into()));
    }

    #[test]
    fn test_parse_vote() {
        assert_eq!(
            parse(&["vote", "1", "30000", "3", "1"]),
            ServerMessage::Vote(VotePush::Status { time_left_ms: 30000, yes: 3, no: 1 })
        );
        assert_eq!(parse(&["vote", "2"]), ServerMessage::Vote(VotePush::Ended));
        assert_eq!(parse(&["vote", "3", "45"]), ServerMessage::Vote(VotePush::Cooldown(45)));
    }

    #[test]
    fn test_parse_admin_responses() {
        assert_eq!(parse(&["admin", "0", "0"]), ServerMessage::Login(LoginResult::BadPassword));
        assert_eq!(parse(&["admin", "0", "1"]), ServerMessage::Login(LoginResult::Admin));
        assert_eq!(parse(&["admin", "0", "3", "65"]), ServerMessage::Login(LoginResult::Moderator(65)));
        assert_eq!(parse(&["admin", "2", "info"]), ServerMessage::QemuOutput("info".into()));
        assert_eq!(
            parse(&["admin", "19", "alice", "10.0.0.1"]),
            ServerMessage::GetIp { username: "alice".into(), ip: "10.0.0.1".into() }
        );
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse(&["list", "vm0", "Windows XP", "aGk=", "vm1", "Ubuntu", ""]),
            ServerMessage::List(vec![
                VmListing { id: "vm0".into(), display_name: "Windows XP".into(), thumbnail: "aGk=".into() },
                VmListing { id: "vm1".into(), display_name: "Ubuntu".into(), thumbnail: "".into() },
            ])
        );
        assert_eq!(parse(&["list", "vm0"]), ServerMessage::Unrecognized("list".into()));
    }

    #[test]
    fn test_parse_connect_and_misc() {
        assert_eq!(parse(&["connect", "1", "1", "1", "0"]), ServerMessage::Connect(true));
        assert_eq!(parse(&["connect", "0"]), ServerMessage::Connect(false));
        assert_eq!(parse(&["auth", "https://auth.example"]), ServerMessage::Auth("https://auth.example".into()));
        assert_eq!(parse(&["nop"]), ServerMessage::Nop);
        assert_eq!(parse(&["png", "0", "0", "0", "0", "AAAA"]), ServerMessage::Screen);
        assert_eq!(
            parse(&["login", "0", "session expired"]),
            ServerMessage::AccountLogin { success: false, error: Some("session expired".into()) }
        );
    }

    #[test]
    fn test_unknown_and_empty() {
        assert_eq!(parse(&["frobnicate", "1"]), ServerMessage::Unrecognized("frobnicate".into()));
        assert_eq!(ServerMessage::parse(vec![]), ServerMessage::Unrecognized(String::new()));
    }
}
