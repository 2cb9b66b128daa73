use crate::types::MuteState;

const ADMIN_LOGIN: &str = "2";
const ADMIN_MONITOR: &str = "5";
const ADMIN_RESTORE: &str = "8";
const ADMIN_REBOOT: &str = "10";
const ADMIN_BAN: &str = "12";
const ADMIN_FORCE_VOTE: &str = "13";
const ADMIN_MUTE: &str = "14";
const ADMIN_KICK: &str = "15";
const ADMIN_END_TURN: &str = "16";
const ADMIN_CLEAR_TURNS: &str = "17";
const ADMIN_RENAME: &str = "18";
const ADMIN_GET_IP: &str = "19";
const ADMIN_BYPASS_TURN: &str = "20";
const ADMIN_RAW_MESSAGE: &str = "21";
const ADMIN_INDEFINITE_TURN: &str = "22";

/// An outbound instruction. `to_fields` is a pure mapping onto wire fields;
/// the server does all authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Nop,
    List,
    Connect(String),
    Rename(Option<String>),
    Chat(String),
    Xss(String),
    Turn(bool),
    Key { keysym: u32, down: bool },
    Mouse { x: u32, y: u32, mask: u8 },
    Vote(bool),
    Login(String),
    AccountLogin(String),
    QemuMonitor { node: String, command: String },
    Restore(String),
    Reboot(String),
    Ban(String),
    ForceVote(bool),
    Mute { username: String, state: MuteState },
    Kick(String),
    EndTurn(String),
    ClearQueue(String),
    RenameUser { old_name: String, new_name: String },
    GetIp(String),
    BypassTurn,
    IndefiniteTurn,
    /// Arbitrary admin instruction; `args` follow the `admin` tag verbatim.
    Admin(Vec<String>),
}

fn flag(b: bool) -> String {
    if b { "1" } else { "0" }.to_string()
}

fn admin<const N: usize>(args: [&str; N]) -> Vec<String> {
    std::iter::once("admin").chain(args).map(str::to_string).collect()
}

impl ClientCommand {
    pub fn to_fields(&self) -> Vec<String> {
        match self {
            ClientCommand::Nop => vec!["nop".into()],
            ClientCommand::List => vec!["list".into()],
            ClientCommand::Connect(node) => vec!["connect".into(), node.clone()],
            ClientCommand::Rename(None) => vec!["rename".into()],
            ClientCommand::Rename(Some(name)) => vec!["rename".into(), name.clone()],
            ClientCommand::Chat(msg) => vec!["chat".into(), msg.clone()],
            ClientCommand::Xss(msg) => admin([ADMIN_RAW_MESSAGE, msg.as_str()]),
            ClientCommand::Turn(take) => vec!["turn".into(), flag(*take)],
            ClientCommand::Key { keysym, down } => vec!["key".into(), keysym.to_string(), flag(*down)],
            ClientCommand::Mouse { x, y, mask } => {
                vec!["mouse".into(), x.to_string(), y.to_string(), mask.to_string()]
            }
            ClientCommand::Vote(yes) => vec!["vote".into(), flag(*yes)],
            ClientCommand::Login(password) => admin([ADMIN_LOGIN, password.as_str()]),
            ClientCommand::AccountLogin(token) => vec!["login".into(), token.clone()],
            ClientCommand::QemuMonitor { node, command } => admin([ADMIN_MONITOR, node.as_str(), command.as_str()]),
            ClientCommand::Restore(node) => admin([ADMIN_RESTORE, node.as_str()]),
            ClientCommand::Reboot(node) => admin([ADMIN_REBOOT, node.as_str()]),
            ClientCommand::Ban(user) => admin([ADMIN_BAN, user.as_str()]),
            ClientCommand::ForceVote(yes) => admin([ADMIN_FORCE_VOTE, flag(*yes).as_str()]),
            ClientCommand::Mute { username, state } => admin([ADMIN_MUTE, username.as_str(), state.as_wire()]),
            ClientCommand::Kick(user) => admin([ADMIN_KICK, user.as_str()]),
            ClientCommand::EndTurn(user) => admin([ADMIN_END_TURN, user.as_str()]),
            ClientCommand::ClearQueue(node) => admin([ADMIN_CLEAR_TURNS, node.as_str()]),
            ClientCommand::RenameUser { old_name, new_name } => admin([ADMIN_RENAME, old_name.as_str(), new_name.as_str()]),
            ClientCommand::GetIp(user) => admin([ADMIN_GET_IP, user.as_str()]),
            ClientCommand::BypassTurn => admin([ADMIN_BYPASS_TURN]),
            ClientCommand::IndefiniteTurn => admin([ADMIN_INDEFINITE_TURN]),
            ClientCommand::Admin(args) => std::iter::once("admin".to_string()).chain(args.iter().cloned()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(cmd: ClientCommand) -> Vec<String> {
        cmd.to_fields()
    }

    #[test]
    fn test_user_commands() {
        assert_eq!(fields(ClientCommand::Chat("hello".into())), ["chat", "hello"]);
        assert_eq!(fields(ClientCommand::Turn(true)), ["turn", "1"]);
        assert_eq!(fields(ClientCommand::Turn(false)), ["turn", "0"]);
        assert_eq!(fields(ClientCommand::Vote(false)), ["vote", "0"]);
        assert_eq!(fields(ClientCommand::Rename(None)), ["rename"]);
        assert_eq!(fields(ClientCommand::Rename(Some("bob".into()))), ["rename", "bob"]);
        assert_eq!(fields(ClientCommand::Connect("vm0".into())), ["connect", "vm0"]);
        assert_eq!(fields(ClientCommand::AccountLogin("tok".into())), ["login", "tok"]);
    }

    #[test]
    fn test_input_commands() {
        assert_eq!(fields(ClientCommand::Key { keysym: 0xffe3, down: true }), ["key", "65507", "1"]);
        assert_eq!(fields(ClientCommand::Mouse { x: 10, y: 20, mask: 1 }), ["mouse", "10", "20", "1"]);
    }

    #[test]
    fn test_admin_commands() {
        assert_eq!(fields(ClientCommand::Login("hunter2".into())), ["admin", "2", "hunter2"]);
        assert_eq!(fields(ClientCommand::Xss("<b>hi</b>".into())), ["admin", "21", "<b>hi</b>"]);
        assert_eq!(fields(ClientCommand::Restore("vm0".into())), ["admin", "8", "vm0"]);
        assert_eq!(fields(ClientCommand::Reboot("vm0".into())), ["admin", "10", "vm0"]);
        assert_eq!(fields(ClientCommand::Ban("eve".into())), ["admin", "12", "eve"]);
        assert_eq!(fields(ClientCommand::ForceVote(true)), ["admin", "13", "1"]);
        assert_eq!(
            fields(ClientCommand::Mute { username: "eve".into(), state: MuteState::Permanent }),
            ["admin", "14", "eve", "1"]
        );
        assert_eq!(fields(ClientCommand::Kick("eve".into())), ["admin", "15", "eve"]);
        assert_eq!(fields(ClientCommand::EndTurn("bob".into())), ["admin", "16", "bob"]);
        assert_eq!(fields(ClientCommand::ClearQueue("vm0".into())), ["admin", "17", "vm0"]);
        assert_eq!(
            fields(ClientCommand::RenameUser { old_name: "a".into(), new_name: "b".into() }),
            ["admin", "18", "a", "b"]
        );
        assert_eq!(fields(ClientCommand::GetIp("eve".into())), ["admin", "19", "eve"]);
        assert_eq!(fields(ClientCommand::BypassTurn), ["admin", "20"]);
        assert_eq!(fields(ClientCommand::IndefiniteTurn), ["admin", "22"]);
        assert_eq!(
            fields(ClientCommand::QemuMonitor { node: "vm0".into(), command: "info block".into() }),
            ["admin", "5", "vm0", "info block"]
        );
    }

    #[test]
    fn test_raw_admin_instruction() {
        assert_eq!(
            fields(ClientCommand::Admin(vec!["25".into(), "hello all".into()])),
            ["admin", "25", "hello all"]
        );
    }
}
