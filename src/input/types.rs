/// A line typed at the console, already interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Chat(String),
    /// Join the turn queue.
    Turn,
    /// Give up the turn or leave the queue.
    EndTurn,
    Vote(bool),
    Rename(Option<String>),
    Login(String),
    CtrlAltDel,
    /// Press and release one keysym.
    Key(u32),
    Users,
    Quit,
}
