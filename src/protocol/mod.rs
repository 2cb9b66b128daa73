pub mod codec;
pub mod command;
pub mod message;

pub use codec::{decode, encode};
pub use command::ClientCommand;
pub use message::{LoginResult, RenameNotice, ServerMessage, TurnPush, VotePush};
