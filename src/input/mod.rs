pub mod parser;
pub mod types;

pub use parser::parse_console_line;
pub use types::ConsoleCommand;
