use super::types::ConsoleCommand;

pub fn parse_console_line(line: &str) -> Option<ConsoleCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(command) = line.strip_prefix('/') else {
        return Some(ConsoleCommand::Chat(line.to_string()));
    };
    // "//text" sends "/text" as chat
    if command.starts_with('/') {
        return Some(ConsoleCommand::Chat(command.to_string()));
    }

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match (name.to_lowercase().as_str(), arg) {
        ("turn", "") => Some(ConsoleCommand::Turn),
        ("endturn", "") => Some(ConsoleCommand::EndTurn),
        ("vote", arg) => match arg.to_lowercase().as_str() {
            "yes" | "y" => Some(ConsoleCommand::Vote(true)),
            "no" | "n" => Some(ConsoleCommand::Vote(false)),
            _ => None,
        },
        ("rename", "") => Some(ConsoleCommand::Rename(None)),
        ("rename", name) => Some(ConsoleCommand::Rename(Some(name.to_string()))),
        ("login", "") => None,
        ("login", password) => Some(ConsoleCommand::Login(password.to_string())),
        ("cad", "") => Some(ConsoleCommand::CtrlAltDel),
        ("key", arg) => parse_keysym(arg).map(ConsoleCommand::Key),
        ("users", "") => Some(ConsoleCommand::Users),
        ("quit", "") => Some(ConsoleCommand::Quit),
        _ => None,
    }
}

/// Decimal or `0x`-prefixed hex.
fn parse_keysym(arg: &str) -> Option<u32> {
    match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => arg.parse().ok(),
    }
}
