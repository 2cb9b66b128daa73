use anyhow::Context;
use collabvm_client::{
    client::events::{Event, EventKind},
    config::Config,
    input::{parse_console_line, ConsoleCommand},
    VmClient,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::{signal, sync::mpsc};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".into());
    let config = Config::from_file(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;

    let client = VmClient::from_config(&config);
    log_events(&client);

    if let Some(token) = config.client.session_token.clone() {
        let weak = client.downgrade();
        client.on(EventKind::Auth, move |_| {
            if let Some(client) = weak.upgrade() {
                client.login_account(&token);
            }
        });
    }

    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
    client.on(EventKind::Close, move |_| {
        let _ = closed_tx.send(());
    });

    client.open().await;
    if !client.is_open() {
        anyhow::bail!("could not connect to {}", config.server.url);
    }

    let node = &config.server.node;
    let joined = client
        .connect(node, config.client.username.as_deref())
        .await
        .with_context(|| format!("failed to join {node}"))?;
    if !joined {
        client.close();
        anyhow::bail!("server refused to join {node}");
    }
    tracing::info!("joined {node} as {}", client.username().unwrap_or_default());

    if let Some(password) = &config.client.password {
        client.login(password);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if !run_console_command(&client, &line) {
                    break;
                }
            }
            _ = closed_rx.recv() => {
                tracing::warn!("server closed the connection");
                return Ok(());
            }
            _ = signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    client.close();
    Ok(())
}

/// Returns false when the console asked to quit.
fn run_console_command(client: &VmClient, line: &str) -> bool {
    let Some(command) = parse_console_line(line) else {
        if !line.trim().is_empty() {
            eprintln!("unknown command: {}", line.trim());
        }
        return true;
    };
    match command {
        ConsoleCommand::Chat(text) => client.chat(&text),
        ConsoleCommand::Turn => client.turn(true),
        ConsoleCommand::EndTurn => client.turn(false),
        ConsoleCommand::Vote(yes) => client.vote(yes),
        ConsoleCommand::Rename(name) => client.rename(name.as_deref()),
        ConsoleCommand::Login(password) => client.login(&password),
        ConsoleCommand::CtrlAltDel => client.ctrl_alt_del(),
        ConsoleCommand::Key(keysym) => {
            client.key(keysym, true);
            client.key(keysym, false);
        }
        ConsoleCommand::Users => {
            for user in client.users() {
                let turn = match user.turn {
                    0 => " (turn)".to_string(),
                    n if n > 0 => format!(" (queue #{n})"),
                    _ => String::new(),
                };
                println!("  {} [{:?}]{turn}", user.username, user.rank);
            }
        }
        ConsoleCommand::Quit => return false,
    }
    true
}

fn log_events(client: &VmClient) {
    client.on(EventKind::Chat, |event| {
        if let Event::Chat { username, message } = event {
            let ts = chrono::Local::now().format("%H:%M:%S");
            if username.is_empty() {
                println!("[{ts}] * {message}");
            } else {
                println!("[{ts}] <{username}> {message}");
            }
        }
    });
    client.on(EventKind::AddUser, |event| {
        if let Event::AddUser(user) = event {
            tracing::info!("{} joined ({:?})", user.username, user.rank);
        }
    });
    client.on(EventKind::RemUser, |event| {
        if let Event::RemUser(user) = event {
            tracing::info!("{} left", user.username);
        }
    });
    client.on(EventKind::Rename, |event| {
        if let Event::Rename { old_name, new_name, is_self } = event {
            if *is_self {
                tracing::info!("you are now known as {new_name}");
            } else {
                tracing::info!("{old_name} is now known as {new_name}");
            }
        }
    });
    client.on(EventKind::RenameStatus, |event| {
        if let Event::RenameStatus(status) = event {
            tracing::warn!("rename rejected: {status:?}");
        }
    });
    client.on(EventKind::Turn, |event| {
        if let Event::Turn(status) = event {
            let active = status.active.as_ref().map_or("nobody", |u| u.username.as_str());
            tracing::info!("turn: {active}, {} waiting", status.queue.len());
        }
    });
    client.on(EventKind::Vote, |event| {
        if let Event::Vote(vote) = event {
            tracing::info!("reset vote: {} yes / {} no, {:?} left", vote.yes, vote.no, vote.time_left);
        }
    });
    client.on(EventKind::VoteEnd, |_| tracing::info!("reset vote ended"));
    client.on(EventKind::VoteCooldown, |event| {
        if let Event::VoteCooldown(secs) = event {
            tracing::info!("vote cooldown, {secs}s until another vote");
        }
    });
    client.on(EventKind::Login, |event| {
        if let Event::Login { rank, .. } = event {
            tracing::info!("logged in as {rank:?}");
        }
    });
    client.on(EventKind::BadPassword, |_| tracing::warn!("login failed: bad password"));
    client.on(EventKind::AccountLoginFailed, |event| {
        if let Event::AccountLoginFailed(reason) = event {
            tracing::warn!("account login failed: {}", reason.as_deref().unwrap_or("no reason given"));
        }
    });
}
