use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use talentlink_sync::api::events::{EventSink, SyncEvent};
use talentlink_sync::api::transport::StagedFile;
use talentlink_sync::shell::login;
use talentlink_sync::shell::navigation::LogNavigator;
use talentlink_sync::{AppConfig, Result, Shell};

#[derive(Parser)]
#[command(name = "talentlink", about = "TalentLink messaging and notifications")]
struct Cli {
    /// Overrides the configured API root.
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    Conversations,
    /// Print the message log with a peer.
    Thread { peer: i64 },
    Send {
        peer: i64,
        #[arg(long, default_value = "")]
        text: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Search { query: String },
    Notifications {
        #[arg(long)]
        mark_all_read: bool,
        #[arg(long)]
        clear_all: bool,
    },
    /// Open a notification and print where it leads.
    Open { id: i64 },
    /// Keep conversations and notifications in sync until Ctrl-C.
    Watch {
        /// Also follow the thread with this peer.
        #[arg(long)]
        peer: Option<i64>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if let Some(url) = cli.api_url {
        config.base_url = url;
    }

    if let Err(err) = talentlink_sync::utils::RUNTIME.block_on(run(cli.command, config)) {
        eprintln!("error: {}", err);
        if err.is_auth_expired() {
            eprintln!("run `talentlink login` to sign in again");
        }
        std::process::exit(1);
    }
}

async fn run(command: Command, config: AppConfig) -> Result<()> {
    let (events, mut rx) = EventSink::channel();
    let shell = Shell::connect(&config, Arc::new(LogNavigator), events)?;
    let api = shell.api().clone();

    match command {
        Command::Login { email, password } => {
            let user = login::sign_in(&api, &email, &password).await?;
            println!("Signed in as {} <{}>", user.display_name(), user.email);
        }
        Command::Logout => {
            login::sign_out(&api)?;
            println!("Signed out");
        }
        Command::Whoami => match api.session().current_user() {
            Some(user) if api.session().is_authenticated() => {
                println!("{} <{}> (id {})", user.display_name(), user.email, user.id)
            }
            _ => println!("Not signed in"),
        },
        Command::Conversations => {
            for c in shell.directory().list_conversations().await? {
                println!("{:>6}  {}  <{}>", c.peer_id, c.display_name, c.email);
            }
        }
        Command::Thread { peer } => {
            shell.open_conversation(peer).await?;
            let me = api.session().current_user().map(|u| u.id);
            for m in shell.thread().messages() {
                let who = if Some(m.sender) == me {
                    "me".to_string()
                } else {
                    m.sender_name.clone().unwrap_or_else(|| m.sender.to_string())
                };
                let clip = if m.has_attachment() { " [file]" } else { "" };
                println!("{}  {}: {}{}", m.created_at.format("%Y-%m-%d %H:%M"), who, m.content, clip);
            }
        }
        Command::Send { peer, text, file } => {
            let attachment = match file {
                Some(path) => Some(StagedFile::from_path(&path, config.max_attachment_bytes).await?),
                None => None,
            };
            shell.open_conversation(peer).await?;
            let sent = shell.thread().send(&text, attachment).await?;
            println!("Sent message {}", sent.id);
        }
        Command::Search { query } => {
            for u in api.search_users(&query).await? {
                println!("{:>6}  {}  <{}>", u.id, u.display_name(), u.email);
            }
        }
        Command::Notifications {
            mark_all_read,
            clear_all,
        } => {
            let feed = shell.notifications();
            feed.list().await?;
            if clear_all {
                feed.clear_all().await?;
            } else if mark_all_read {
                feed.mark_all_read().await?;
            }
            for n in feed.items() {
                let flag = if n.is_read { " " } else { "*" };
                println!("{} {:>6}  [{}] {}  {}", flag, n.id, n.payload.kind(), n.title, n.message);
            }
            println!("{} unread", feed.unread_count());
        }
        Command::Open { id } => {
            let target = shell.open_notification(id).await?;
            println!("{}", target);
        }
        Command::Watch { peer } => {
            shell.mount();
            if let Some(peer) = peer {
                shell.open_conversation(peer).await?;
            }
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = rx.recv() => match event {
                        Some(SyncEvent::SessionExpired) | None => break,
                        Some(event) => log::info!("{:?}", event),
                    },
                }
            }
            shell.unmount();
        }
    }
    Ok(())
}
