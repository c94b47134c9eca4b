//! Phi - terminal operator console for the Zeus pack robots
//!
//! Reads line commands from stdin and prints console log events as they
//! arrive. `keys` switches to raw key mode for driving the selected robot.

mod command;
mod keys;

use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use command::{Command, HELP};
use phi_core::{Config, Console, LogEvent, Outcome, SYSTEM_CHANNEL};

#[derive(Parser)]
#[command(name = "phi")]
#[command(version, about = "Operator console for the Zeus robot pack")]
struct Args {
    /// Database file (defaults to the platform data directory)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Router URL, saved to settings
    #[arg(long)]
    url: Option<String>,

    /// Realm, saved to settings
    #[arg(long)]
    realm: Option<String>,

    /// Connect on startup
    #[arg(long, short)]
    connect: bool,
}

/// Write one line; raw key mode needs the explicit carriage return
fn print_line(line: impl std::fmt::Display) {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "{}\r\n", line);
    let _ = out.flush();
}

fn render(event: &LogEvent) -> String {
    format!(
        "{} [{}] {:<5} {}",
        event.display_time(),
        event.channel,
        event.level.as_str(),
        event.message
    )
}

fn print_status(console: &Console) {
    print_line(format!("connection: {}", console.state()));
    print_line(format!("controlling: {}", console.selected()));
    for target in console.targets() {
        let presence = if target.connected { "online" } else { "offline" };
        print_line(format!(
            "  {} ({}) {}  vector {:.2}/{:.2}  head {:.1}/{:.1}",
            target.id,
            target.authid,
            presence,
            target.motion.linear,
            target.motion.angular,
            target.pose.yaw,
            target.pose.pitch
        ));
    }
    for decision in console.pending_decisions() {
        print_line(format!(
            "decision #{}: {} {} (yes/no)",
            decision.id, decision.header, decision.content
        ));
    }
}

fn print_log(console: &Console, channel: Option<&str>) {
    let sink = console.sink();
    match channel {
        Some(channel) => {
            for event in sink.events(channel) {
                print_line(render(&event));
            }
            sink.mark_read(channel);
        }
        None => {
            for channel in sink.channels() {
                print_line(format!(
                    "  {:<8} {} events, {} unread",
                    channel,
                    sink.events(&channel).len(),
                    sink.unread(&channel)
                ));
            }
        }
    }
}

fn report(outcome: &Outcome) {
    if let Outcome::Executed(value) = outcome {
        if !value.is_boolean() {
            print_line(format!("-> {}", value));
        }
    }
}

/// Run one command; returns false when the console should exit
async fn execute(console: &Console, command: Command) -> Result<bool> {
    match command {
        Command::Connect => {
            console.connect()?;
        }
        Command::Disconnect => {
            if !console.disconnect() {
                print_line("Not connected.");
            }
        }
        Command::Status => print_status(console),
        Command::Select(word) => {
            console.select(&word)?;
        }
        Command::Call { operation, args } => report(&console.call(operation, args).await?),
        Command::Vector(linear, angular) => report(&console.set_vector(linear, angular).await),
        Command::Head(yaw, pitch) => report(&console.set_head(yaw, pitch).await),
        Command::Say(phrase) => {
            for outcome in console.say(&phrase).await? {
                report(&outcome);
            }
        }
        Command::Keys => {
            print_line("Key mode: W/S/A/D move, arrows turn the head, Esc leaves.");
            keys::run(console).await?;
        }
        Command::Decide(answer) => {
            let decision = console.decide(answer)?;
            print_line(format!(
                "Answered {} to '{}'.",
                if answer { "yes" } else { "no" },
                decision.header
            ));
        }
        Command::Log(channel) => print_log(console, channel.as_deref()),
        Command::Clear { channel, archived } => {
            let removed = console.clear_log(&channel, archived);
            if archived {
                print_line(format!("Removed {} archived events.", removed));
            }
        }
        Command::Archive(limit) => {
            for event in console.archived(limit) {
                print_line(format!(
                    "{} [{}] {:<5} {}",
                    event.logged_at.format("%Y-%m-%d %H:%M:%S"),
                    event.channel,
                    event.level,
                    event.message
                ));
            }
        }
        Command::Reset => console.reset_comm()?,
        Command::Help => print_line(HELP),
        Command::Quit => return Ok(false),
    }

    Ok(true)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::default();
    if let Some(path) = args.database {
        config.database_path = path;
    }
    if let Some(dir) = config.database_path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    phi_core::init_logging_with(&config.log_filter);

    let console = Console::new(config)?;

    if args.url.is_some() || args.realm.is_some() {
        let mut settings = console.settings();
        if let Some(url) = args.url {
            settings.comm.url = url;
        }
        if let Some(realm) = args.realm {
            settings.comm.realm = realm;
        }
        console.update_settings(settings)?;
    }

    let mut events = console.sink().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_line(render(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Log printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    console.start();
    tracing::info!("Phi console started");

    if args.connect {
        console.connect()?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                print_line(e);
                continue;
            }
        };

        match execute(&console, command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                console.sink().error(SYSTEM_CHANNEL, format!("{}.", e));
            }
        }
    }

    console.disconnect();
    // Let the goodbye reach the router
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    tracing::info!("Phi console stopped");

    Ok(())
}
