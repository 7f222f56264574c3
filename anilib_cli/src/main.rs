use anilib_cli::config::{self, AppConfig, ConfigManager, get_config};
use anilib_cli::hashing::Ed2kHasher;
use anilib_cli::sink::DocumentSink;
use anilib_core::handlers::{
    AddFileToMyList, DeleteFileFromMyList, DownloadImage, GetAnimeHttp, GetCalendar, GetEpisode,
    GetFile, GetReleaseGroup, GetUpdated, HashFile, SyncMyList, SyncVotes, VoteAnime,
};
use anilib_core::queue::Submitter;
use anilib_core::{
    Command, CommandPayload, CommandStore, Database, PauseReason, QueueName, RegistryEvent,
    Runtime, SqliteCommandStore,
};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "anilib")]
#[command(author, version, about = "Anime library manager - registry client and command queue", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process queued commands until interrupted
    Run,

    /// Inspect and modify the command queue
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum QueueCommand {
    /// Queue a command
    Add(AddArgs),

    /// List pending commands in execution order
    List {
        /// Only show one queue (general, hasher, images)
        #[arg(short, long)]
        queue: Option<QueueName>,

        /// Print commands as JSON
        #[arg(long)]
        json: bool,
    },

    /// Count pending commands per queue
    Count,

    /// Remove every pending command of a queue
    Clear {
        /// Queue to clear (general, hasher, images)
        #[arg(short, long)]
        queue: QueueName,
    },
}

#[derive(Args)]
struct AddArgs {
    /// Override the priority (lower runs first)
    #[arg(short, long, conflicts_with = "now")]
    priority: Option<u8>,

    /// Run ahead of background work
    #[arg(long)]
    now: bool,

    #[command(subcommand)]
    kind: AddCommand,
}

#[derive(Subcommand)]
enum AddCommand {
    /// Hash a local file and look it up
    Hash {
        path: PathBuf,

        /// Add the file to mylist once identified
        #[arg(long)]
        mylist: bool,
    },

    /// Look up a file by size and ed2k hash
    File { size: u64, ed2k: String },

    /// Add a file to mylist
    MylistAdd {
        size: u64,
        ed2k: String,

        /// Mark the entry as watched
        #[arg(long)]
        watched: bool,
    },

    /// Remove a file from mylist
    MylistDel { size: u64, ed2k: String },

    /// Vote on an anime (100-1000, 0 revokes)
    Vote { aid: u64, value: u16 },

    /// Fetch the release calendar
    Calendar,

    /// List anime updated since a unix timestamp
    Updated { since: i64 },

    /// Fetch a release group
    Group { gid: u64 },

    /// Fetch an episode
    Episode { eid: u64 },

    /// Fetch the full anime document
    Anime { aid: u64 },

    /// Download the mylist document
    SyncMylist,

    /// Download the votes document
    SyncVotes,

    /// Download an image
    Image {
        url: String,

        /// Target file; defaults to the URL's file name in the images directory
        dest: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        overwrite: bool,
    },
}

impl AddCommand {
    fn into_command(self, images_dir: &Path) -> anilib_core::Result<Command> {
        match self {
            AddCommand::Hash { path, mylist } => {
                let payload = HashFile::new(path);
                if mylist {
                    payload.and_add_to_mylist().into_command()
                } else {
                    payload.into_command()
                }
            }
            AddCommand::File { size, ed2k } => GetFile::new(size, ed2k).into_command(),
            AddCommand::MylistAdd {
                size,
                ed2k,
                watched,
            } => AddFileToMyList::new(size, ed2k)
                .watched(watched)
                .into_command(),
            AddCommand::MylistDel { size, ed2k } => {
                DeleteFileFromMyList::new(size, ed2k).into_command()
            }
            AddCommand::Vote { aid, value } => {
                let vote = VoteAnime::new(aid, value);
                vote.validate()?;
                vote.into_command()
            }
            AddCommand::Calendar => GetCalendar {}.into_command(),
            AddCommand::Updated { since } => GetUpdated { since }.into_command(),
            AddCommand::Group { gid } => GetReleaseGroup { gid }.into_command(),
            AddCommand::Episode { eid } => GetEpisode { eid }.into_command(),
            AddCommand::Anime { aid } => GetAnimeHttp { aid }.into_command(),
            AddCommand::SyncMylist => SyncMyList {}.into_command(),
            AddCommand::SyncVotes => SyncVotes {}.into_command(),
            AddCommand::Image {
                url,
                dest,
                overwrite,
            } => {
                let dest = dest.unwrap_or_else(|| images_dir.join(image_file_name(&url)));
                let mut download = DownloadImage::new(url, dest);
                download.overwrite = overwrite;
                download.into_command()
            }
        }
    }
}

/// Last path segment of an image URL, without query or fragment
fn image_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("image")
        .to_string()
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Interactive setup for registry credentials and client identity
    Init {
        /// Reconfigure even if already set up
        #[arg(short, long)]
        force: bool,
    },

    /// Get a configuration value
    Get {
        /// Configuration key (e.g., session.idle_logout_secs)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., registry.username)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration values
    List,

    /// Print the configuration file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on debug flag
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Info)
            .filter_module("anilib_core", log::LevelFilter::Debug)
            .filter_module("anilib_cli", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
        eprintln!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match cli.command {
        Commands::Run => {
            let config = get_config().context("Failed to load configuration")?;
            run_command(config).await?;
        }
        Commands::Queue { command } => {
            let config = get_config().context("Failed to load configuration")?;
            queue_command(config, command).await?;
        }
        Commands::Config { command } => {
            config_command(command)?;
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
        }
    }

    Ok(())
}

async fn open_store(config: &AppConfig) -> Result<Arc<SqliteCommandStore>> {
    let path = config.database_path();
    log::debug!("Opening queue database at {}", path.display());
    let db = Database::new(&path)
        .await
        .with_context(|| format!("Failed to open queue database {}", path.display()))?;
    Ok(Arc::new(SqliteCommandStore::new(db)))
}

async fn run_command(config: AppConfig) -> Result<()> {
    if !config.registry.has_credentials() {
        anyhow::bail!(
            "Registry credentials are not configured. Run '{}' first.",
            "anilib config init".bold()
        );
    }

    let core = config.core();
    let store = open_store(&config).await?;
    let sink = Arc::new(DocumentSink::new(config.documents_dir()));
    let runtime = Runtime::connect(&core, store, Arc::new(Ed2kHasher::new()), sink)
        .await
        .context("Failed to set up registry client")?;

    let events = runtime.events.subscribe();
    let printer = tokio::spawn(print_events(events));

    runtime.start();
    for status in runtime.queue.status().await? {
        eprintln!("{} queue: {} pending", status.queue, status.pending);
    }
    eprintln!("{}", "Processing commands, press Ctrl+C to stop".dimmed());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    eprintln!();
    eprintln!("{}", "Shutting down...".yellow());

    runtime.shutdown(core.queues.shutdown_grace()).await;
    printer.abort();

    let remaining = runtime.queue.count(None).await?;
    eprintln!("{} commands left pending", remaining);
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<RegistryEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => print_event(&event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                log::warn!("Missed {missed} events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &RegistryEvent) {
    match event {
        RegistryEvent::BanChanged {
            axis,
            banned: true,
            reason,
            expires_at,
        } => {
            let until = expires_at.map(|t| t.to_rfc3339()).unwrap_or_default();
            eprintln!(
                "{} {axis} banned until {until} ({})",
                "✗".red(),
                reason.as_deref().unwrap_or("no reason given")
            );
        }
        RegistryEvent::BanChanged {
            axis,
            banned: false,
            ..
        } => eprintln!("{} {axis} ban lifted", "✓".green()),
        RegistryEvent::BackoffChanged {
            axis,
            active: true,
            reason,
            until,
        } => {
            let until = until.map(|t| t.to_rfc3339()).unwrap_or_default();
            eprintln!(
                "{} {axis} backing off until {until} ({})",
                "!".yellow(),
                reason.as_deref().unwrap_or("server busy")
            );
        }
        RegistryEvent::BackoffChanged {
            axis,
            active: false,
            ..
        } => eprintln!("{} {axis} backoff ended", "✓".green()),
        RegistryEvent::LoginFailed { reason, retry_in } => eprintln!(
            "{} Login rejected: {reason} (retrying in {}s)",
            "✗".red(),
            retry_in.as_secs()
        ),
        RegistryEvent::LoggedIn => eprintln!("{} Logged in", "✓".green()),
        RegistryEvent::LoggedOut { forced } => {
            if *forced {
                eprintln!("{}", "Logged out after inactivity".dimmed());
            } else {
                eprintln!("{}", "Logged out".dimmed());
            }
        }
        RegistryEvent::QueuePaused { queue, reason } => match reason {
            PauseReason::Blocked { axes } => {
                eprintln!("{} {queue} queue paused, blocked on {axes:?}", "!".yellow())
            }
            PauseReason::Manual => eprintln!("{} {queue} queue paused", "!".yellow()),
        },
        RegistryEvent::QueueResumed { queue } => {
            eprintln!("{} {queue} queue resumed", "✓".green())
        }
        RegistryEvent::CommandFailed {
            identity, error, ..
        } => eprintln!("{} {identity} failed: {error}", "✗".red()),
    }
}

async fn queue_command(config: AppConfig, command: QueueCommand) -> Result<()> {
    let store = open_store(&config).await?;

    match command {
        QueueCommand::Add(args) => {
            let mut command = args.kind.into_command(&config.images_dir())?;
            if let Some(priority) = args.priority {
                command = command.with_priority(priority);
            } else if args.now {
                command = command.user_initiated();
            }

            let identity = command.identity.clone();
            let submitter = Submitter::new(store.clone());
            if submitter.submit(command).await? {
                println!("{} {identity}", "Queued".green());
            } else {
                println!("{} {identity}", "Already queued".yellow());
            }
        }
        QueueCommand::List { queue, json } => {
            let commands = store.list(queue).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&commands)?);
            } else if commands.is_empty() {
                eprintln!("No pending commands");
            } else {
                for command in commands {
                    println!(
                        "{:>3}  {:<8} {}  {}",
                        command.priority,
                        command.queue.to_string().cyan(),
                        command.identity,
                        command.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
                    );
                }
            }
        }
        QueueCommand::Count => {
            let mut total = 0;
            for queue in QueueName::ALL {
                let count = store.count(Some(queue)).await?;
                total += count;
                println!("{queue}: {count}");
            }
            println!("total: {total}");
        }
        QueueCommand::Clear { queue } => {
            let removed = store.clear(queue).await?;
            println!("Removed {removed} commands from the {queue} queue");
        }
    }

    store.database().close().await;
    Ok(())
}

fn config_command(command: ConfigCommand) -> Result<()> {
    let mut manager = ConfigManager::new();

    match command {
        ConfigCommand::Init { force } => {
            config::interactive_init(&mut manager, force)?;
        }
        ConfigCommand::Get { key } => match manager.get(&key) {
            Ok(value) => {
                println!("{value}");
            }
            Err(e) => {
                eprintln!("{}", format!("Error: {e}").red());
                std::process::exit(1);
            }
        },
        ConfigCommand::Set { key, value } => match manager.set(&key, &value) {
            Ok(()) => {
                let shown = if key.ends_with("password") {
                    "********"
                } else {
                    value.as_str()
                };
                eprintln!("{}", format!("Set {key} = {shown}").green());
                eprintln!(
                    "Configuration saved to: {}",
                    manager.get_config_path().display()
                );
            }
            Err(e) => {
                eprintln!("{}", format!("Error: {e}").red());
                std::process::exit(1);
            }
        },
        ConfigCommand::List => match manager.list() {
            Ok(items) => {
                eprintln!("{}", "Configuration:".bold().blue());
                eprintln!("Config file: {}", manager.get_config_path().display());
                eprintln!();

                let mut current_section = String::new();
                for (key, value) in items {
                    let (section, rest) = key.split_once('.').unwrap_or(("general", &key));
                    if section != current_section {
                        if !current_section.is_empty() {
                            eprintln!();
                        }
                        eprintln!("[{}]", section.yellow());
                        current_section = section.to_string();
                    }
                    eprintln!("  {} = {}", rest.cyan(), value);
                }
            }
            Err(e) => {
                eprintln!("{}", format!("Error: {e}").red());
                std::process::exit(1);
            }
        },
        ConfigCommand::Path => {
            println!("{}", manager.get_config_path().display());
        }
    }

    Ok(())
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_file_name() {
        assert_eq!(image_file_name("https://cdn.example/images/main/1234.jpg"), "1234.jpg");
        assert_eq!(image_file_name("https://cdn.example/a/5.png?size=large#x"), "5.png");
        assert_eq!(image_file_name("https://cdn.example/dir/"), "dir");
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }
}
