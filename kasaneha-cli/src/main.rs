//! kasaneha-cli — terminal front end for the Kasaneha diary
//!
//! Drives the same stores a graphical client would: the auth store resolves the
//! saved token at start-up, the chat store owns today's conversation, and every
//! outcome is mirrored into the notification store, whose active entries are
//! printed to stderr before exit.
//!
//! # Subcommands
//! - `login <username>` / `register <username>` / `logout` / `whoami`
//! - `today`, `send <text>`, `complete`         — today's diary session
//! - `sessions`, `show <id>`, `stats <id>`       — past sessions
//! - `analysis <id>`, `scores`, `insights`, `history`, `calendar <y> <m>`
//! - `health`

use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use chrono::Local;
use clap::{Parser, Subcommand};
use kasaneha_core::api::{DEFAULT_INSIGHT_DAYS, DEFAULT_SCORE_DAYS};
use kasaneha_core::models::{Message, Sender, SessionListQuery};
use kasaneha_core::{ApiClient, FileStorage, KasanehaConfig, Navigator, LOGIN_PATH};
use kasaneha_stores::{AuthStore, ChatStore, Notification, NotificationKind, NotificationStore};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "kasaneha-cli", version, about = "Kasaneha diary from the terminal")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "kasaneha.toml")]
    config: String,

    /// API base URL (overrides the config file)
    #[arg(long, env = "KASANEHA_API_BASE_URL")]
    server: Option<String>,

    /// Print raw JSON responses instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check that the API is reachable
    Health,

    /// Sign in and remember the token
    Login {
        username: String,

        #[arg(long, env = "KASANEHA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and sign in
    Register {
        username: String,

        #[arg(long, env = "KASANEHA_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        email: Option<String>,
    },

    /// Forget the saved token
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Open (or start) today's session and print the conversation
    Today,

    /// Write to today's session and print the reply
    Send {
        /// Message text
        content: String,
    },

    /// Close today's session
    Complete,

    /// Print the conversation of a past session
    Show { session_id: String },

    /// List past sessions
    Sessions {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
    },

    /// Message count and duration of a session
    Stats { session_id: String },

    /// Show (or with --trigger, request) the analysis of a session
    Analysis {
        session_id: String,

        #[arg(long)]
        trigger: bool,
    },

    /// Tension scores over the last N days
    Scores {
        #[arg(long, default_value_t = DEFAULT_SCORE_DAYS)]
        days: u32,
    },

    /// Insights over the last N days
    Insights {
        #[arg(long, default_value_t = DEFAULT_INSIGHT_DAYS)]
        days: u32,
    },

    /// Analysis history
    History {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
    },

    /// Month overview
    Calendar { year: i32, month: u32 },
}

impl Commands {
    /// The view this command stands for, as seen by the navigator.
    fn view(&self) -> &'static str {
        match self {
            Commands::Login { .. } | Commands::Register { .. } => LOGIN_PATH,
            Commands::Today | Commands::Send { .. } | Commands::Complete => "/chat",
            Commands::Show { .. } | Commands::Sessions { .. } | Commands::Stats { .. } => "/history",
            Commands::Analysis { .. }
            | Commands::Scores { .. }
            | Commands::Insights { .. }
            | Commands::History { .. } => "/analysis",
            Commands::Calendar { .. } => "/calendar",
            Commands::Health | Commands::Logout | Commands::Whoami => "/",
        }
    }

    fn requires_user(&self) -> bool {
        !matches!(
            self,
            Commands::Health
                | Commands::Login { .. }
                | Commands::Register { .. }
                | Commands::Logout
        )
    }
}

// ============================================================================
// Terminal navigation
// ============================================================================

/// Navigator for a one-shot terminal command: "redirecting" to the login view
/// means telling the user to sign in again.
struct TerminalNavigator {
    view: Mutex<String>,
}

impl TerminalNavigator {
    fn new(view: &str) -> Self {
        Self {
            view: Mutex::new(view.to_string()),
        }
    }
}

impl Navigator for TerminalNavigator {
    fn current_path(&self) -> Option<String> {
        self.view.lock().ok().map(|v| v.clone())
    }

    fn redirect(&self, path: &str) {
        if let Ok(mut view) = self.view.lock() {
            *view = path.to_string();
        }
        if path == LOGIN_PATH {
            eprintln!("kasaneha-cli: session expired, sign in again with `kasaneha-cli login <username>`");
        }
    }
}

// ============================================================================
// Output
// ============================================================================

fn format_message(m: &Message) -> String {
    let who = match m.sender {
        Sender::User => "you",
        Sender::Ai => "kasaneha",
    };
    let time = m.created_at.with_timezone(&Local).format("%H:%M");
    let marker = if m.is_pending() { " (sending)" } else { "" };
    format!("[{}] {}{}: {}", time, who, marker, m.content)
}

fn format_notification(n: &Notification) -> String {
    let label = match n.kind {
        NotificationKind::Success => "ok",
        NotificationKind::Error => "error",
        NotificationKind::Warning => "warning",
        NotificationKind::Info => "info",
    };
    format!("kasaneha-cli [{}]: {}", label, n.message)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_conversation(chat: &ChatStore) {
    let state = chat.snapshot();
    if let Some(session) = &state.current_session {
        let status = if session.is_completed() { "completed" } else { "active" };
        println!(
            "Session {} ({}, {})\n",
            session.id,
            session.session_date.format("%Y-%m-%d"),
            status
        );
    }
    for m in &state.messages {
        println!("{}", format_message(m));
    }
}

// ============================================================================
// Commands
// ============================================================================

struct App {
    api: Arc<ApiClient>,
    auth: AuthStore,
    chat: ChatStore,
    notifications: NotificationStore,
    json: bool,
}

impl App {
    async fn run(&self, command: Commands) -> anyhow::Result<()> {
        // Start-up resolution of the stored token must settle before any
        // account command touches the same state.
        if !matches!(command, Commands::Health) {
            self.auth.wait_initialized().await;
        }
        if command.requires_user() {
            if !self.auth.is_authenticated() {
                if let Some(error) = self.auth.error() {
                    bail!("not signed in: {}", error);
                }
                bail!("not signed in, run `kasaneha-cli login <username>` first");
            }
        }

        match command {
            Commands::Health => {
                let body = self.api.health().await?;
                println!("Kasaneha API ({}): {}", self.api.base_url(), body.trim());
            }
            Commands::Login { username, password } => {
                let response = self.auth.login(&username, &password).await?;
                self.notifications
                    .success(format!("Signed in as {}", response.user.username), None);
            }
            Commands::Register {
                username,
                password,
                email,
            } => {
                let response = self
                    .auth
                    .register(&username, &password, email.as_deref())
                    .await?;
                self.notifications
                    .success(format!("Welcome, {}!", response.user.username), None);
            }
            Commands::Logout => {
                self.auth.logout();
                self.notifications.success("Signed out", None);
            }
            Commands::Whoami => {
                let user = self.auth.user().context("no user loaded")?;
                if self.json {
                    return print_json(&user);
                }
                println!("{} ({})", user.username, user.id);
                if let Some(email) = &user.email {
                    println!("Email:    {}", email);
                }
                println!("Timezone: {}", user.timezone);
            }
            Commands::Today => {
                self.chat.load_today_session().await?;
                if self.json {
                    return print_json(&self.chat.messages());
                }
                print_conversation(&self.chat);
            }
            Commands::Send { content } => self.send(&content).await?,
            Commands::Complete => {
                self.chat.load_today_session().await?;
                if self.chat.current_session().is_some_and(|s| s.is_completed()) {
                    self.notifications
                        .warning("Today's session is already completed", None);
                    return Ok(());
                }
                self.chat.complete_session().await?;
                self.notifications
                    .success("Session completed, analysis will follow", None);
            }
            Commands::Show { session_id } => {
                self.chat.load_session_messages(&session_id).await?;
                if self.json {
                    return print_json(&self.chat.messages());
                }
                print_conversation(&self.chat);
            }
            Commands::Sessions {
                limit,
                offset,
                year,
                month,
            } => {
                let query = SessionListQuery {
                    limit,
                    offset,
                    year,
                    month,
                };
                let response = self.api.get_user_sessions(&query).await?;
                if self.json {
                    return print_json(&response);
                }
                for s in &response.sessions {
                    println!(
                        "{}  {}  {:?}  {} messages{}",
                        s.date,
                        s.id,
                        s.status,
                        s.message_count,
                        if s.has_analysis { "  analysed" } else { "" }
                    );
                }
                println!(
                    "\n{} of {} (offset {})",
                    response.sessions.len(),
                    response.pagination.total,
                    response.pagination.offset
                );
            }
            Commands::Stats { session_id } => {
                let stats = self.api.get_session_stats(&session_id).await?;
                if self.json {
                    return print_json(&stats);
                }
                println!("Status:   {:?}", stats.status);
                println!("Messages: {}", stats.message_count);
                if let Some(minutes) = stats.duration_minutes {
                    println!("Duration: {:.0} min", minutes);
                }
            }
            Commands::Analysis {
                session_id,
                trigger,
            } => {
                let response = if trigger {
                    self.api.trigger_session_analysis(&session_id).await?
                } else {
                    self.api.get_session_analysis(&session_id).await?
                };
                if self.json {
                    return print_json(&response);
                }
                let a = &response.analysis;
                println!("{}\n", a.summary);
                println!(
                    "Emotion:  {} ({:.0}%)",
                    a.emotional_state.primary_emotion,
                    a.emotional_state.confidence * 100.0
                );
                println!("Tension:  {}", a.tension_score);
                if !a.keywords.is_empty() {
                    println!("Keywords: {}", a.keywords.join(", "));
                }
            }
            Commands::Scores { days } => {
                let response = self.api.get_tension_scores(days).await?;
                if self.json {
                    return print_json(&response);
                }
                for s in &response.scores {
                    println!("{}  {:>3}  ({:+})", s.date, s.tension_score, s.relative_score);
                }
                let st = &response.statistics;
                println!(
                    "\naverage {:.1}, min {}, max {}, trend {:?}",
                    st.average, st.min, st.max, st.trend
                );
            }
            Commands::Insights { days } => {
                let response = self.api.get_analysis_insights(days).await?;
                if self.json {
                    return print_json(&response);
                }
                for i in &response.insights {
                    println!("[{}] {}: {}", i.level, i.kind, i.message);
                }
            }
            Commands::History { limit, offset } => {
                let response = self.api.get_analysis_history(limit, offset).await?;
                if self.json {
                    return print_json(&response);
                }
                println!("{}", response.message);
            }
            Commands::Calendar { year, month } => {
                let response = self.api.get_calendar_data(year, month).await?;
                if self.json {
                    return print_json(&response);
                }
                for day in &response.month_data.days {
                    if !day.has_session {
                        continue;
                    }
                    let score = day
                        .tension_score
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{}  tension {:>3}  {}",
                        day.date,
                        score,
                        day.status.as_deref().unwrap_or("")
                    );
                }
            }
        }
        Ok(())
    }

    /// Optimistic send: the text is shown as pending right away and rolled
    /// back if the server rejects it.
    async fn send(&self, content: &str) -> anyhow::Result<()> {
        if content.trim().is_empty() {
            bail!("message is empty");
        }

        self.chat.load_today_session().await?;
        let session = self
            .chat
            .current_session()
            .context("no session for today")?;
        if session.is_completed() {
            self.notifications
                .warning("Today's session is already completed", None);
            return Ok(());
        }

        let pending = Message::pending(&session.id, Sender::User, content);
        if !self.json {
            println!("{}", format_message(&pending));
        }
        self.chat.add_message(pending);

        match self.chat.send_message(content).await {
            Ok(response) => {
                if self.json {
                    return print_json(&response);
                }
                println!("{}", format_message(&response.ai_response));
                Ok(())
            }
            Err(e) => {
                self.chat.remove_temp_messages();
                Err(e.into())
            }
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match KasanehaConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("kasaneha-cli: failed to load config from {}: {}", cli.config, e);
            std::process::exit(1);
        }
    };
    if let Some(server) = &cli.server {
        config.api.base_url = server.clone();
    }

    let storage = Arc::new(FileStorage::new(config.storage.token_dir()));
    let navigator = Arc::new(TerminalNavigator::new(cli.command.view()));
    let api = match ApiClient::new(&config.api, storage, navigator) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            eprintln!("kasaneha-cli: failed to create API client: {}", e);
            std::process::exit(1);
        }
    };

    let app = App {
        auth: AuthStore::start(api.clone()),
        chat: ChatStore::new(api.clone()),
        notifications: NotificationStore::with_default_duration(
            config.notifications.default_duration(),
        ),
        api,
        json: cli.json,
    };

    let result = app.run(cli.command).await;
    if let Err(e) = &result {
        app.notifications.error(e.to_string(), None);
    }

    for n in app.notifications.snapshot() {
        eprintln!("{}", format_notification(&n));
    }

    if result.is_err() {
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
