use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use scholarix::api::{ApiClient, ApiError, CallInput, LeadInput};
use scholarix::auth::TokenStore;
use scholarix::coach::{CoachError, ObjectionCoach, OllamaGenerator};
use scholarix::config::ConfigError;
use scholarix::envelope::CodecError;
use scholarix::realtime::{Broadcaster, Connection, Notifications, Presence};
use scholarix::simulation::{CallScript, CallSimulation, QualificationItem};
use scholarix::storage::{LocalStore, StoreError};
use scholarix::transport::ws::WsTransport;
use scholarix::{Config, ConnectionStatus, MessageKind, Transport, TransportError};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const CONNECT_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("realtime error: {0}")]
    Transport(#[from] TransportError),
    #[error("coach setup failed: {0}")]
    Coach(#[from] CoachError),
    #[error("{0}")]
    Kind(#[from] CodecError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("timed out waiting for the realtime connection")]
    ConnectTimeout,
    #[error("broadcast dropped: connection is not open")]
    NotSent,
}

#[derive(Parser, Debug)]
#[command(name = "scholarix", about = "Scholarix API, realtime and coaching CLI")]
struct Cli {
    #[arg(long, env = "SCHOLARIX_API_URL", global = true)]
    api_url: Option<String>,

    #[arg(long, env = "SCHOLARIX_WS_URL", global = true)]
    ws_url: Option<String>,

    #[arg(long, env = "SCHOLARIX_STORE_PATH", global = true)]
    store: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long, env = "SCHOLARIX_EMAIL")]
        email: String,
        #[arg(long, env = "SCHOLARIX_PASSWORD")]
        password: String,
    },
    Logout,
    Me,
    Leads(LeadsCommand),
    Calls(CallsCommand),
    /// Dashboard counters.
    Stats,
    Metrics {
        user_id: String,
    },
    Activity,
    /// Stream realtime events until Ctrl-C.
    Watch,
    Broadcast {
        #[arg(long)]
        kind: String,
        #[arg(long, default_value = "{}")]
        payload: String,
    },
    /// Ask the AI coach how to answer an objection.
    Objection {
        text: Option<String>,
        #[arg(long)]
        context: Option<String>,
        /// Print the built-in practice objections instead.
        #[arg(long, default_value_t = false)]
        list: bool,
    },
    Notes(NotesCommand),
    Recordings,
    AutoDownload {
        state: Toggle,
    },
    /// Print the call simulation script rendered for a lead.
    Script(ScriptArgs),
}

#[derive(Args, Debug)]
struct LeadsCommand {
    #[command(subcommand)]
    command: LeadsSubcommand,
}

#[derive(Args, Debug, Default)]
struct LeadFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

impl From<LeadFields> for LeadInput {
    fn from(fields: LeadFields) -> Self {
        Self {
            name: fields.name,
            email: fields.email,
            phone: fields.phone,
            company: fields.company,
            status: fields.status,
            notes: fields.notes,
            ..Self::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum LeadsSubcommand {
    List,
    Get {
        id: String,
    },
    Create {
        #[command(flatten)]
        fields: LeadFields,
    },
    Update {
        id: String,
        #[command(flatten)]
        fields: LeadFields,
    },
    Delete {
        id: String,
    },
}

#[derive(Args, Debug)]
struct CallsCommand {
    #[command(subcommand)]
    command: CallsSubcommand,
}

#[derive(Subcommand, Debug)]
enum CallsSubcommand {
    List {
        #[arg(long)]
        lead: Option<String>,
    },
    Get {
        id: String,
    },
    Create {
        #[arg(long)]
        lead_id: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        outcome: Option<String>,
        #[arg(long)]
        duration: Option<u64>,
    },
    Delete {
        id: String,
    },
}

#[derive(Args, Debug)]
struct NotesCommand {
    #[command(subcommand)]
    command: NotesSubcommand,
}

#[derive(Subcommand, Debug)]
enum NotesSubcommand {
    Get { call_id: String },
    Set { call_id: String, text: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Args, Debug)]
struct ScriptArgs {
    #[arg(long, default_value = "there")]
    lead_name: String,
    #[arg(long, env = "SCHOLARIX_REP_NAME", default_value = "your rep")]
    rep_name: String,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    product: Option<String>,
}

struct CliContext {
    config: Config,
    store: Arc<LocalStore>,
}

impl CliContext {
    fn api(&self) -> Result<ApiClient, CliError> {
        Ok(ApiClient::new(&self.config, Arc::clone(&self.store) as Arc<dyn TokenStore>)?)
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url.trim_end_matches('/').to_owned();
    }
    if let Some(ws_url) = cli.ws_url {
        config.realtime.ws_url = ws_url;
    }
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    let store = Arc::new(LocalStore::open(&config.store_path)?);
    let ctx = CliContext { config, store };

    match cli.command {
        Command::Login { email, password } => {
            let response = ctx.api()?.login(&email, &password).await?;
            eprintln!("logged in as {}", response.user.email);
            print_json(&serde_json::to_value(&response.user)?)
        }
        Command::Logout => {
            ctx.api()?.logout().await?;
            eprintln!("logged out");
            Ok(())
        }
        Command::Me => print_json(&serde_json::to_value(ctx.api()?.me().await?)?),
        Command::Leads(leads) => run_leads(&ctx, leads).await,
        Command::Calls(calls) => run_calls(&ctx, calls).await,
        Command::Stats => print_json(&serde_json::to_value(ctx.api()?.dashboard_stats().await?)?),
        Command::Metrics { user_id } => {
            print_json(&serde_json::to_value(ctx.api()?.performance_metrics(&user_id).await?)?)
        }
        Command::Activity => print_json(&serde_json::to_value(ctx.api()?.list_activity().await?)?),
        Command::Watch => run_watch(&ctx).await,
        Command::Broadcast { kind, payload } => run_broadcast(&ctx, &kind, &payload).await,
        Command::Objection { text, context, list } => run_objection(&ctx, text, context, list).await,
        Command::Notes(notes) => run_notes(&ctx, notes),
        Command::Recordings => print_json(&serde_json::to_value(ctx.store.recordings())?),
        Command::AutoDownload { state } => {
            ctx.store.set_auto_download(matches!(state, Toggle::On))?;
            println!("auto-download {}", if ctx.store.auto_download() { "on" } else { "off" });
            Ok(())
        }
        Command::Script(args) => {
            run_script(args);
            Ok(())
        }
    }
}

async fn run_leads(ctx: &CliContext, leads: LeadsCommand) -> Result<(), CliError> {
    let api = ctx.api()?;
    match leads.command {
        LeadsSubcommand::List => print_json(&serde_json::to_value(api.list_leads().await?)?),
        LeadsSubcommand::Get { id } => print_json(&serde_json::to_value(api.get_lead(&id).await?)?),
        LeadsSubcommand::Create { fields } => {
            print_json(&serde_json::to_value(api.create_lead(&fields.into()).await?)?)
        }
        LeadsSubcommand::Update { id, fields } => {
            print_json(&serde_json::to_value(api.update_lead(&id, &fields.into()).await?)?)
        }
        LeadsSubcommand::Delete { id } => {
            api.delete_lead(&id).await?;
            eprintln!("deleted lead {id}");
            Ok(())
        }
    }
}

async fn run_calls(ctx: &CliContext, calls: CallsCommand) -> Result<(), CliError> {
    let api = ctx.api()?;
    match calls.command {
        CallsSubcommand::List { lead: Some(lead_id) } => {
            print_json(&serde_json::to_value(api.list_calls_for_lead(&lead_id).await?)?)
        }
        CallsSubcommand::List { lead: None } => print_json(&serde_json::to_value(api.list_calls().await?)?),
        CallsSubcommand::Get { id } => print_json(&serde_json::to_value(api.get_call(&id).await?)?),
        CallsSubcommand::Create { lead_id, status, outcome, duration } => {
            let input = CallInput { lead_id: Some(lead_id), status, outcome, duration, notes: None };
            print_json(&serde_json::to_value(api.create_call(&input).await?)?)
        }
        CallsSubcommand::Delete { id } => {
            api.delete_call(&id).await?;
            eprintln!("deleted call {id}");
            Ok(())
        }
    }
}

fn run_notes(ctx: &CliContext, notes: NotesCommand) -> Result<(), CliError> {
    match notes.command {
        NotesSubcommand::Get { call_id } => {
            println!("{}", ctx.store.call_notes(&call_id).unwrap_or_default());
        }
        NotesSubcommand::Set { call_id, text } => {
            ctx.store.set_call_notes(&call_id, &text)?;
        }
    }
    Ok(())
}

// =============================================================================
// REALTIME
// =============================================================================

fn connection(ctx: &CliContext) -> Connection {
    let transport = Arc::new(WsTransport::new(ctx.config.realtime.reconnect)) as Arc<dyn Transport>;
    Connection::new(transport, Arc::clone(&ctx.store) as Arc<dyn TokenStore>, ctx.config.realtime.clone())
}

async fn wait_connected(connection: &Connection) -> Result<(), CliError> {
    let mut status = connection.watch_status();
    tokio::time::timeout(CONNECT_WAIT, status.wait_for(|s| s.is_connected()))
        .await
        .map_err(|_| CliError::ConnectTimeout)?
        .map_err(|_| CliError::ConnectTimeout)?;
    Ok(())
}

async fn run_watch(ctx: &CliContext) -> Result<(), CliError> {
    let connection = connection(ctx);
    let presence = Presence::attach(&connection);
    let notifications = Notifications::attach(&connection);
    let _printer = connection.subscribe(MessageKind::ALL, |_, envelope| match serde_json::to_string(envelope) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "failed to render envelope"),
    });
    connection.init().await?;

    let mut status = connection.watch_status();
    let mut online = presence.watch();
    let mut inbox = notifications.watch();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Ok(()) = status.changed() => {
                let current: ConnectionStatus = *status.borrow_and_update();
                eprintln!("status: {current}");
            }
            Ok(()) = online.changed() => {
                let users: Vec<String> = online.borrow_and_update().iter().cloned().collect();
                eprintln!("online ({}): {}", users.len(), users.join(", "));
            }
            Ok(()) = inbox.changed() => {
                let count = inbox.borrow_and_update().len();
                eprintln!("notifications: {count}");
            }
        }
    }

    connection.disconnect();
    Ok(())
}

async fn run_broadcast(ctx: &CliContext, kind: &str, payload: &str) -> Result<(), CliError> {
    let kind: MessageKind = kind.parse()?;
    let payload: Value = serde_json::from_str(payload)?;
    let user_id = match ctx.config.realtime.user_id.clone() {
        Some(id) => id,
        None => ctx.api()?.me().await?.id,
    };

    let connection = connection(ctx);
    connection.init().await?;
    let outcome = match wait_connected(&connection).await {
        Ok(()) => {
            if Broadcaster::new(&connection, user_id).broadcast(kind, payload) {
                eprintln!("sent {kind}");
                Ok(())
            } else {
                Err(CliError::NotSent)
            }
        }
        Err(e) => Err(e),
    };
    connection.close().await;
    outcome
}

// =============================================================================
// COACH / SCRIPT
// =============================================================================

async fn run_objection(
    ctx: &CliContext,
    text: Option<String>,
    context: Option<String>,
    list: bool,
) -> Result<(), CliError> {
    let Some(text) = text.filter(|_| !list) else {
        for objection in scholarix::coach::common_objections() {
            println!("[{}] {}", objection.category, objection.text);
        }
        return Ok(());
    };
    let coach = ObjectionCoach::new(Arc::new(OllamaGenerator::new(&ctx.config.llm)?));
    let reply = coach.respond(&text, context.as_deref()).await;
    println!("{}", reply.text());
    Ok(())
}

fn run_script(args: ScriptArgs) {
    let mut vars = HashMap::from([
        ("lead_name".to_owned(), args.lead_name),
        ("rep_name".to_owned(), args.rep_name),
    ]);
    if let Some(company) = args.company {
        vars.insert("company".to_owned(), company);
    }
    if let Some(product) = args.product {
        vars.insert("product".to_owned(), product);
    }
    let simulation = CallSimulation::new(CallScript::standard(), vars);

    for (kind, prompts) in simulation.render_all() {
        println!("== {} ==", kind.label());
        for prompt in prompts {
            println!("  - {prompt}");
        }
    }
    println!("== Qualification ==");
    for item in QualificationItem::ALL {
        println!("  [ ] {}", item.question());
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
