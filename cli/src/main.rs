use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use eventhub::api::{
    ApiClient, ApiError, HttpAuthApi, HttpUserDirectory, NewUser, PaginationParams, RegisterRequest, SortOrder,
    UserDirectory, UserUpdate,
};
use eventhub::config::{ClientConfig, ConfigError, normalize_api_url};
use eventhub::state::{AuthController, LoginError, LoginField, LoginForm};
use eventhub::storage::FileStore;
use eventhub::{ErrorCode, RequestError, SessionError, SessionStore};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Request(#[from] RequestError<SessionError>),
    #[error("login form is invalid")]
    InvalidForm,
    #[error("not logged in; run `eventhub login` first")]
    NotLoggedIn,
    #[error("nothing to update; pass --name or --email")]
    EmptyUpdate,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl From<LoginError> for CliError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::InvalidForm(_) => Self::InvalidForm,
            LoginError::Rejected(e) => Self::Request(e),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "eventhub", about = "EventHub session and user directory CLI")]
struct Cli {
    #[arg(long, env = "EVENTHUB_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "EVENTHUB_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// Exchange the stored refresh token for a new access token.
    Refresh,
    Whoami {
        /// Fetch the profile from the backend instead of the stored record.
        #[arg(long, default_value_t = false)]
        remote: bool,
    },
    /// Restore the stored session and report whether it is still valid.
    Status,
    Users(UsersCommand),
}

#[derive(Args, Debug)]
struct UsersCommand {
    #[command(subcommand)]
    command: UsersSubcommand,
}

#[derive(Subcommand, Debug)]
enum UsersSubcommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        order: Option<SortOrder>,
    },
    Get {
        id: String,
    },
    Search {
        query: String,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    Delete {
        id: String,
    },
}

/// Everything a command needs, wired over the file-backed session.
struct CliContext {
    config: ClientConfig,
    session: Arc<SessionStore>,
    auth: AuthController,
    directory: HttpUserDirectory,
}

impl CliContext {
    fn new(config: ClientConfig) -> Result<Self, CliError> {
        let client = ApiClient::from_config(&config)?;
        let storage = Arc::new(FileStore::new(config.session_file.clone()));
        let session = Arc::new(SessionStore::new(Arc::new(HttpAuthApi::new(client.clone())), storage));
        let auth = AuthController::new(Arc::clone(&session), config.operation_timeout);
        let directory = HttpUserDirectory::new(client, session.clone());
        Ok(Self { config, session, auth, directory })
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config.api_url = normalize_api_url(&url)?;
    }
    if let Some(path) = cli.session_file {
        config.session_file = path;
    }
    let ctx = CliContext::new(config)?;

    let result = match cli.command {
        Command::Login { email, password } => run_login(&ctx, email, password).await,
        Command::Register { name, email, password } => run_register(&ctx, name, email, password).await,
        Command::Logout => {
            ctx.auth.logout().await;
            print_json(&json!({ "authenticated": false }))
        }
        Command::Refresh => {
            let token = ctx.auth.refresh_token().await?;
            print_json(&json!({ "accessToken": token }))
        }
        Command::Whoami { remote } => run_whoami(&ctx, remote).await,
        Command::Status => {
            ctx.auth.initialize().await;
            let state = ctx.auth.state();
            print_json(&json!({ "authenticated": state.is_authenticated, "user": state.user }))
        }
        Command::Users(users) => run_users(&ctx, users).await,
    };
    if let Err(e) = &result {
        tracing::debug!(code = error_code(e), "command failed");
    }
    result
}

async fn run_login(ctx: &CliContext, email: String, password: String) -> Result<(), CliError> {
    let mut form = LoginForm::default();
    form.set(LoginField::Email, email);
    form.set(LoginField::Password, password);

    match form.submit(&ctx.auth, None).await {
        Ok(_) => {
            let state = ctx.auth.state();
            print_json(&json!({ "authenticated": true, "user": state.user }))
        }
        Err(LoginError::InvalidForm(errors)) => {
            print_json(&json!({ "errors": { "email": errors.email, "password": errors.password } }))?;
            Err(CliError::InvalidForm)
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_register(ctx: &CliContext, name: String, email: String, password: String) -> Result<(), CliError> {
    let user = ctx.auth.register(RegisterRequest { name, email, password }).await?;
    print_json(&user)
}

async fn run_whoami(ctx: &CliContext, remote: bool) -> Result<(), CliError> {
    let user = if remote {
        ctx.session.profile().await?
    } else {
        ctx.session.current_user().ok_or(CliError::NotLoggedIn)?
    };
    print_json(&user)
}

async fn run_users(ctx: &CliContext, users: UsersCommand) -> Result<(), CliError> {
    let directory = &ctx.directory;
    match users.command {
        UsersSubcommand::List { page, limit, sort, order } => {
            let mut params = PaginationParams::new(page, limit.unwrap_or(ctx.config.page_size));
            params.sort = sort;
            params.order = order;
            print_json(&directory.list(&params).await?)
        }
        UsersSubcommand::Get { id } => print_json(&directory.get(&id).await?),
        UsersSubcommand::Search { query } => print_json(&directory.search(&query).await?),
        UsersSubcommand::Create { name, email } => {
            let user = NewUser { name, email, avatar: None, role: None };
            print_json(&directory.create(&user).await?)
        }
        UsersSubcommand::Update { id, name, email } => {
            let update = UserUpdate { name, email, ..UserUpdate::default() };
            if update.is_empty() {
                return Err(CliError::EmptyUpdate);
            }
            print_json(&directory.update(&id, &update).await?)
        }
        UsersSubcommand::Delete { id } => {
            directory.delete(&id).await?;
            print_json(&json!({ "deleted": id }))
        }
    }
}

fn error_code(err: &CliError) -> &'static str {
    match err {
        CliError::Config(e) => e.error_code(),
        CliError::Api(e) => e.error_code(),
        CliError::Session(e) => e.error_code(),
        CliError::Request(e) => e.error_code(),
        CliError::InvalidForm => "E_INVALID_FORM",
        CliError::NotLoggedIn => "E_MISSING_CREDENTIAL",
        CliError::EmptyUpdate => "E_EMPTY_UPDATE",
        CliError::InvalidJson(_) => "E_INVALID_JSON",
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
