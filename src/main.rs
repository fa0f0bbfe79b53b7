//! sharegate command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use sharegate::db::Role;
use sharegate::file::{BlobStore, FileStorage};
use sharegate::notify::LogMailer;
use sharegate::web::WebServer;
use sharegate::{
    Config, Database, NotificationQueue, RegistrationRequest, RegistrationService, Result,
};

/// sharegate - role-gated document sharing
#[derive(Parser)]
#[command(name = "sharegate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,

    /// Apply pending database migrations and exit
    Migrate,

    /// Create a verified account, typically the first operations user
    CreateUser {
        /// Login email
        #[arg(long)]
        email: String,

        /// Initial password
        #[arg(long)]
        password: String,

        /// CLIENT or OPERATIONS
        #[arg(long, default_value = "operations", value_parser = parse_role)]
        role: Role,

        /// Given name
        #[arg(long)]
        first_name: Option<String>,

        /// Family name
        #[arg(long)]
        last_name: Option<String>,
    },
}

fn parse_role(s: &str) -> std::result::Result<Role, String> {
    s.parse::<Role>().map_err(|e| e.to_string())
}

fn load_config(path: &PathBuf) -> Config {
    match Config::load_with_env(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", path.display());
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_config(&cli.config);

    match cli.command {
        Commands::Serve => {
            if let Err(e) = sharegate::logging::init(&config.logging) {
                eprintln!("Failed to initialize logging: {e}");
                sharegate::logging::init_console_only(&config.logging.level);
            }
        }
        _ => sharegate::logging::init_console_only(&config.logging.level),
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.effective_worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        match cli.command {
            Commands::Serve => serve(config).await,
            Commands::Migrate => migrate(config).await,
            Commands::CreateUser {
                email,
                password,
                role,
                first_name,
                last_name,
            } => {
                let request =
                    RegistrationRequest::new(email, password).with_names(first_name, last_name);
                create_user(config, request, role).await
            }
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn open_database(config: &Config) -> Result<Database> {
    Database::open(&config.database.path, config.database.max_connections).await
}

async fn serve(config: Config) -> Result<()> {
    config.validate()?;

    info!("sharegate - role-gated document sharing");
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );

    let db = Arc::new(open_database(&config).await?);
    let blobs: Arc<dyn BlobStore> = Arc::new(FileStorage::new(&config.files.storage_path)?);
    info!("File storage initialized at: {}", config.files.storage_path);

    let notifications = NotificationQueue::from_config(&config.notifications, Arc::new(LogMailer));

    WebServer::new(&config, db, blobs, notifications)?
        .run()
        .await
}

async fn migrate(config: Config) -> Result<()> {
    // Opening applies every pending migration.
    let db = open_database(&config).await?;
    info!(
        schema_version = db.schema_version().await?,
        path = %config.database.path,
        "Database is up to date"
    );
    Ok(())
}

async fn create_user(config: Config, request: RegistrationRequest, role: Role) -> Result<()> {
    let db = open_database(&config).await?;
    let notifications = NotificationQueue::disabled();

    let user = RegistrationService::new(&db, &notifications, &config.notifications.frontend_url)
        .register_with_role(request, role)
        .await?;

    info!(user_id = user.id, email = %user.email, role = %user.role, "User created");
    println!("Created {} user {} (id {})", user.role, user.email, user.id);
    Ok(())
}
