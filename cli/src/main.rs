mod state_file;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use client::auth::requests::{ProfileUpdate, RegisterFields};
use client::auth::{AuthError, AuthService};
use client::config::{ClientConfig, ConfigError};
use client::net::transport::TransportError;
use client::state::session::Session;
use credential::UserSummary;
use serde_json::{Value, json};
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

use crate::state_file::StateFile;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("http client: {0}")]
    Transport(#[from] TransportError),
    #[error("{}", .0.user_message())]
    Auth(#[from] AuthError),
    #[error("state file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "camply", about = "Camply account and session CLI")]
struct Cli {
    #[arg(long, env = "CAMPLY_API_BASE_URL", default_value = "http://127.0.0.1:8080/api")]
    api_base_url: String,

    #[arg(long, env = "CAMPLY_STATE_FILE", default_value = ".camply/session.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        email: String,
        #[arg(long, env = "CAMPLY_PASSWORD")]
        password: String,
    },
    Register(RegisterArgs),
    Logout,
    /// Print the current session.
    Whoami,
    Refresh,
    ForgotPassword {
        email: String,
    },
    ResetPassword {
        token: String,
        #[arg(long, env = "CAMPLY_PASSWORD")]
        password: String,
    },
    VerifyEmail {
        token: String,
    },
    ChangePassword {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
    UpdateProfile(ProfileArgs),
}

#[derive(Args, Debug)]
struct RegisterArgs {
    email: String,
    #[arg(long)]
    username: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    surname: String,
    #[arg(long, env = "CAMPLY_PASSWORD")]
    password: String,
    #[arg(long)]
    confirm_password: Option<String>,
}

#[derive(Args, Debug)]
struct ProfileArgs {
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    surname: Option<String>,
    #[arg(long)]
    avatar: Option<String>,
    #[arg(long)]
    bio: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    website: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_lookup(|key| match key {
        "CAMPLY_API_BASE_URL" => Some(cli.api_base_url.clone()),
        _ => std::env::var(key).ok(),
    })?;

    let (jar, storage) = StateFile::load(&cli.state)?.media();
    let service = client::build(&config, jar.clone(), storage.clone())?;

    if let Err(e) = service.bootstrap(None).await {
        tracing::warn!(error = %e, "stored session could not be restored");
    }

    let outcome = run(&service, cli.command).await;

    StateFile::capture(&jar, &storage).save(&cli.state)?;
    outcome
}

async fn run(service: &AuthService, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login { email, password } => {
            let user = service.login(&email, &password).await?;
            print_user("signed in", &user)
        }
        Command::Register(args) => {
            let fields = RegisterFields {
                email: args.email,
                username: args.username,
                name: args.name,
                surname: args.surname,
                password: args.password,
                confirm_password: args.confirm_password,
            };
            let user = service.register(&fields).await?;
            print_user("registered", &user)
        }
        Command::Logout => {
            if let Some(invalidation) = service.logout() {
                invalidation.join().await;
            }
            eprintln!("signed out");
            Ok(())
        }
        Command::Whoami => print_json(&session_json(&service.session().snapshot())),
        Command::Refresh => {
            let user = service.refresh_token().await?;
            print_user("session refreshed", &user)
        }
        Command::ForgotPassword { email } => {
            service.forgot_password(&email).await?;
            eprintln!("if {email} has an account, a reset link is on its way");
            Ok(())
        }
        Command::ResetPassword { token, password } => {
            service.reset_password(&token, &password).await?;
            eprintln!("password reset; sign in with the new password");
            Ok(())
        }
        Command::VerifyEmail { token } => {
            service.verify_email(&token).await?;
            eprintln!("email verified");
            Ok(())
        }
        Command::ChangePassword { current, new } => {
            service.change_password(&current, &new).await?;
            eprintln!("password changed");
            Ok(())
        }
        Command::UpdateProfile(args) => {
            let update = ProfileUpdate {
                username: args.username,
                name: args.name,
                surname: args.surname,
                profile_image_url: args.avatar,
                bio: args.bio,
                location: args.location,
                website: args.website,
            };
            let user = service.update_profile(&update).await?;
            print_user("profile updated", &user)
        }
    }
}

fn session_json(session: &Session) -> Value {
    let timestamp = |at: Option<time::OffsetDateTime>| at.and_then(|at| at.format(&Rfc3339).ok());
    json!({
        "isAuthenticated": session.is_authenticated,
        "user": session.user,
        "lastLoginAt": timestamp(session.last_login_at),
        "sessionExpiresAt": timestamp(session.session_expires_at),
        "error": session.error,
    })
}

fn print_user(status: &str, user: &UserSummary) -> Result<(), CliError> {
    eprintln!("{status}");
    print_json(&serde_json::to_value(user)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
