// src/main.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use logindiag::config::AppConfig;
use logindiag::directory::{DirectoryConnection, LdapDirectory, MemoryDirectory};
use logindiag::logging::init_tracing;
use logindiag::{diagnose, AuthenticationOutcome, Credentials};

/// Переменная окружения с проверяемым паролем
const PASSWORD_ENV: &str = "LOGINDIAG_PASSWORD";

/// Основная команда
#[derive(Parser)]
#[command(name = "logindiag")]
#[command(about = "Диагностика причин неудачного входа в Active Directory", long_about = None)]
struct Args {
    /// Путь к config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Вывод в JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Проверить вход на живом каталоге
    Check {
        username: String,
        /// Пароль; если не задан — из LOGINDIAG_PASSWORD
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Проверить вход на каталоге из YAML-файла
    Simulate {
        #[arg(short, long)]
        fixture: PathBuf,
        username: String,
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    init_tracing(&config.logging);

    let (conn, credentials): (Box<dyn DirectoryConnection + Send>, Credentials) = match args.command {
        Command::Check { username, password } => {
            let directory = config.directory.clone();
            let naming_attribute = config.policy.username_attribute.clone();
            let conn = tokio::task::spawn_blocking(move || LdapDirectory::connect(&directory, &naming_attribute))
                .await??;
            (Box::new(conn), Credentials::new(username, resolve_password(password)?))
        }
        Command::Simulate { fixture, username, password } => {
            let conn = MemoryDirectory::from_yaml_file(&fixture, config.policy.clone())?;
            (Box::new(conn), Credentials::new(username, resolve_password(password)?))
        }
    };

    let policy = config.policy.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut conn = conn;
        diagnose(&mut conn, &credentials, &policy)
    })
    .await??;

    print_outcome(&outcome, args.json)?;
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(AppConfig::load(path)?),
        None => match AppConfig::default_path().filter(|p| p.exists()) {
            Some(path) => Ok(AppConfig::load(path)?),
            None => Ok(AppConfig::from_yaml_str("{}")?),
        },
    }
}

fn resolve_password(password: Option<String>) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(password) = password {
        return Ok(password);
    }
    dotenvy::dotenv().ok();
    std::env::var(PASSWORD_ENV).map_err(|_| format!("password not given: use --password or {}", PASSWORD_ENV).into())
}

fn print_outcome(outcome: &AuthenticationOutcome, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    let message = match outcome {
        AuthenticationOutcome::Success { .. } => "✅ вход выполнен",
        AuthenticationOutcome::NotFound { .. } => "❌ пользователь не найден",
        AuthenticationOutcome::WrongPassword { .. } => "❌ неверный пароль",
        AuthenticationOutcome::AccountDisabled { .. } => "⛔ учётная запись отключена",
        AuthenticationOutcome::AccountLockedOut { .. } => "🔒 учётная запись заблокирована",
        AuthenticationOutcome::PasswordExpired { .. } => "⌛ срок действия пароля истёк",
        AuthenticationOutcome::NotAuthorized { .. } => "❌ вход отклонён, причина не установлена",
    };
    println!("{} — {}", outcome.username(), message);
    Ok(())
}
