//! clinicq - command-line front end for the clinic/queue dashboard API.
//!
//! Logs in, keeps the session tokens in the configured credential store and
//! issues verb calls through the request facade, printing JSON results.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use clinicq_core::api::{Navigator, Notifier, AUTH_ROUTE};
use clinicq_core::auth::Session;
use clinicq_core::config::Config;
use clinicq_core::{ApiClient, Fetch, LoadingStore};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: clinicq <command> [args]

Commands:
  login [username]             Sign in and store the session tokens
  logout                       Forget the stored session
  status                       Show whether a session is stored
  get <path> [key=value...]    GET a listing and print total and content
  post <path> <json>           POST a JSON payload
  put <path> <json>            PUT a JSON payload
  delete <path>                DELETE a resource";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Error notifications go straight to stderr
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn error(&self, title: &str, description: &str) {
        eprintln!("{}: {}", title, description);
    }
}

/// There are no routes in a terminal; tell the user what to do instead
struct HintNavigator;

impl Navigator for HintNavigator {
    fn navigate(&self, route: &str) {
        if route == AUTH_ROUTE {
            eprintln!("Session ended. Run `clinicq login` to sign in again.");
        } else {
            eprintln!("Continue at {}", route);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let mut config = Config::load().context("Failed to load config")?;
    let session = Session::new(config.credential_store()?);
    let api = ApiClient::new(&config.api, session.clone())?
        .with_notifier(StderrNotifier)
        .with_navigator(HintNavigator);

    let rest = &args[1..];
    match command.as_str() {
        "login" => login(&api, &mut config, rest.first().cloned()).await,
        "logout" => {
            api.logout().await?;
            Ok(())
        }
        "status" => status(&session),
        "get" => get(&api, rest).await,
        "post" | "put" => send_json(&api, command, rest).await,
        "delete" => delete(&api, rest).await,
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
}

async fn login(api: &ApiClient, config: &mut Config, username: Option<String>) -> Result<()> {
    let username = match username.or_else(|| config.last_username.clone()) {
        Some(name) => name,
        None => prompt("Username: ")?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", username))
        .context("Failed to read password")?;

    api.login(&username, &password).await?;

    config.last_username = Some(username.clone());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
    info!(username = %username, "Signed in");
    println!("Signed in as {}", username);
    Ok(())
}

fn status(session: &Session) -> Result<()> {
    if session.is_authenticated()? && session.access_token()?.is_some() {
        println!("Signed in");
    } else {
        println!("Not signed in");
    }
    Ok(())
}

async fn get(api: &ApiClient, args: &[String]) -> Result<()> {
    let path = args.first().ok_or_else(|| anyhow!("get needs a path\n\n{}", USAGE))?;
    let params = parse_params(&args[1..])?;
    let query: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let loading = LoadingStore::new();
    let mut indicator = loading.subscribe();
    let spinner = tokio::spawn(async move {
        while indicator.changed().await.is_ok() {
            if *indicator.borrow_and_update() {
                eprintln!("Loading...");
            }
        }
    });

    let fetch: Fetch<serde_json::Value> = Fetch::new(api.clone(), loading);
    let result = fetch.get(path, &query, true).await;
    spinner.abort();

    let content = result?;
    print_json(&json!({ "total": fetch.total(), "content": content }))
}

async fn send_json(api: &ApiClient, verb: &str, args: &[String]) -> Result<()> {
    let (path, payload) = match args {
        [path, payload, ..] => (path, payload),
        _ => bail!("{} needs a path and a JSON payload\n\n{}", verb, USAGE),
    };
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("Payload is not valid JSON")?;

    let fetch: Fetch<serde_json::Value> = Fetch::new(api.clone(), LoadingStore::new());
    let body = if verb == "post" {
        fetch.post(path, &payload).await?
    } else {
        fetch.put(path, &payload).await?
    };
    print_json(&body)
}

async fn delete(api: &ApiClient, args: &[String]) -> Result<()> {
    let path = args.first().ok_or_else(|| anyhow!("delete needs a path\n\n{}", USAGE))?;
    let fetch: Fetch<serde_json::Value> = Fetch::new(api.clone(), LoadingStore::new());
    let body = fetch.delete(path).await?;
    print_json(&body)
}

fn parse_params(args: &[String]) -> Result<Vec<(String, String)>> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow!("Query parameter must be key=value: {}", arg))
        })
        .collect()
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("No username given");
    }
    Ok(value)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let args = vec!["page=1".to_string(), "search=a=b".to_string()];
        let params = parse_params(&args).unwrap();
        assert_eq!(
            params,
            vec![
                ("page".to_string(), "1".to_string()),
                ("search".to_string(), "a=b".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_params_rejects_bare_words() {
        let args = vec!["page".to_string()];
        assert!(parse_params(&args).is_err());
    }
}
