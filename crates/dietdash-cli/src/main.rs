//! dietdash - command-line front end for the coaching dashboard session.
//!
//! Plays the part of the dashboard views: it asks the session manager
//! whether the user may proceed and performs the navigation and notices
//! the manager hands back.

use std::io;
use std::sync::Arc;

use anyhow::Result;
use dietdash_core::auth::{Redirect, SessionManager, SessionState, SessionStore};
use dietdash_core::{ApiClient, ApiError, Config};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Manager = SessionManager<Arc<dyn SessionStore>>;

const USAGE: &str = "Usage: dietdash <command>

Commands:
  status       Show session validity and time remaining
  whoami       Show the signed-in user
  login        Store a token issued by the backend
  refresh      Exchange the stored token for a fresh one
  logout       Clear the session
  insights     List coaching insights
  meal-plans   List meal-plan history";

/// Initialize the tracing subscriber for logging
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let config = Config::load()?;
    let base_url = config.base_url();
    debug!(%base_url, store = ?config.store, "Config loaded");

    let manager = SessionManager::new(config.open_store()?, ApiClient::new(&base_url)?)
        .with_near_expiry_minutes(config.near_expiry_minutes());

    match command.as_str() {
        "status" => status(&manager),
        "whoami" => whoami(&manager),
        "login" => login(&manager)?,
        "refresh" => refresh(&manager).await,
        "logout" => navigate(&manager.logout()),
        "insights" => insights(&manager).await?,
        "meal-plans" => meal_plans(&manager).await?,
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
        }
    }

    Ok(())
}

/// Stand-in for the browser's full page load
fn navigate(redirect: &Redirect) {
    info!(location = redirect.location, "Redirecting");
    println!("Redirecting to {}", redirect.location);
}

/// Gate a view; prints the notice and redirect when access is denied
fn guard(manager: &Manager) -> bool {
    let decision = manager.require_auth();
    if let Some(notice) = decision.notice() {
        eprintln!("{}", notice);
    }
    if let Some(redirect) = decision.redirect() {
        navigate(redirect);
    }
    decision.is_granted()
}

fn status(manager: &Manager) {
    let state = manager.session_state();
    let status = manager.check_auth_status();
    match serde_json::to_string_pretty(&status) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to render status: {}", e),
    }
    let label = match state {
        SessionState::LoggedOut => "logged out",
        SessionState::LoggedInValid => "logged in",
        SessionState::LoggedInExpiringSoon => "logged in, expiring soon (run `dietdash refresh`)",
        SessionState::LoggedInExpired => "expired, please log in again",
    };
    println!("Session: {}", label);
}

fn whoami(manager: &Manager) {
    match manager.current_user() {
        Some(user) => {
            println!("{} ({})", user.display_name(), user.sub);
            if let Some(expires) = user.expires_at() {
                println!("Expires: {}", expires.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            if manager.is_admin() {
                println!("Role: admin");
            }
        }
        None => println!("Not logged in"),
    }
}

fn login(manager: &Manager) -> Result<()> {
    let token = rpassword::prompt_password("Token: ")?;
    let token = token.trim();
    if token.is_empty() {
        eprintln!("No token given");
        return Ok(());
    }
    manager.store_token(token)?;

    // Validate immediately so a bad paste does not linger
    if guard(manager) {
        println!("Login successful");
    }
    Ok(())
}

async fn refresh(manager: &Manager) {
    if manager.stored_token().is_none() {
        println!("Not logged in");
        navigate(&Redirect::login());
        return;
    }
    match manager.refresh_token().await {
        Some(_) => {
            let status = manager.check_auth_status();
            println!("Token refreshed ({}s remaining)", status.time_remaining);
        }
        None => {
            eprintln!("Session ended");
            navigate(&Redirect::login());
        }
    }
}

/// Unauthorized errors end in a redirect; anything else is reported
fn report(e: ApiError) -> Result<()> {
    if e.is_unauthorized() {
        navigate(&Redirect::login());
        return Ok(());
    }
    Err(e.into())
}

async fn insights(manager: &Manager) -> Result<()> {
    if !guard(manager) {
        return Ok(());
    }
    let insights = match manager.fetch_coach_insights().await {
        Ok(insights) => insights,
        Err(e) => return report(e),
    };
    if insights.is_empty() {
        println!("No insights yet");
    }
    for insight in insights {
        let category = insight.category.as_deref().unwrap_or("general");
        println!("[{}] {}: {}", category, insight.title, insight.message);
    }
    Ok(())
}

async fn meal_plans(manager: &Manager) -> Result<()> {
    if !guard(manager) {
        return Ok(());
    }
    let plans = match manager.fetch_meal_plan_history().await {
        Ok(plans) => plans,
        Err(e) => return report(e),
    };
    if plans.is_empty() {
        println!("No meal plans yet");
    }
    for plan in plans {
        println!(
            "{}  {:<30} {:>3} meals  {}",
            plan.created_at.format("%Y-%m-%d"),
            plan.title,
            plan.meal_count(),
            plan.calories_display()
        );
    }
    Ok(())
}
