//! `chatgate sessions`: list sessions that have stored credentials.
//!
//! These are the sessions `chatgate serve` restores on startup.

use anyhow::Result;
use console::style;

use chatgate_core::credentials::CredentialStore;

use crate::state::AppState;

pub async fn list_stored_sessions(state: &AppState, json: bool) -> Result<()> {
    let store = state.sessions.credentials();
    let ids = store.list_session_ids().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ids)?);
        return Ok(());
    }

    println!();
    if ids.is_empty() {
        println!(
            "  {} No stored sessions in {}",
            style("i").blue().bold(),
            style(store.root().display()).dim()
        );
    } else {
        for id in &ids {
            println!("  {} {}", style("•").green(), style(id).cyan());
        }
    }
    println!();
    Ok(())
}
