//! Sessions command
//!
//! Inspects the durable session store from the CLI: list a user's
//! sessions or delete one.

use crate::config::Config;
use crate::error::Result;
use crate::sessions::SessionManager;

/// List stored sessions for a user
///
/// # Errors
///
/// Returns error if the session backend cannot be opened
pub fn list_sessions(config: &Config, user_id: &str) -> Result<()> {
    let manager = SessionManager::from_config(&config.sessions)?;
    let summaries = manager.list(user_id)?;

    if summaries.is_empty() {
        println!("No sessions for user {}", user_id);
        return Ok(());
    }

    for summary in summaries {
        println!(
            "{}  {}  ({} messages, updated {})",
            summary.id,
            summary.title,
            summary.message_count,
            summary.updated_at.to_rfc3339()
        );
    }
    Ok(())
}

/// Delete a stored session
///
/// # Errors
///
/// Returns error if the session backend cannot be opened
pub fn delete_session(config: &Config, user_id: &str, session_id: &str) -> Result<()> {
    let manager = SessionManager::from_config(&config.sessions)?;
    manager.delete(user_id, session_id)?;
    println!("Deleted session {}", session_id);
    Ok(())
}
