use crate::cli::args::SessionExpireArgs;
use crate::exit_codes::{DENIED, SUCCESS};
use anyhow::Context;
use warden_core::{Clock, SessionStore, SqliteStore, StoreError, SystemClock};

pub fn cmd_expire(args: SessionExpireArgs) -> anyhow::Result<i32> {
    let store = SqliteStore::open(&args.store.db)
        .with_context(|| format!("failed to open database {}", args.store.db.display()))?;

    let mut session = match store.get_session(&args.id) {
        Ok(session) => session,
        Err(StoreError::SessionNotFound) => {
            eprintln!("session {} not found", args.id);
            return Ok(DENIED);
        }
        Err(e) => return Err(e).context("session lookup failed"),
    };

    let clock = SystemClock;
    session.expire(&clock);
    store.update_session(&session)?;
    tracing::info!(event = "session.expired", session_id = %session.id);

    let expires_at = session
        .expires_at
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(|| clock.now());
    println!("session {} expired at {}", session.id, expires_at.to_rfc3339());
    Ok(SUCCESS)
}
