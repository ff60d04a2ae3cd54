//! SQLite schema for sessions, device OTPs and devices.
//!
//! Tables:
//! - `sessions`: one row per authorization exchange
//! - `session_device_otps`: approval codes; `approved` NULL while pending
//! - `devices`: paired user devices

/// DDL for the session store.
///
/// Schema version: 1
pub const SESSION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id                 TEXT PRIMARY KEY,
    owner_app_id       TEXT NOT NULL,
    app_id             TEXT,
    tool_name          TEXT,
    user_id            TEXT,
    access_token       TEXT UNIQUE,
    authorization_code TEXT UNIQUE,
    created_at         INTEGER NOT NULL,
    expires_at         INTEGER
);

CREATE TABLE IF NOT EXISTS session_device_otps (
    id          TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    session_id  TEXT NOT NULL REFERENCES sessions(id),
    device_id   TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER,
    expires_at  INTEGER NOT NULL,
    approved    INTEGER,
    used        INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS devices (
    id                 TEXT PRIMARY KEY,
    user_id            TEXT NOT NULL,
    subscription_token TEXT NOT NULL,
    name               TEXT NOT NULL,
    created_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_otps_triple
    ON session_device_otps(device_id, session_id, value);
CREATE INDEX IF NOT EXISTS idx_devices_user
    ON devices(user_id, created_at);
"#;
