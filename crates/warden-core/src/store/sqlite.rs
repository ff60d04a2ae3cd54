//! SqliteStore: SQLite-backed sessions, device OTPs and devices.
//!
//! The single terminal OTP transition is enforced in SQL: the resolve and
//! consume statements only touch rows still in the expected state, so two
//! writers racing on the same OTP commit at most one transition.

use super::schema::SESSION_SCHEMA;
use super::{DeviceDirectory, SessionStore, StoreError};
use crate::model::{Device, Session, SessionDeviceOtp, OTP_DELAY_WINDOW_SECONDS};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SESSION_COLUMNS: &str = "id, owner_app_id, app_id, tool_name, user_id, access_token, \
                               authorization_code, created_at, expires_at";

const OTP_COLUMNS: &str =
    "id, value, session_id, device_id, created_at, updated_at, expires_at, approved, used";

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a file-backed store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()));
        conn.execute_batch(SESSION_SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn query_session(&self, column: &str, value: &str) -> Result<Session, StoreError> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE {column} = ?1"),
            [value],
            session_from_row,
        )
        .optional()?
        .ok_or(StoreError::SessionNotFound)
    }
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        owner_app_id: row.get(1)?,
        app_id: row.get(2)?,
        tool_name: row.get(3)?,
        user_id: row.get(4)?,
        access_token: row.get(5)?,
        authorization_code: row.get(6)?,
        created_at: row.get(7)?,
        expires_at: row.get(8)?,
    })
}

fn otp_from_row(row: &Row<'_>) -> rusqlite::Result<SessionDeviceOtp> {
    Ok(SessionDeviceOtp {
        id: row.get(0)?,
        value: row.get(1)?,
        session_id: row.get(2)?,
        device_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        expires_at: row.get(6)?,
        approved: row.get(7)?,
        used: row.get(8)?,
    })
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<(Device, String)> {
    let created_at: String = row.get(4)?;
    Ok((
        Device {
            id: row.get(0)?,
            user_id: row.get(1)?,
            subscription_token: row.get(2)?,
            name: row.get(3)?,
            created_at: DateTime::<Utc>::MIN_UTC,
        },
        created_at,
    ))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(format!("invalid timestamp '{raw}': {e}")))
}

/// Map unique-constraint violations to `Conflict` so callers can tell them
/// apart from an unavailable database.
fn map_insert_error(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(err, Some(msg)) = &e {
        if err.code == ErrorCode::ConstraintViolation && msg.contains("UNIQUE") {
            let field = msg.rsplit('.').next().unwrap_or("unknown").to_string();
            return StoreError::Conflict { field };
        }
    }
    e.into()
}

impl SessionStore for SqliteStore {
    fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            &format!("INSERT INTO sessions ({SESSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                session.id,
                session.owner_app_id,
                session.app_id,
                session.tool_name,
                session.user_id,
                session.access_token,
                session.authorization_code,
                session.created_at,
                session.expires_at,
            ],
        )
        .map_err(map_insert_error)?;
        Ok(())
    }

    fn get_session(&self, id: &str) -> Result<Session, StoreError> {
        self.query_session("id", id)
    }

    fn get_session_by_auth_code(&self, code: &str) -> Result<Session, StoreError> {
        self.query_session("authorization_code", code)
    }

    fn get_session_by_access_token(&self, token: &str) -> Result<Session, StoreError> {
        self.query_session("access_token", token)
    }

    fn update_session(&self, session: &Session) -> Result<(), StoreError> {
        let conn = self.lock();
        let changed = conn
            .execute(
                r#"
                UPDATE sessions SET
                    app_id = ?2, tool_name = ?3, user_id = ?4, access_token = ?5,
                    authorization_code = ?6, expires_at = ?7
                WHERE id = ?1
                "#,
                params![
                    session.id,
                    session.app_id,
                    session.tool_name,
                    session.user_id,
                    session.access_token,
                    session.authorization_code,
                    session.expires_at,
                ],
            )
            .map_err(map_insert_error)?;
        if changed == 0 {
            return Err(StoreError::SessionNotFound);
        }
        Ok(())
    }

    fn create_device_otp(&self, otp: &SessionDeviceOtp) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            &format!(
                "INSERT INTO session_device_otps ({OTP_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                otp.id,
                otp.value,
                otp.session_id,
                otp.device_id,
                otp.created_at,
                otp.updated_at,
                otp.expires_at,
                otp.approved,
                otp.used,
            ],
        )
        .map_err(map_insert_error)?;
        Ok(())
    }

    fn get_device_otp(&self, id: &str) -> Result<SessionDeviceOtp, StoreError> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {OTP_COLUMNS} FROM session_device_otps WHERE id = ?1"),
            [id],
            otp_from_row,
        )
        .optional()?
        .ok_or(StoreError::DeviceOtpNotFound)
    }

    fn get_device_otp_by_value(
        &self,
        device_id: &str,
        session_id: &str,
        value: &str,
    ) -> Result<SessionDeviceOtp, StoreError> {
        let conn = self.lock();
        conn.query_row(
            &format!(
                "SELECT {OTP_COLUMNS} FROM session_device_otps \
                 WHERE device_id = ?1 AND session_id = ?2 AND value = ?3"
            ),
            params![device_id, session_id, value],
            otp_from_row,
        )
        .optional()?
        .ok_or(StoreError::DeviceOtpNotFound)
    }

    fn resolve_device_otp(
        &self,
        id: &str,
        approved: bool,
        updated_at: i64,
    ) -> Result<bool, StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            r#"
            UPDATE session_device_otps SET approved = ?2, updated_at = ?3
            WHERE id = ?1 AND approved IS NULL AND used = 0 AND expires_at + ?4 > ?3
            "#,
            params![id, approved, updated_at, OTP_DELAY_WINDOW_SECONDS],
        )?;
        Ok(changed == 1)
    }

    fn mark_device_otp_used(&self, id: &str, updated_at: i64) -> Result<bool, StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE session_device_otps SET used = 1, updated_at = ?2 WHERE id = ?1 AND used = 0",
            params![id, updated_at],
        )?;
        Ok(changed == 1)
    }
}

impl DeviceDirectory for SqliteStore {
    fn register_device(&self, device: &Device) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO devices (id, user_id, subscription_token, name, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                subscription_token = excluded.subscription_token,
                name = excluded.name
            "#,
            params![
                device.id,
                device.user_id,
                device.subscription_token,
                device.name,
                device
                    .created_at
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        Ok(())
    }

    fn devices_for_user(&self, user_id: Option<&str>) -> Result<Vec<Device>, StoreError> {
        let conn = self.lock();
        let rows: Vec<(Device, String)> = match user_id {
            Some(user_id) => {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, subscription_token, name, created_at FROM devices \
                     WHERE user_id = ?1 ORDER BY created_at, rowid",
                )?;
                let rows = stmt.query_map([user_id], device_from_row)?;
                rows.collect::<Result<_, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, subscription_token, name, created_at FROM devices \
                     ORDER BY created_at, rowid",
                )?;
                let rows = stmt.query_map([], device_from_row)?;
                rows.collect::<Result<_, _>>()?
            }
        };

        rows.into_iter()
            .map(|(mut device, created_at)| {
                device.created_at = parse_timestamp(&created_at)?;
                Ok(device)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::secrets::OsSecretSource;
    use chrono::Duration as ChronoDuration;

    fn session(id: &str) -> Session {
        Session {
            id: id.into(),
            owner_app_id: "owner".into(),
            authorization_code: Some(format!("code-{id}")),
            created_at: 1_700_000_000,
            expires_at: Some(1_700_000_300),
            ..Default::default()
        }
    }

    fn device(id: &str, user: &str, created_at: DateTime<Utc>) -> Device {
        Device {
            id: id.into(),
            user_id: user.into(),
            subscription_token: format!("{{\"endpoint\":\"https://push.example/{id}\"}}"),
            name: format!("phone {id}"),
            created_at,
        }
    }

    #[test]
    fn session_round_trip_and_lookups() {
        let store = SqliteStore::memory().unwrap();
        let mut s = session("s1");
        store.create_session(&s).unwrap();

        assert_eq!(store.get_session("s1").unwrap(), s);
        assert_eq!(store.get_session_by_auth_code("code-s1").unwrap().id, "s1");
        assert_eq!(
            store.get_session_by_access_token("nope"),
            Err(StoreError::SessionNotFound)
        );

        s.access_token = Some("tok".into());
        s.expires_at = None;
        store.update_session(&s).unwrap();

        let loaded = store.get_session_by_access_token("tok").unwrap();
        assert_eq!(loaded.expires_at, None);
    }

    #[test]
    fn update_unknown_session_is_not_found() {
        let store = SqliteStore::memory().unwrap();
        assert_eq!(
            store.update_session(&session("ghost")),
            Err(StoreError::SessionNotFound)
        );
    }

    #[test]
    fn duplicate_access_token_is_a_conflict() {
        let store = SqliteStore::memory().unwrap();
        let mut a = session("a");
        a.access_token = Some("same".into());
        let mut b = session("b");
        b.access_token = Some("same".into());

        store.create_session(&a).unwrap();
        let err = store.create_session(&b).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }), "got {err:?}");
    }

    #[test]
    fn otp_lookup_requires_the_full_triple() {
        let store = SqliteStore::memory().unwrap();
        store.create_session(&session("s1")).unwrap();
        store.create_session(&session("s2")).unwrap();
        let clock = ManualClock::at_unix(1_700_000_000);

        let otp = SessionDeviceOtp::new("s1", "d1", &clock, &OsSecretSource);
        store.create_device_otp(&otp).unwrap();

        let found = store.get_device_otp_by_value("d1", "s1", &otp.value).unwrap();
        assert_eq!(found, otp);

        for (device, sess) in [("d2", "s1"), ("d1", "s2")] {
            assert_eq!(
                store.get_device_otp_by_value(device, sess, &otp.value),
                Err(StoreError::DeviceOtpNotFound)
            );
        }
        assert_eq!(
            store.get_device_otp_by_value("d1", "s1", "wrong"),
            Err(StoreError::DeviceOtpNotFound)
        );
    }

    #[test]
    fn resolve_commits_only_once() {
        let store = SqliteStore::memory().unwrap();
        store.create_session(&session("s1")).unwrap();
        let clock = ManualClock::at_unix(1_700_000_000);
        let otp = SessionDeviceOtp::new("s1", "d1", &clock, &OsSecretSource);
        store.create_device_otp(&otp).unwrap();

        assert!(store.resolve_device_otp(&otp.id, true, 1).unwrap());
        assert!(!store.resolve_device_otp(&otp.id, false, 2).unwrap());

        let stored = store.get_device_otp(&otp.id).unwrap();
        assert_eq!(stored.approved, Some(true));
        assert_eq!(stored.updated_at, Some(1));
    }

    #[test]
    fn expired_otp_stays_pending() {
        let store = SqliteStore::memory().unwrap();
        store.create_session(&session("s1")).unwrap();
        let clock = ManualClock::at_unix(1_700_000_000);
        let otp = SessionDeviceOtp::new("s1", "d1", &clock, &OsSecretSource);
        store.create_device_otp(&otp).unwrap();

        let cutoff = otp.expires_at + OTP_DELAY_WINDOW_SECONDS;
        assert!(!store.resolve_device_otp(&otp.id, true, cutoff).unwrap());
        assert_eq!(store.get_device_otp(&otp.id).unwrap().approved, None);

        assert!(store.resolve_device_otp(&otp.id, true, cutoff - 1).unwrap());
    }

    #[test]
    fn used_otp_cannot_be_resolved_or_used_again() {
        let store = SqliteStore::memory().unwrap();
        store.create_session(&session("s1")).unwrap();
        let clock = ManualClock::at_unix(1_700_000_000);
        let otp = SessionDeviceOtp::new("s1", "d1", &clock, &OsSecretSource);
        store.create_device_otp(&otp).unwrap();

        assert!(store.mark_device_otp_used(&otp.id, 5).unwrap());
        assert!(!store.mark_device_otp_used(&otp.id, 6).unwrap());
        assert!(!store.resolve_device_otp(&otp.id, true, 7).unwrap());
        assert_eq!(store.get_device_otp(&otp.id).unwrap().approved, None);
    }

    #[test]
    fn otp_requires_existing_session() {
        let store = SqliteStore::memory().unwrap();
        let clock = ManualClock::at_unix(1_700_000_000);
        let otp = SessionDeviceOtp::new("missing", "d1", &clock, &OsSecretSource);
        assert!(matches!(
            store.create_device_otp(&otp),
            Err(StoreError::Database(_))
        ));
    }

    #[test]
    fn devices_are_listed_oldest_first() {
        let store = SqliteStore::memory().unwrap();
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        store
            .register_device(&device("new", "alice", t0 + ChronoDuration::minutes(5)))
            .unwrap();
        store.register_device(&device("old", "alice", t0)).unwrap();
        store.register_device(&device("bob", "bob", t0)).unwrap();

        let alice: Vec<String> = store
            .devices_for_user(Some("alice"))
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(alice, vec!["old", "new"]);

        assert_eq!(store.devices_for_user(None).unwrap().len(), 3);
        assert!(store.devices_for_user(Some("carol")).unwrap().is_empty());

        let loaded = store.devices_for_user(Some("bob")).unwrap();
        assert_eq!(loaded[0].created_at, t0);
    }
}
