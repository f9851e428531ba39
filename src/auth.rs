//! Session persistence.
//!
//! The magic-link handshake happens elsewhere; what arrives here is an
//! already-issued principal id and access token, kept in `session.json`
//! until `logout`. The rest of the app only ever asks "who is signed in".

use async_trait::async_trait;

use crate::services::{AuthService, Session};
use crate::storage::StorageManager;

const SESSION_FILE: &str = "session.json";

pub struct LocalAuth<S: StorageManager> {
    storage: S,
}

impl<S: StorageManager> LocalAuth<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn login(&self, principal_id: &str, token: &str) -> std::io::Result<Session> {
        let session = Session {
            principal_id: principal_id.to_string(),
            token: token.to_string(),
        };
        let data = serde_json::to_vec_pretty(&session).expect("session always serializes");
        self.storage.write(SESSION_FILE, &data)?;
        log::info!("signed in as {principal_id}");
        Ok(session)
    }

    pub fn logout(&self) -> std::io::Result<()> {
        if self.storage.exists(SESSION_FILE) {
            self.storage.delete(SESSION_FILE)?;
        }
        Ok(())
    }

    fn read_session(&self) -> Option<Session> {
        if !self.storage.exists(SESSION_FILE) {
            return None;
        }
        let data = match self.storage.read(SESSION_FILE) {
            Ok(data) => data,
            Err(err) => {
                log::error!("failed to read session: {err}");
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(session) => Some(session),
            Err(err) => {
                log::error!("stored session is malformed, treating as signed out: {err}");
                None
            }
        }
    }
}

#[async_trait]
impl<S: StorageManager> AuthService for LocalAuth<S> {
    async fn session(&self) -> anyhow::Result<Option<Session>> {
        Ok(self.read_session())
    }
}
