use crate::domain_model::Jti;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{RedisError, Script};
use tracing::warn;

const RECORD_JTI: &str = include_str!("record_jti.lua");
const REVOKE_JTI: &str = include_str!("revoke_jti.lua");
const JTI_STATE: &str = include_str!("jti_state.lua");

const SCAN_BATCH: usize = 500;

/// Revocation registry on Redis. Every read and transition is one Lua
/// script, so it executes atomically against both keys of a JTI.
///
/// Keys are `{prefix}:jti:active:{<jti>}` and `{prefix}:jti:revoked:{<jti>}`;
/// the hash tag keeps both on one cluster slot.
pub struct RedisRevocationRegistry {
    conn: ConnectionManager,
    prefix: String,
    policy: JtiTtlPolicy,
    record_script: Script,
    revoke_script: Script,
    state_script: Script,
}

fn unavailable(e: RedisError) -> RegistryError {
    RegistryError::Unavailable(e.to_string())
}

fn decode_state(status: i64) -> Result<JtiState, RegistryError> {
    match status {
        0 => Ok(JtiState::Unknown),
        1 => Ok(JtiState::Active),
        2 => Ok(JtiState::Revoked),
        other => Err(RegistryError::Unavailable(format!(
            "unknown state script status {other}"
        ))),
    }
}

fn decode_revoke(status: i64) -> Result<RevokeOutcome, RegistryError> {
    match status {
        0 => Ok(RevokeOutcome::RevokedUntracked),
        1 => Ok(RevokeOutcome::Revoked),
        2 => Ok(RevokeOutcome::AlreadyRevoked),
        other => Err(RegistryError::Unavailable(format!(
            "unknown revoke script status {other}"
        ))),
    }
}

fn active_key(prefix: &str, jti: &Jti) -> String {
    format!("{prefix}:jti:active:{{{jti}}}")
}

fn revoked_key(prefix: &str, jti: &Jti) -> String {
    format!("{prefix}:jti:revoked:{{{jti}}}")
}

impl RedisRevocationRegistry {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>, policy: JtiTtlPolicy) -> Self {
        RedisRevocationRegistry {
            conn,
            prefix: prefix.into(),
            policy,
            record_script: Script::new(RECORD_JTI),
            revoke_script: Script::new(REVOKE_JTI),
            state_script: Script::new(JTI_STATE),
        }
    }

    fn active_key(&self, jti: &Jti) -> String {
        active_key(&self.prefix, jti)
    }

    fn revoked_key(&self, jti: &Jti) -> String {
        revoked_key(&self.prefix, jti)
    }

    fn ttl_millis(&self, expires_at: DateTime<Utc>) -> u64 {
        let ttl = self.policy.ttl_for(expires_at, Utc::now());
        (ttl.as_millis() as u64).max(1)
    }

    async fn count_matching(&self, pattern: &str) -> Result<u64, RegistryError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut count: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;
            count += keys.len() as u64;
            if next == 0 {
                return Ok(count);
            }
            cursor = next;
        }
    }
}

#[async_trait::async_trait]
impl RevocationRegistry for RedisRevocationRegistry {
    async fn record_jti(&self, jti: &Jti, expires_at: DateTime<Utc>) -> Result<(), RegistryError> {
        let mut conn = self.conn.clone();
        let recorded: i64 = self
            .record_script
            .key(self.active_key(jti))
            .key(self.revoked_key(jti))
            .arg(self.ttl_millis(expires_at))
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        if recorded == 0 {
            warn!(%jti, "refusing to record a revoked jti");
        }
        Ok(())
    }

    async fn revoke_jti(
        &self,
        jti: &Jti,
        expires_at: DateTime<Utc>,
    ) -> Result<RevokeOutcome, RegistryError> {
        let mut conn = self.conn.clone();
        let status: i64 = self
            .revoke_script
            .key(self.active_key(jti))
            .key(self.revoked_key(jti))
            .arg(self.ttl_millis(expires_at))
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        decode_revoke(status)
    }

    async fn jti_state(&self, jti: &Jti) -> Result<JtiState, RegistryError> {
        let mut conn = self.conn.clone();
        let status: i64 = self
            .state_script
            .key(self.active_key(jti))
            .key(self.revoked_key(jti))
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        decode_state(status)
    }

    async fn stats(&self) -> Result<JtiStats, RegistryError> {
        let active_count = self
            .count_matching(&format!("{}:jti:active:*", self.prefix))
            .await?;
        let revoked_count = self
            .count_matching(&format!("{}:jti:revoked:*", self.prefix))
            .await?;
        Ok(JtiStats {
            active_count,
            revoked_count,
            total_count: active_count + revoked_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_statuses_map_to_states() {
        assert_eq!(decode_state(0).unwrap(), JtiState::Unknown);
        assert_eq!(decode_state(1).unwrap(), JtiState::Active);
        assert_eq!(decode_state(2).unwrap(), JtiState::Revoked);
        assert!(decode_state(3).is_err());

        assert_eq!(decode_revoke(0).unwrap(), RevokeOutcome::RevokedUntracked);
        assert_eq!(decode_revoke(1).unwrap(), RevokeOutcome::Revoked);
        assert_eq!(decode_revoke(2).unwrap(), RevokeOutcome::AlreadyRevoked);
        assert!(matches!(
            decode_revoke(-1),
            Err(RegistryError::Unavailable(_))
        ));
    }

    #[test]
    fn scripts_check_revoked_key_first() {
        for script in [RECORD_JTI, REVOKE_JTI, JTI_STATE] {
            let revoked = script.find("'EXISTS', KEYS[2]").unwrap();
            let active = script.find(", KEYS[1]").unwrap();
            assert!(revoked < active);
        }
        assert!(REVOKE_JTI.contains("'DEL', KEYS[1]"));
        assert!(!JTI_STATE.contains("SET"));
    }

    #[test]
    fn both_keys_of_a_jti_share_a_hash_tag() {
        let jti = Jti("0f1e2d3c".into());
        assert_eq!(active_key("mp", &jti), "mp:jti:active:{0f1e2d3c}");
        assert_eq!(revoked_key("mp", &jti), "mp:jti:revoked:{0f1e2d3c}");
    }

    // $ MESHPOINT__REDIS__DSN=redis://127.0.0.1:6379 cargo test -- --ignored
    #[tokio::test]
    #[ignore = "needs a live Redis at MESHPOINT__REDIS__DSN"]
    async fn scripts_against_live_redis() {
        let dsn = std::env::var("MESHPOINT__REDIS__DSN").unwrap();
        let client = redis::Client::open(dsn).unwrap();
        let mut conn = client.get_connection_manager().await.unwrap();
        let prefix = format!("meshpoint-test-{}", nanoid::nanoid!(8));
        let registry = RedisRevocationRegistry::new(
            conn.clone(),
            prefix.clone(),
            JtiTtlPolicy::default(),
        );

        let jti = Jti::generate();
        let exp = Utc::now() + chrono::Duration::minutes(5);

        registry.record_jti(&jti, exp).await.unwrap();
        assert_eq!(registry.jti_state(&jti).await.unwrap(), JtiState::Active);
        let pttl: i64 = redis::cmd("PTTL")
            .arg(active_key(&prefix, &jti))
            .query_async(&mut conn)
            .await
            .unwrap();
        assert!(pttl > 5 * 60 * 1000);

        assert_eq!(
            registry.revoke_jti(&jti, exp).await.unwrap(),
            RevokeOutcome::Revoked
        );
        let active_left: i64 = redis::cmd("EXISTS")
            .arg(active_key(&prefix, &jti))
            .query_async(&mut conn)
            .await
            .unwrap();
        assert_eq!(active_left, 0);
        let pttl: i64 = redis::cmd("PTTL")
            .arg(revoked_key(&prefix, &jti))
            .query_async(&mut conn)
            .await
            .unwrap();
        assert!(pttl > 0);

        assert_eq!(
            registry.revoke_jti(&jti, exp).await.unwrap(),
            RevokeOutcome::AlreadyRevoked
        );

        registry.record_jti(&jti, exp).await.unwrap();
        assert_eq!(registry.jti_state(&jti).await.unwrap(), JtiState::Revoked);

        let untracked = Jti::generate();
        assert_eq!(
            registry.revoke_jti(&untracked, exp).await.unwrap(),
            RevokeOutcome::RevokedUntracked
        );
        assert_eq!(
            registry.jti_state(&Jti::generate()).await.unwrap(),
            JtiState::Unknown
        );

        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.active_count, 0);
        assert_eq!(stats.revoked_count, 2);

        let _: () = redis::cmd("DEL")
            .arg(revoked_key(&prefix, &jti))
            .arg(revoked_key(&prefix, &untracked))
            .query_async(&mut conn)
            .await
            .unwrap();
    }
}
