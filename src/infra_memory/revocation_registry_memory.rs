use crate::domain_model::Jti;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Mark {
    Active,
    Revoked,
}

#[derive(Debug, Clone, Copy)]
struct Record {
    mark: Mark,
    evict_at: DateTime<Utc>,
}

impl Record {
    fn live(&self, now: DateTime<Utc>) -> bool {
        self.evict_at > now
    }
}

/// Single-process registry. Each operation holds the shard lock of its key,
/// which makes every transition atomic.
pub struct MemoryRevocationRegistry {
    records: DashMap<String, Record>,
    policy: JtiTtlPolicy,
}

impl Default for MemoryRevocationRegistry {
    fn default() -> Self {
        Self::new(JtiTtlPolicy::default())
    }
}

impl MemoryRevocationRegistry {
    pub fn new(policy: JtiTtlPolicy) -> Self {
        Self {
            records: DashMap::new(),
            policy,
        }
    }

    fn deadline(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.policy.ttl_for(expires_at, now))
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[async_trait::async_trait]
impl RevocationRegistry for MemoryRevocationRegistry {
    async fn record_jti(&self, jti: &Jti, expires_at: DateTime<Utc>) -> Result<(), RegistryError> {
        let now = Utc::now();
        let evict_at = self.deadline(expires_at, now);
        match self.records.entry(jti.0.clone()) {
            Entry::Occupied(mut o) => {
                let current = o.get_mut();
                if current.live(now) && current.mark == Mark::Revoked {
                    return Ok(());
                }
                *current = Record {
                    mark: Mark::Active,
                    evict_at,
                };
            }
            Entry::Vacant(v) => {
                v.insert(Record {
                    mark: Mark::Active,
                    evict_at,
                });
            }
        }
        Ok(())
    }

    async fn revoke_jti(
        &self,
        jti: &Jti,
        expires_at: DateTime<Utc>,
    ) -> Result<RevokeOutcome, RegistryError> {
        let now = Utc::now();
        let revoked = Record {
            mark: Mark::Revoked,
            evict_at: self.deadline(expires_at, now),
        };
        let outcome = match self.records.entry(jti.0.clone()) {
            Entry::Occupied(mut o) => {
                let current = o.get_mut();
                match (current.live(now), current.mark) {
                    (true, Mark::Revoked) => RevokeOutcome::AlreadyRevoked,
                    (true, Mark::Active) => {
                        *current = revoked;
                        RevokeOutcome::Revoked
                    }
                    (false, _) => {
                        *current = revoked;
                        RevokeOutcome::RevokedUntracked
                    }
                }
            }
            Entry::Vacant(v) => {
                v.insert(revoked);
                RevokeOutcome::RevokedUntracked
            }
        };
        Ok(outcome)
    }

    async fn jti_state(&self, jti: &Jti) -> Result<JtiState, RegistryError> {
        let now = Utc::now();
        let state = match self.records.get(jti.as_str()) {
            Some(record) if record.live(now) => match record.mark {
                Mark::Active => JtiState::Active,
                Mark::Revoked => JtiState::Revoked,
            },
            _ => JtiState::Unknown,
        };
        Ok(state)
    }

    async fn stats(&self) -> Result<JtiStats, RegistryError> {
        let now = Utc::now();
        self.records.retain(|_, record| record.live(now));

        let mut stats = JtiStats::default();
        for record in self.records.iter() {
            match record.mark {
                Mark::Active => stats.active_count += 1,
                Mark::Revoked => stats.revoked_count += 1,
            }
        }
        stats.total_count = stats.active_count + stats.revoked_count;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn in_one_hour() -> DateTime<Utc> {
        Utc::now() + chrono::Duration::hours(1)
    }

    #[tokio::test]
    async fn never_recorded_jti_is_revoked() {
        let registry = MemoryRevocationRegistry::default();
        assert!(registry.is_jti_revoked(&Jti::generate()).await.unwrap());
    }

    #[tokio::test]
    async fn record_then_revoke() {
        let registry = MemoryRevocationRegistry::default();
        let jti = Jti::generate();
        registry.record_jti(&jti, in_one_hour()).await.unwrap();
        assert_eq!(registry.jti_state(&jti).await.unwrap(), JtiState::Active);
        assert!(!registry.is_jti_revoked(&jti).await.unwrap());

        let outcome = registry.revoke_jti(&jti, in_one_hour()).await.unwrap();
        assert_eq!(outcome, RevokeOutcome::Revoked);
        assert!(registry.is_jti_revoked(&jti).await.unwrap());
    }

    #[tokio::test]
    async fn second_revoke_is_a_noop() {
        let registry = MemoryRevocationRegistry::default();
        let jti = Jti::generate();
        registry.record_jti(&jti, in_one_hour()).await.unwrap();
        registry.revoke_jti(&jti, in_one_hour()).await.unwrap();
        let again = registry.revoke_jti(&jti, in_one_hour()).await.unwrap();
        assert_eq!(again, RevokeOutcome::AlreadyRevoked);
        assert_eq!(registry.jti_state(&jti).await.unwrap(), JtiState::Revoked);
    }

    #[tokio::test]
    async fn revoking_unknown_jti_leaves_a_marker() {
        let registry = MemoryRevocationRegistry::default();
        let jti = Jti::generate();
        let outcome = registry.revoke_jti(&jti, in_one_hour()).await.unwrap();
        assert_eq!(outcome, RevokeOutcome::RevokedUntracked);
        assert_eq!(registry.jti_state(&jti).await.unwrap(), JtiState::Revoked);
    }

    #[tokio::test]
    async fn record_does_not_resurrect() {
        let registry = MemoryRevocationRegistry::default();
        let jti = Jti::generate();
        registry.record_jti(&jti, in_one_hour()).await.unwrap();
        registry.revoke_jti(&jti, in_one_hour()).await.unwrap();
        registry.record_jti(&jti, in_one_hour()).await.unwrap();
        assert_eq!(registry.jti_state(&jti).await.unwrap(), JtiState::Revoked);
    }

    #[tokio::test]
    async fn elapsed_records_revert_to_unknown() {
        let registry = MemoryRevocationRegistry::new(JtiTtlPolicy {
            fallback: Duration::ZERO,
            clock_skew_buffer: Duration::ZERO,
        });
        let jti = Jti::generate();
        let expired = Utc::now() - chrono::Duration::minutes(1);
        registry.record_jti(&jti, expired).await.unwrap();
        assert_eq!(registry.jti_state(&jti).await.unwrap(), JtiState::Unknown);
        assert_eq!(registry.stats().await.unwrap(), JtiStats::default());
    }

    #[tokio::test]
    async fn stats_counts_each_state() {
        let registry = MemoryRevocationRegistry::default();
        for _ in 0..3 {
            registry.record_jti(&Jti::generate(), in_one_hour()).await.unwrap();
        }
        let revoked = Jti::generate();
        registry.record_jti(&revoked, in_one_hour()).await.unwrap();
        registry.revoke_jti(&revoked, in_one_hour()).await.unwrap();

        let stats = registry.stats().await.unwrap();
        assert_eq!(
            stats,
            JtiStats {
                active_count: 3,
                revoked_count: 1,
                total_count: 4,
            }
        );
    }

    #[tokio::test]
    async fn concurrent_revokes_have_one_winner() {
        let registry = Arc::new(MemoryRevocationRegistry::default());
        let jti = Jti::generate();
        registry.record_jti(&jti, in_one_hour()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            let jti = jti.clone();
            handles.push(tokio::spawn(async move {
                registry.revoke_jti(&jti, in_one_hour()).await.unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() == RevokeOutcome::Revoked {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
