/// Exercises the Redis revocation registry against a live server.
///
/// $ cargo run --bin registry_demo -- --settings=settings/dev.toml
use chrono::Utc;
use meshpoint::domain_model::Jti;
use meshpoint::domain_port::{RevocationRegistry, RevokeOutcome};
use meshpoint::infra_redis::RedisRevocationRegistry;
use meshpoint::settings::*;
use nanoid::nanoid;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::new("registry_demo=debug,meshpoint=debug"))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = parse_settings(cli.settings.as_deref())?;

    let alphabet: [char; 16] = [
        '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
    ];
    let run_id = nanoid!(10, &alphabet);
    let prefix = format!("{}-demo-{}", settings.redis.prefix, run_id);

    let client = redis::Client::open(settings.redis.dsn.expose())?;
    let manager = client.get_connection_manager().await?;
    let registry = Arc::new(RedisRevocationRegistry::new(
        manager,
        prefix,
        settings.auth.ttl_policy(),
    ));

    let exp = Utc::now() + chrono::Duration::minutes(5);
    let jti = Jti::generate();
    registry.record_jti(&jti, exp).await?;
    tracing::info!(state = ?registry.jti_state(&jti).await?, "after record");

    // Only one concurrent revoke may observe the active mark.
    let mut racers = JoinSet::new();
    for _ in 0..8 {
        let registry = registry.clone();
        let jti = jti.clone();
        racers.spawn(async move { registry.revoke_jti(&jti, exp).await });
    }
    let mut winners = 0;
    while let Some(outcome) = racers.join_next().await {
        if outcome?? == RevokeOutcome::Revoked {
            winners += 1;
        }
    }
    tracing::info!(winners, "concurrent revokes");

    registry.record_jti(&jti, exp).await?;
    tracing::info!(state = ?registry.jti_state(&jti).await?, "record after revoke");
    tracing::info!(stats = ?registry.stats().await?, "registry stats");

    Ok(())
}
