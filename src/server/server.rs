use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::*;
use crate::settings::{Secret, Settings};
use nanoid::nanoid;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub session_service: Arc<dyn SessionService>,
    pub device_session_service: Arc<dyn DeviceSessionService>,
    pub request_timeout: Duration,
    pub secure_cookies: bool,
    pub refresh_ttl: Duration,
    pub service_key: Secret,
    stats_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let alphabet: [char; 16] = [
            '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
        ];
        let instance_id = nanoid!(10, &alphabet);

        let auth = &settings.auth;
        if auth.service_key.expose().is_empty() {
            return Err(anyhow::anyhow!("auth.service_key must not be empty"));
        }
        let registry: Arc<dyn RevocationRegistry> = match auth.registry.as_str() {
            "memory" => Arc::new(MemoryRevocationRegistry::new(auth.ttl_policy())),
            "redis" => {
                let redis_client = redis::Client::open(settings.redis.dsn.expose())?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisRevocationRegistry::new(
                    redis_manager,
                    settings.redis.prefix.clone(),
                    auth.ttl_policy(),
                ))
            }
            other => return Err(anyhow::anyhow!("Unknown registry backend: {}", other)),
        };

        let codec = Arc::new(JwtHs256Codec::new(auth.jwt_config())?);
        let role_directory: Arc<dyn RoleDirectory> =
            Arc::new(MemoryRoleDirectory::new(auth.default_roles.clone()));

        let session_service: Arc<dyn SessionService> = Arc::new(SessionIssuer::new(
            codec.clone(),
            registry.clone(),
            role_directory,
            auth.session_ttls(),
        ));
        let device_session_service: Arc<dyn DeviceSessionService> = Arc::new(
            DeviceSessionIssuer::new(codec, registry.clone(), auth.device_ttls()),
        );

        let cancel = CancellationToken::new();
        let reporter = StatsReporter::new(
            registry,
            Duration::from_secs(settings.stats.interval_secs.max(1)),
            &instance_id,
            cancel.clone(),
        );
        let stats_handle = tokio::spawn(async move {
            if let Err(e) = reporter.run().await {
                error!("StatsReporter stopped: {:#}", e);
            }
        });

        info!(%instance_id, registry = %auth.registry, "server started");

        Ok(Self {
            session_service,
            device_session_service,
            request_timeout: auth.registry_timeout(),
            secure_cookies: settings.http.secure_cookies,
            refresh_ttl: auth.session_ttls().refresh_ttl,
            service_key: auth.service_key.clone(),
            stats_handle: Mutex::new(Some(stats_handle)),
            cancel,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = match self.stats_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let r = handle.await;
            info!("stats reporter handle dropped: {:?}", r);
        }
    }
}
