//! cro-redis: drives one Redis resource through the ElastiCache provider.
//!
//! Runs the reconcile loop against the in-memory cloud until the instance is
//! provisioned (and, with `--delete`, torn down again), then prints the
//! collected metrics in Prometheus text format.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use clap::Parser;
use cro_metrics::{DEFAULT_RESET_PERIOD, MetricsRegistry};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cro_redis::clients::ResourceClient;
use cro_redis::reconciler::strategy::REDIS_RESOURCE_TYPE;
use cro_redis::sim::{SimulatedCloud, SimulatedKube};
use cro_redis::types::PRODUCT_NAME_LABEL;
use cro_redis::{
    AwsRedisProvider, ConfigMapConfigManager, Context, ProviderConfig, Redis, RedisMonitoring,
    RedisProvider, StaticCredentialManager,
};

/// ElastiCache Redis provider driver
#[derive(Parser, Debug)]
#[command(name = "cro-redis", version, about)]
struct Args {
    /// Namespace of the Redis resource
    #[arg(long, default_value = "cloud-resources")]
    namespace: String,

    /// Name of the Redis resource
    #[arg(long, default_value = "example-redis")]
    name: String,

    /// Strategy tier
    #[arg(long, default_value = "production")]
    tier: String,

    /// Resource type label
    #[arg(long, default_value = "managed")]
    resource_type: String,

    /// Product label, added as a tag when set
    #[arg(long)]
    product: Option<String>,

    /// Infrastructure identifier of the cluster
    #[arg(long, default_value = "sim-cluster")]
    cluster_id: String,

    /// JSON strategy document (resource type -> tier -> strategy)
    #[arg(long)]
    strategy_file: Option<String>,

    /// Seconds between ticks (defaults to the provider's reconcile time)
    #[arg(long)]
    interval: Option<u64>,

    /// Steady-state reconcile time in seconds
    #[arg(long)]
    reconcile_time: Option<u64>,

    /// Tear the instance down once provisioned
    #[arg(long)]
    delete: bool,

    /// Give up after this many ticks per phase
    #[arg(long, default_value = "20")]
    max_ticks: u32,

    /// Metrics reset period in seconds
    #[arg(long, default_value_t = DEFAULT_RESET_PERIOD.as_secs())]
    metrics_reset_period: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cro_redis=info,cro_metrics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let strategies = load_strategies(&args).await?;
    let mut config = ProviderConfig::default();
    if let Some(secs) = args.reconcile_time {
        config = config.with_forced_reconcile_time(Duration::from_secs(secs));
    }

    let registry = Arc::new(MetricsRegistry::new());
    let reset_task =
        registry.spawn_reset_loop(Duration::from_secs(args.metrics_reset_period.max(1)));

    let cloud = SimulatedCloud::new();
    let kube = Arc::new(SimulatedKube::new(&args.cluster_id));
    let provider = AwsRedisProvider::new(
        config,
        kube.clone(),
        Arc::new(StaticCredentialManager::new("AKIASIMULATED", "simulated")),
        Arc::new(strategies),
        Arc::new(cloud.clone()),
        RedisMonitoring::new(registry.clone(), kube.clone()),
    );

    let mut redis = Redis::new(&args.namespace, &args.name, &args.resource_type, &args.tier);
    if let Some(product) = &args.product {
        redis
            .metadata
            .labels
            .insert(PRODUCT_NAME_LABEL.to_string(), product.clone());
    }

    let (ctx, cancel) = Context::with_cancel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling reconcile");
            cancel.cancel();
        }
    });

    info!(
        "Starting {} for {}/{} (tier {})",
        provider.name(),
        args.namespace,
        args.name,
        args.tier
    );

    provision(&ctx, &provider, kube.as_ref(), &mut redis, &args).await?;
    if args.delete {
        redis.metadata.deletion_timestamp = Some(chrono::Utc::now().to_rfc3339());
        decommission(&ctx, &provider, kube.as_ref(), &mut redis, &args).await?;
    }

    print!("{}", registry.render()?);
    reset_task.abort();
    Ok(())
}

async fn load_strategies(args: &Args) -> Result<ConfigMapConfigManager> {
    match &args.strategy_file {
        Some(path) => {
            let document = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading strategy file {}", path))?;
            Ok(ConfigMapConfigManager::from_document(&document)?)
        }
        None => {
            let mut tiers = serde_json::Map::new();
            tiers.insert(
                args.tier.clone(),
                serde_json::json!({"region": "", "createStrategy": {}, "deleteStrategy": {}}),
            );
            let mut data = BTreeMap::new();
            data.insert(
                REDIS_RESOURCE_TYPE.to_string(),
                serde_json::Value::Object(tiers).to_string(),
            );
            Ok(ConfigMapConfigManager::new(data))
        }
    }
}

async fn provision(
    ctx: &Context,
    provider: &AwsRedisProvider,
    kube: &SimulatedKube,
    redis: &mut Redis,
    args: &Args,
) -> Result<()> {
    for tick in 1..=args.max_ticks {
        match provider.create_redis(ctx, redis).await {
            Ok(outcome) => {
                info!("Tick {}: {}", tick, outcome.status);
                if let Some(cluster) = outcome.cluster {
                    info!(
                        "Redis available at {}:{}",
                        cluster.deployment_details.uri, cluster.deployment_details.port
                    );
                    persist(kube, redis).await;
                    return Ok(());
                }
            }
            Err(e) if e.is_retryable() => error!("Tick {}: {}", tick, e),
            Err(e) => bail!("provisioning failed: {}", e),
        }
        persist(kube, redis).await;
        pause(ctx, provider, redis, args).await?;
    }
    bail!("not provisioned after {} ticks", args.max_ticks)
}

async fn decommission(
    ctx: &Context,
    provider: &AwsRedisProvider,
    kube: &SimulatedKube,
    redis: &mut Redis,
    args: &Args,
) -> Result<()> {
    for tick in 1..=args.max_ticks {
        match provider.delete_redis(ctx, redis).await {
            Ok(status) if status.is_empty() => {
                info!("Tick {}: replication group removed", tick);
                return Ok(());
            }
            Ok(status) => info!("Tick {}: {}", tick, status),
            Err(e) if e.is_retryable() => error!("Tick {}: {}", tick, e),
            Err(e) => bail!("deletion failed: {}", e),
        }
        persist(kube, redis).await;
        pause(ctx, provider, redis, args).await?;
    }
    bail!("not deleted after {} ticks", args.max_ticks)
}

async fn persist(kube: &SimulatedKube, redis: &Redis) {
    if let Err(e) = kube.update_redis(redis).await {
        warn!("Failed to persist status of {}: {}", redis.name(), e);
    }
}

async fn pause(
    ctx: &Context,
    provider: &AwsRedisProvider,
    redis: &Redis,
    args: &Args,
) -> Result<()> {
    let wait = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| provider.reconcile_time(redis));
    ctx.run("wait for next tick", tokio::time::sleep(wait)).await?;
    Ok(())
}
