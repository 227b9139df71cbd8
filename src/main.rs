use std::{process, sync::Arc};

use relcache::{
    application::{
        context::OpContext,
        error::AppError,
        relations::RelationService,
        repos::RelationsRepo,
    },
    cache::{CacheClient, CacheConfig, MemoryCacheClient, RelationCache},
    config::{self, CacheBackend, Command, CreateArgs, PairArgs, StoreBackend},
    domain::{entities::RelationRecord, types::RelationFlag},
    infra::{
        cache::RedisCacheClient, db::PostgresRepositories, error::InfraError,
        memory::InMemoryRelations, telemetry,
    },
};
use tracing::{Dispatch, Level, debug, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let repo = init_store(&settings).await?;
    if matches!(cli_args.command, Command::Migrate) {
        info!("migrations applied");
        return Ok(());
    }

    let client = init_cache_client(&settings).await?;
    let cache = RelationCache::new(client, repo.clone(), &CacheConfig::from(&settings.cache));
    let service = RelationService::new(repo, cache);

    let ctx = operation_context(&settings);
    cancel_on_interrupt(&ctx);

    match cli_args.command {
        Command::Migrate => Ok(()),
        Command::Create(args) => run_create(&service, &ctx, args).await,
        Command::Delete(args) => {
            let relations = records(args.pairs);
            service.delete(&ctx, &relations).await?;
            info!(count = relations.len(), "relations deleted");
            Ok(())
        }
        Command::Block(pair) => run_flag(&service, &ctx, pair, RelationFlag::Blocked, true).await,
        Command::Unblock(pair) => {
            run_flag(&service, &ctx, pair, RelationFlag::Blocked, false).await
        }
        Command::Follow(pair) => {
            run_flag(&service, &ctx, pair, RelationFlag::Following, true).await
        }
        Command::Unfollow(pair) => {
            run_flag(&service, &ctx, pair, RelationFlag::Following, false).await
        }
        Command::Subscribe(pair) => {
            run_flag(&service, &ctx, pair, RelationFlag::Subscribed, true).await
        }
        Command::Unsubscribe(pair) => {
            run_flag(&service, &ctx, pair, RelationFlag::Subscribed, false).await
        }
        Command::Show(pair) => {
            let record = service.take(&ctx, &pair.owner, &pair.related).await?;
            let rendered = serde_json::to_string_pretty(&record)
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            println!("{rendered}");
            Ok(())
        }
        Command::Followers(owner) => {
            print_ids(service.get_follower_user_ids(&ctx, &owner.owner).await?);
            Ok(())
        }
        Command::Subscribers(owner) => {
            print_ids(service.get_subscriber_user_ids(&ctx, &owner.owner).await?);
            Ok(())
        }
    }
}

async fn init_store(settings: &config::Settings) -> Result<Arc<dyn RelationsRepo>, AppError> {
    match settings.store {
        StoreBackend::Memory => {
            warn!("memory store selected; relations are dropped when the process exits");
            Ok(Arc::new(InMemoryRelations::new()))
        }
        StoreBackend::Postgres => {
            let database_url = settings
                .database
                .url
                .as_ref()
                .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

            let pool =
                PostgresRepositories::connect(database_url, settings.database.max_connections.get())
                    .await
                    .map_err(|err| InfraError::database(err.to_string()))?;

            PostgresRepositories::run_migrations(&pool)
                .await
                .map_err(|err| InfraError::database(err.to_string()))?;

            Ok(Arc::new(PostgresRepositories::new(pool)))
        }
    }
}

async fn init_cache_client(settings: &config::Settings) -> Result<Arc<dyn CacheClient>, AppError> {
    match settings.cache.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCacheClient::new(&CacheConfig::from(
            &settings.cache,
        )))),
        CacheBackend::Redis => {
            let url = settings
                .cache
                .redis_url
                .as_deref()
                .ok_or_else(|| InfraError::configuration("redis url is not configured"))?;
            let client = RedisCacheClient::connect(url)
                .await
                .map_err(|err| InfraError::cache(err.to_string()))?;
            Ok(Arc::new(client))
        }
    }
}

fn operation_context(settings: &config::Settings) -> OpContext {
    let ctx = OpContext::background();
    match settings.operations.timeout {
        Some(timeout) => ctx.with_timeout(timeout),
        None => ctx,
    }
}

fn cancel_on_interrupt(ctx: &OpContext) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, canceling operation");
            ctx.cancel();
        }
    });
}

async fn run_create(
    service: &RelationService,
    ctx: &OpContext,
    args: CreateArgs,
) -> Result<(), AppError> {
    let relations: Vec<RelationRecord> = records(args.pairs.pairs)
        .into_iter()
        .map(|record| {
            record
                .with_flag(RelationFlag::Blocked, args.blocked)
                .with_flag(RelationFlag::Following, args.following)
                .with_flag(RelationFlag::Subscribed, args.subscribed)
        })
        .collect();

    service.create(ctx, &relations).await?;
    info!(count = relations.len(), "relations created");
    Ok(())
}

async fn run_flag(
    service: &RelationService,
    ctx: &OpContext,
    pair: PairArgs,
    flag: RelationFlag,
    value: bool,
) -> Result<(), AppError> {
    let PairArgs { owner, related } = pair;
    match (flag, value) {
        (RelationFlag::Blocked, true) => service.block_user(ctx, &owner, &related).await?,
        (RelationFlag::Blocked, false) => service.unblock_user(ctx, &owner, &related).await?,
        (RelationFlag::Following, true) => service.follow_user(ctx, &owner, &related).await?,
        (RelationFlag::Following, false) => service.unfollow_user(ctx, &owner, &related).await?,
        (RelationFlag::Subscribed, true) => service.subscribe_user(ctx, &owner, &related).await?,
        (RelationFlag::Subscribed, false) => {
            service.unsubscribe_user(ctx, &owner, &related).await?
        }
    }
    info!(%owner, %related, %flag, value, "relation updated");
    Ok(())
}

fn records(pairs: Vec<(String, String)>) -> Vec<RelationRecord> {
    pairs
        .into_iter()
        .map(|(owner, related)| RelationRecord::new(owner, related))
        .collect()
}

fn print_ids(ids: Vec<String>) {
    for id in ids {
        println!("{id}");
    }
}
