//! Redis backend tests against a running server.
//!
//! - Marked `#[ignore]`; run with `REDIS_URL=redis://127.0.0.1/ cargo test -- --ignored`.
//! - Keys are suffixed with the process id so parallel runs do not collide.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use relcache::application::context::OpContext;
use relcache::application::relations::RelationService;
use relcache::application::repos::RepoError;
use relcache::cache::{CacheClient, CacheConfig, RelationCache, follower_user_ids_key};
use relcache::domain::entities::RelationRecord;
use relcache::domain::types::RelationFlag;
use relcache::infra::cache::RedisCacheClient;
use relcache::infra::memory::InMemoryRelations;
use tokio::sync::Notify;

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

async fn connect() -> TestResult<RedisCacheClient> {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
    Ok(RedisCacheClient::connect(&url).await?)
}

fn owner(name: &str) -> String {
    format!("{name}-{}", std::process::id())
}

#[tokio::test]
#[ignore]
async fn live_redis_serves_second_read_from_cache() -> TestResult<()> {
    let client = connect().await?;
    let key = follower_user_ids_key(&owner("live-hit"));
    client.batch_delete(std::slice::from_ref(&key)).await?;

    let loads = AtomicUsize::new(0);
    for _ in 0..2 {
        let ids = client
            .get_or_load(
                &key,
                Duration::from_secs(30),
                async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, RepoError>(vec!["fan".to_string()])
                }
                .boxed(),
            )
            .await?;
        assert_eq!(ids, vec!["fan".to_string()]);
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    client.batch_delete(&[key]).await?;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_redis_write_invalidates_views() -> TestResult<()> {
    let client = Arc::new(connect().await?);
    let repo = Arc::new(InMemoryRelations::new());
    let config = CacheConfig::default();
    let service = RelationService::new(repo.clone(), RelationCache::new(client, repo, &config));
    let ctx = OpContext::background();
    let owner = owner("live-invalidate");

    service
        .create(
            &ctx,
            &[RelationRecord::new(owner.as_str(), "fan").with_flag(RelationFlag::Following, true)],
        )
        .await?;
    assert_eq!(
        service.get_follower_user_ids(&ctx, &owner).await?,
        vec!["fan".to_string()]
    );

    service.unfollow_user(&ctx, &owner, "fan").await?;
    assert!(service.get_follower_user_ids(&ctx, &owner).await?.is_empty());

    service.delete(&ctx, &[RelationRecord::new(owner.as_str(), "fan")]).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore]
async fn live_redis_drops_fill_invalidated_mid_load() -> TestResult<()> {
    let client = Arc::new(connect().await?);
    let key = follower_user_ids_key(&owner("live-race"));
    client.batch_delete(std::slice::from_ref(&key)).await?;

    let loaded = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let reader = {
        let client = Arc::clone(&client);
        let key = key.clone();
        let loaded = Arc::clone(&loaded);
        let release = Arc::clone(&release);
        tokio::spawn(async move {
            client
                .get_or_load(
                    &key,
                    Duration::from_secs(30),
                    async move {
                        loaded.notify_one();
                        release.notified().await;
                        Ok::<_, RepoError>(vec!["stale".to_string()])
                    }
                    .boxed(),
                )
                .await
        })
    };

    loaded.notified().await;
    client.batch_delete(std::slice::from_ref(&key)).await?;
    release.notify_one();
    assert_eq!(reader.await??, vec!["stale".to_string()]);

    let fresh = client
        .get_or_load(
            &key,
            Duration::from_secs(30),
            async { Ok::<_, RepoError>(Vec::new()) }.boxed(),
        )
        .await?;
    assert!(fresh.is_empty(), "stale fill must not survive the delete");

    client.batch_delete(&[key]).await?;
    Ok(())
}
