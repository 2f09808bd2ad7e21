use expiry_map::{ExpiringMap, ExpiryConfig, Ttl, env_var};
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

// Walks through the ttl lifecycle: default ttl, explicit ttl, reset, expire, never.
// ./expiry-map --interval 0.1 --log_level debug --ttl 3
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_var!(
        defaults: {
            interval: f64 = 0.1,
            log_level: tracing::Level = tracing::Level::INFO,
        },
        optional: {
            ttl
        }
    );

    let filter = EnvFilter::new(format!("expiry_map={}", log_level.as_str().to_lowercase()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let default_ttl = ttl.map(|s| s.parse::<f64>()).transpose()?;
    let config = ExpiryConfig::from_secs(default_ttl.or(Some(3.0)), interval)?;
    let demo = ExpiringMap::new(config);

    demo.on_key_expired(|key: &String| info!("key {key} has been deleted"));
    demo.on_batch_expired(|count| info!("deleted {count} elements"));

    demo.insert("toto".to_string(), "abc");
    // no such key yet, so nothing happens
    demo.reset_ttl(&"tata".to_string(), Ttl::secs(3));
    demo.set_with_ttl("tutu".to_string(), "val", Ttl::secs(500));
    demo.reset_ttl(&"tutu".to_string(), Ttl::secs(1000));
    sleep(Duration::from_secs(1)).await;
    info!(len = demo.len(), "init ok");

    demo.reset_ttl(&"tutu".to_string(), Ttl::millis(0));
    demo.expire_now(&"toto".to_string());
    demo.set_with_ttl("noExp".to_string(), "val", Ttl::Never);
    sleep(Duration::from_secs(3)).await;
    info!(len = demo.len(), "after expiring toto and tutu");

    demo.reset_ttl(&"noExp".to_string(), Ttl::secs(100));
    sleep(Duration::from_secs(3)).await;
    info!(remaining = ?demo.remaining_ttl(&"noExp".to_string()), "noExp now has a deadline");

    demo.set_with_ttl("noExp".to_string(), "val", Ttl::Never);
    demo.remove(&"noExp".to_string())?;
    info!(len = demo.len(), "done");

    demo.close().await?;
    Ok(())
}
