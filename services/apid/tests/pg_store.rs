#![cfg(feature = "pg-tests")]

use apid::auth::principal::Principal;
use apid::config::PostgresConfig;
use apid::context::RequestContext;
use apid::model::{CheckConfig, Handler, HandlerType};
use apid::store::postgres::PostgresStore;
use apid::store::{ResourceStore, StoreBackend};

async fn pg_store() -> Option<PostgresStore> {
    let url = match std::env::var("APID_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("skipping pg-tests: set APID_TEST_DATABASE_URL or DATABASE_URL");
            return None;
        }
    };
    let config = PostgresConfig {
        url,
        max_connections: 5,
        acquire_timeout_ms: 2_000,
    };
    let store = match PostgresStore::connect(&config).await {
        Ok(store) => store,
        Err(err) => {
            eprintln!("skipping pg-tests: cannot connect to postgres: {err}");
            return None;
        }
    };
    Some(store)
}

fn ctx() -> RequestContext {
    RequestContext::new(Principal::new("pg-tests", Vec::new()))
}

fn check(name: &str, interval: u32) -> CheckConfig {
    CheckConfig {
        name: name.to_string(),
        interval,
        command: "true".to_string(),
        subscriptions: vec!["linux".to_string()],
        handlers: Vec::new(),
        runtime_assets: Vec::new(),
        environment: "default".to_string(),
        organization: "default".to_string(),
    }
}

#[tokio::test]
async fn postgres_round_trips_checks_and_handlers() {
    let Some(store) = pg_store().await else {
        return;
    };
    let ctx = ctx();
    assert!(store.is_durable());
    store.health_check().await.expect("health");

    for name in ["pg-b", "pg-a"] {
        ResourceStore::<CheckConfig>::delete_by_name(&store, &ctx, name)
            .await
            .expect("clean");
    }
    store.upsert(&ctx, check("pg-b", 10)).await.expect("insert b");
    store.upsert(&ctx, check("pg-a", 10)).await.expect("insert a");
    store.upsert(&ctx, check("pg-a", 20)).await.expect("update a");

    let fetched = ResourceStore::<CheckConfig>::get_by_name(&store, &ctx, "pg-a")
        .await
        .expect("get");
    assert_eq!(fetched.map(|c| c.interval), Some(20));

    let all = ResourceStore::<CheckConfig>::get_all(&store, &ctx)
        .await
        .expect("all");
    let ours: Vec<&str> = all
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| name.starts_with("pg-"))
        .collect();
    assert_eq!(ours, vec!["pg-a", "pg-b"]);

    let handler = Handler {
        name: "pg-a".to_string(),
        handler_type: HandlerType::Pipe,
        mutator: None,
        command: "cat".to_string(),
        timeout: 0,
        socket: None,
        handlers: Vec::new(),
        filters: Vec::new(),
        environment: "default".to_string(),
        organization: "default".to_string(),
    };
    store.upsert(&ctx, handler).await.expect("handler");
    ResourceStore::<CheckConfig>::delete_by_name(&store, &ctx, "pg-a")
        .await
        .expect("delete check");
    let missing = ResourceStore::<CheckConfig>::get_by_name(&store, &ctx, "pg-a")
        .await
        .expect("get");
    assert!(missing.is_none());
    let kept = ResourceStore::<Handler>::get_by_name(&store, &ctx, "pg-a")
        .await
        .expect("get");
    assert!(kept.is_some());

    ResourceStore::<Handler>::delete_by_name(&store, &ctx, "pg-a")
        .await
        .expect("clean handler");
    ResourceStore::<CheckConfig>::delete_by_name(&store, &ctx, "pg-b")
        .await
        .expect("clean b");
}
