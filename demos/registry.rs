//! Several pools managed through one registry

use lifecycle_pool::{PoolConfiguration, PoolRegistry};
use std::time::Duration;

#[derive(Debug)]
struct Connection {
    dsn: &'static str,
}

#[tokio::main]
async fn main() {
    println!("=== lifecycle_pool - Registry ===\n");

    // Pools keyed by object type
    let registry: PoolRegistry = PoolRegistry::new();
    registry
        .register_type(PoolConfiguration::new(|| Ok(Vec::<u8>::with_capacity(1024))).with_initial_size(2))
        .unwrap();
    registry
        .register_type(PoolConfiguration::new(|| Ok(String::with_capacity(256))).with_initial_size(1))
        .unwrap();

    {
        let buffers = registry.pool_for::<Vec<u8>>().unwrap();
        let strings = registry.pool_for::<String>().unwrap();
        let _buf = buffers.acquire().unwrap();
        let _text = strings.acquire().unwrap();

        let total = registry.total_stats();
        println!("Type-keyed pools: {}, in use {}", registry.len(), total.in_use);
    }

    // Pools keyed by name
    let named = PoolRegistry::<&'static str>::new();
    for dsn in ["primary", "replica"] {
        named
            .get_or_create(dsn, PoolConfiguration::new(move || Ok(Connection { dsn })).with_max_size(4))
            .unwrap();
    }
    named.resize(&"replica", 3).unwrap();

    let replica = named.get::<Connection>(&"replica").unwrap();
    println!("Replica connection: {}", replica.acquire().unwrap().dsn);

    let mut categories = named.categories();
    categories.sort();
    for name in categories {
        println!("  {name}: {:?}", named.stats()[&name]);
    }

    named.remove(&"primary", Duration::from_secs(1)).await.unwrap();
    println!("After removal: {:?}", named.categories());

    registry.close_all(Duration::from_secs(1)).await.unwrap();
    named.close_all(Duration::from_secs(1)).await.unwrap();
    println!("Registries closed");
}
