use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use quorum_gossip::gossip::handlers::*;
use quorum_gossip::gossip::protocol::*;
use quorum_gossip::gossip::{GossipConfig, Gossiper, run_on_rcv_data};
use quorum_gossip::membership::types::{NodeId, NodeUpdate};
use quorum_gossip::quorum::QuorumProviderType;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} --bind <addr:port> [--id <node-id>] [--gen <n>] [--domain <name>] \
             [--quorum default|failure-domains|noop] [--seed <node-id>@<addr:port>]...",
            args[0]
        );
        eprintln!("Example: {} --bind 127.0.0.1:5000 --id n1", args[0]);
        eprintln!(
            "Example: {} --bind 127.0.0.1:5001 --id n2 --seed n1@127.0.0.1:5000",
            args[0]
        );

        std::process::exit(1);
    }

    let mut bind_addr: Option<SocketAddr> = None;
    let mut node_id: Option<NodeId> = None;
    let mut gen_number: u64 = 1;
    let mut cluster_domain = String::new();
    let mut quorum_provider = QuorumProviderType::Default;
    let mut seeds: Vec<(NodeId, String)> = vec![];

    let mut i = 1;
    while i + 1 < args.len() {
        let value = args[i + 1].as_str();
        match args[i].as_str() {
            "--bind" => bind_addr = Some(value.parse()?),
            "--id" => node_id = Some(NodeId::from(value)),
            "--gen" => gen_number = value.parse()?,
            "--domain" => cluster_domain = value.to_string(),
            "--quorum" => {
                quorum_provider = match value {
                    "failure-domains" => QuorumProviderType::FailureDomains,
                    "noop" => QuorumProviderType::Noop,
                    _ => QuorumProviderType::Default,
                }
            }
            "--seed" => match value.split_once('@') {
                Some((id, addr)) => seeds.push((NodeId::from(id), addr.to_string())),
                None => anyhow::bail!("--seed expects <node-id>@<addr:port>, got {}", value),
            },
            _ => {
                i += 1;
                continue;
            }
        }
        i += 2;
    }

    let bind_addr = bind_addr.ok_or_else(|| anyhow::anyhow!("--bind is required"))?;
    let http_addr = http_addr_for(bind_addr)?;
    let config = GossipConfig {
        node_id: node_id.unwrap_or_default(),
        gossip_addr: bind_addr.to_string(),
        gen_number,
        cluster_domain: cluster_domain.clone(),
        quorum_provider,
        ..GossipConfig::default()
    };

    tracing::info!("Starting node {} on {}", config.node_id, bind_addr);
    if !seeds.is_empty() {
        tracing::info!("Seed nodes: {:?}", seeds);
    } else {
        tracing::info!("Starting as seed node (founder)");
    }

    // 1. Gossiper:
    let gossiper = Gossiper::with_tcp(config);

    // 2. Gossip listener:
    let shutdown = CancellationToken::new();
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let server = gossiper.clone();
    tokio::spawn(run_on_rcv_data(listener, shutdown.clone(), move |channel| {
        server.clone().serve_channel(channel)
    }));

    // 3. Cluster membership from the seeds (everyone in our domain):
    let mut cluster: HashMap<NodeId, NodeUpdate> = seeds
        .iter()
        .map(|(id, addr)| {
            (
                id.clone(),
                NodeUpdate {
                    addr: addr.clone(),
                    quorum_member: true,
                    cluster_domain: cluster_domain.clone(),
                },
            )
        })
        .collect();
    cluster.insert(
        gossiper.node_id().clone(),
        NodeUpdate {
            addr: bind_addr.to_string(),
            quorum_member: true,
            cluster_domain: cluster_domain.clone(),
        },
    );
    gossiper.update_cluster(cluster);
    if quorum_provider == QuorumProviderType::FailureDomains {
        gossiper.update_cluster_domains_active_map(HashMap::from([(
            cluster_domain,
            quorum_gossip::membership::types::ClusterDomainState::Active,
        )]));
    }

    // 4. Gossip loops:
    gossiper.start()?;

    // 5. Spawn status feed logger:
    let mut status_rx = gossiper.subscribe();
    tokio::spawn(async move {
        while let Ok(change) = status_rx.recv().await {
            tracing::info!("Status change: {} {} -> {}", change.node, change.from, change.to);
        }
    });

    // 6. Spawn stats reporter:
    let stats_gossiper = gossiper.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));

        loop {
            interval.tick().await;
            let nodes = stats_gossiper.get_local_state();
            tracing::info!(
                "Cluster stats: self={} {} known nodes",
                stats_gossiper.get_self_status(),
                nodes.len()
            );
            for node in nodes.values() {
                tracing::info!(
                    "  - {} addr={} status={} (gen={}, ts={})",
                    node.id,
                    node.addr,
                    node.status,
                    node.gen_number,
                    node.last_update_ts
                );
            }
        }
    });

    // 7. HTTP Router:
    let app = Router::new()
        .route(ENDPOINT_STATUS, get(handle_status))
        .route(ENDPOINT_NODES, get(handle_nodes))
        .route(ENDPOINT_PEERS, get(handle_peers))
        .route(ENDPOINT_HISTORY, get(handle_history))
        .route(ENDPOINT_STORE, post(handle_update_self))
        .route("/store/:key", get(handle_get_key))
        .layer(Extension(gossiper.clone()));

    // 8. Start HTTP server:

    tracing::info!("HTTP server listening on {}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    gossiper.stop()?;
    gossiper.log_gossip_history();
    shutdown.cancel();

    Ok(())
}

/// The HTTP surface listens 1000 ports above the gossip port.
fn http_addr_for(bind_addr: SocketAddr) -> anyhow::Result<SocketAddr> {
    let http_port = bind_addr.port().checked_add(1000).ok_or_else(|| {
        anyhow::anyhow!("no HTTP port 1000 above gossip port {}", bind_addr.port())
    })?;
    Ok(SocketAddr::new(bind_addr.ip(), http_port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_addr_is_offset_from_gossip_port() {
        let bind: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(
            http_addr_for(bind).unwrap(),
            "127.0.0.1:6000".parse::<SocketAddr>().unwrap()
        );

        let edge: SocketAddr = "127.0.0.1:64535".parse().unwrap();
        assert_eq!(http_addr_for(edge).unwrap().port(), 65535);
    }

    #[test]
    fn test_http_addr_rejects_port_overflow() {
        let bind: SocketAddr = "127.0.0.1:65000".parse().unwrap();
        assert!(http_addr_for(bind).is_err());
    }
}
