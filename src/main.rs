#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! RainTree overlay node entrypoint (systemd-friendly).
//! Loads `OverlayConfig`, starts the gossip overlay and the metrics
//! server, and keeps the process alive.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use raintree_overlay::core::config::OverlayConfig;
use raintree_overlay::monitoring::metrics::{Metrics, PrometheusTelemetry};
use raintree_overlay::networking::dedup::DedupCache;
use raintree_overlay::networking::overlay::Overlay;
use raintree_overlay::networking::raintree::RainTreeDispatcher;
use raintree_overlay::networking::sink::ChannelEventSink;
use raintree_overlay::networking::std_broadcast::StdBroadcast;
use raintree_overlay::networking::tcp_transport::TcpTransport;
use raintree_overlay::networking::BroadcastStrategy;

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let config_path = env("RAINTREE_CONFIG", "./overlay.toml");
    let config = match OverlayConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load overlay config at {config_path}: {err}");
            std::process::exit(1);
        }
    };

    let address_book = match config.build_address_book() {
        Ok(book) => Arc::new(book),
        Err(err) => {
            eprintln!("failed to build address book: {err}");
            std::process::exit(1);
        }
    };

    info!(
        n = address_book.size(),
        self_index = address_book.self_index(),
        "raintree overlay starting"
    );

    let mut peer_addrs: HashMap<_, SocketAddr> = HashMap::new();
    for peer in address_book.iter() {
        match peer.service_url.parse::<SocketAddr>() {
            Ok(socket_addr) => {
                peer_addrs.insert(peer.address, socket_addr);
            }
            Err(err) => {
                warn!(%peer.address, error = %err, "skipping peer with unparseable service_url");
            }
        }
    }

    let listen_addr: SocketAddr = config
        .listen_addr
        .parse()
        .unwrap_or_else(|_| "0.0.0.0:9000".parse().unwrap());
    let write_timeout = Duration::from_millis(config.write_timeout_ms);

    let metrics = Arc::new(Metrics::new().expect("metrics init failed"));
    let telemetry = Arc::new(PrometheusTelemetry::new((*metrics).clone()));

    let transport = match TcpTransport::bind(listen_addr, peer_addrs, write_timeout, telemetry.clone()).await {
        Ok(transport) => transport,
        Err(err) => {
            eprintln!("failed to bind tcp transport on {listen_addr}: {err}");
            std::process::exit(1);
        }
    };

    let dedup = Arc::new(DedupCache::new(
        config.dedup_cache_size,
        Duration::from_secs(config.dedup_cache_ttl_seconds),
    ));

    let (event_sink, mut events) = ChannelEventSink::new(1024);
    let event_sink = Arc::new(event_sink);

    let strategy: Arc<dyn BroadcastStrategy> = if config.use_structured_overlay {
        Arc::new(RainTreeDispatcher::new(
            Arc::clone(&address_book),
            Arc::clone(&dedup),
            transport.clone(),
            event_sink,
            telemetry.clone(),
            write_timeout,
            "raintree",
        ))
    } else {
        Arc::new(StdBroadcast::new(
            Arc::clone(&address_book),
            Arc::clone(&dedup),
            transport.clone(),
            event_sink,
            telemetry.clone(),
            write_timeout,
            "raintree",
        ))
    };

    let overlay = Overlay::new(
        Arc::clone(&address_book),
        transport,
        strategy,
        telemetry.clone(),
        config.max_envelope_bytes,
    );
    overlay.start().await;

    let metrics_addr: SocketAddr = env("RAINTREE_METRICS_ADDR", "0.0.0.0:9100")
        .parse()
        .unwrap_or_else(|_| "0.0.0.0:9100".parse().unwrap());
    let metrics_router = raintree_overlay::monitoring::http::router(metrics);
    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(metrics_addr).await {
            Ok(listener) => {
                info!(%metrics_addr, "metrics server listening");
                if let Err(err) = axum::serve(listener, metrics_router).await {
                    warn!(error = %err, "metrics server exited");
                }
            }
            Err(err) => warn!(%metrics_addr, error = %err, "failed to bind metrics server"),
        }
    });

    let events_task = tokio::spawn(async move {
        while let Some((topic, payload)) = events.recv().await {
            info!(topic = %topic, bytes = payload.len(), "event delivered");
        }
        warn!("event channel closed");
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => warn!(error = %err, "failed to listen for shutdown signal"),
    }

    let _ = overlay.stop().await;
    events_task.abort();
}
