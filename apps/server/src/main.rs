//! Process entry point: parse args, load config, open the catalog, spawn
//! the scanner/SSDP/signal collaborators, then run the accept loop.

mod config;

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dms_catalog::{CatalogStore, Scanner};
use dms_content::SoapDispatcher;
use dms_httpd::context::ServerContext;
use dms_httpd::{conn, descriptor, ssdp};

use config::{Args, ServerConfig};

#[derive(Debug, Clone, Copy)]
enum Signal {
    Shutdown,
    ReloadInterfaces,
    ClearCaches,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = ServerConfig::load(args)?;

    std::fs::create_dir_all(&config.db_path)?;
    let db_file = config.db_path.join("files.db");
    let pool = dms_catalog::schema::open_or_rebuild(&db_file)
        .await
        .map_err(|e| anyhow::anyhow!("failed to open catalog at {}: {e}", db_file.display()))?;
    let store = Arc::new(CatalogStore::new(pool));

    let device_uuid = descriptor::generate_device_uuid(&db_file.display().to_string());
    let base_url = format!("http://0.0.0.0:{}", config.listen_addr.port());

    let roots: Vec<dms_catalog::scanner::Root> = config
        .media_roots
        .iter()
        .map(|r| dms_catalog::scanner::Root {
            path: r.path.clone(),
            top_level_id: r.top_level_id,
            all_view_id: r.all_view_id,
            kind: r.kind,
        })
        .collect();

    let scanner = Scanner::new(store.clone());
    tokio::spawn(async move {
        match scanner.scan_roots(&roots).await {
            Ok(summary) => tracing::info!(?summary, "initial catalog scan complete"),
            Err(err) => tracing::error!(%err, "initial catalog scan failed"),
        }
    });

    let ctx = Arc::new(ServerContext {
        store: store.clone(),
        dispatcher: SoapDispatcher::new(store.clone(), base_url.clone()),
        media_roots: config.media_roots.iter().map(|r| r.path.clone()).collect(),
        db_dir: config.db_path.clone(),
        disallow_wide_links: config.disallow_wide_links,
        strict_dlna: config.strict_dlna,
        base_url,
        friendly_name: config.friendly_name.clone(),
        device_uuid: device_uuid.clone(),
    });

    let advertiser = ssdp::UdpSsdpAdvertiser {
        device_uuid: device_uuid.clone(),
        port: config.listen_addr.port(),
    };
    let notify_task = tokio::spawn(ssdp::run_periodic_notify(advertiser));
    let msearch_port = config.listen_addr.port();
    let msearch_uuid = device_uuid.clone();
    let msearch_task = tokio::spawn(async move {
        if let Err(err) = ssdp::run_msearch_responder(msearch_uuid, msearch_port).await {
            tracing::error!(%err, "M-SEARCH responder exited");
        }
    });

    let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
    spawn_signal_listener(signal_tx);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {e}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            tracing::debug!(%peer, "connection accepted");
                            conn::serve_connection(ctx, socket).await;
                        });
                    }
                    Err(err) => tracing::warn!(%err, "accept failed"),
                }
            }
            Some(signal) = signal_rx.recv() => {
                match signal {
                    Signal::Shutdown => {
                        tracing::info!("shutting down");
                        let _ = advertiser_byebye(&device_uuid, config.listen_addr.port()).await;
                        break;
                    }
                    Signal::ReloadInterfaces => {
                        tracing::info!("SIGHUP: reloading network interfaces is a no-op in this build");
                    }
                    Signal::ClearCaches => {
                        tracing::info!("SIGUSR1: no in-memory caches to clear beyond the catalog's own rows");
                    }
                }
            }
        }
    }

    notify_task.abort();
    msearch_task.abort();
    Ok(())
}

async fn advertiser_byebye(device_uuid: &str, port: u16) -> Result<(), dms_httpd::HttpError> {
    use dms_httpd::ssdp::SsdpAdvertiser;
    let advertiser = ssdp::UdpSsdpAdvertiser {
        device_uuid: device_uuid.to_string(),
        port,
    };
    advertiser.notify_byebye().await
}

/// Converts `SIGTERM`/`SIGINT`/`SIGHUP`/`SIGUSR1` into channel messages the
/// supervisor selects against, rather than handling them inline — so the
/// accept loop never has to special-case a signal-pending flag.
fn spawn_signal_listener(tx: mpsc::UnboundedSender<Signal>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
            let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
            let mut sighup = signal(SignalKind::hangup()).expect("install SIGHUP handler");
            let mut sigusr1 = signal(SignalKind::user_defined1()).expect("install SIGUSR1 handler");
            loop {
                tokio::select! {
                    _ = sigterm.recv() => { let _ = tx.send(Signal::Shutdown); break; }
                    _ = sigint.recv() => { let _ = tx.send(Signal::Shutdown); break; }
                    _ = sighup.recv() => { let _ = tx.send(Signal::ReloadInterfaces); }
                    _ = sigusr1.recv() => { let _ = tx.send(Signal::ClearCaches); }
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            let _ = tx.send(Signal::Shutdown);
        }
    });
}
