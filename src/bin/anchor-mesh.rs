//! anchor-mesh daemon binary
//!
//! Loads configuration, brings up the UDP transport and runs a mesh node
//! with a line-oriented chat console on stdin.

use anchor_mesh::{
    event_channel, Config, FileKeyStore, Node, NodeEvent, NodeHandle, PeerId, UdpTransport,
};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Peer-to-peer mesh messaging daemon
#[derive(Parser, Debug)]
#[command(name = "anchor-mesh", version, about)]
struct Args {
    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Nickname to announce (overrides node.nickname)
    #[arg(short, long)]
    nickname: Option<String>,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    info!("anchor-mesh starting");

    let (mut config, loaded_paths) = if let Some(config_path) = &args.config {
        // Explicit config file specified - load only that file
        match Config::load_file(config_path) {
            Ok(config) => (config, vec![config_path.clone()]),
            Err(e) => {
                error!("Failed to load configuration from {}: {}", config_path.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        match Config::load() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    if loaded_paths.is_empty() {
        info!("No config files found, using defaults");
    } else {
        for path in &loaded_paths {
            info!(path = %path.display(), "Loaded config file");
        }
    }

    if let Some(nickname) = args.nickname {
        config.node.nickname = Some(nickname);
    }

    let key_store = FileKeyStore::new(config.key_dir());
    let identity = match config.create_identity(&key_store) {
        Ok(identity) => identity,
        Err(e) => {
            error!("Failed to load identity: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        peer_id = %identity.peer_id(),
        nickname = %identity.nickname(),
        key_dir = %key_store.dir().display(),
        "Identity ready"
    );

    let udp_config = config.transports.udp.clone().unwrap_or_default();
    let (event_tx, event_rx) = event_channel(config.node.buffers.event_channel);
    let mut transport = UdpTransport::new(udp_config, event_tx);
    if let Err(e) = transport.start_async().await {
        error!("Failed to start UDP transport: {}", e);
        std::process::exit(1);
    }

    let (node, handle, mut events) =
        Node::new(identity, config.node.clone(), Box::new(transport), event_rx);
    let node_task = tokio::spawn(node.run());

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    info!("anchor-mesh running. Type a message to broadcast, /dm <peer> <text>, /peers, or quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_line(&handle, line.trim()).await {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("Shutdown signal received"),
                    Err(e) => error!("Failed to listen for shutdown signal: {}", e),
                }
                break;
            }
        }
    }

    info!("anchor-mesh shutting down");
    if let Err(e) = handle.shutdown().await {
        warn!("Error during shutdown: {}", e);
    }
    match node_task.await {
        Ok(Err(e)) => warn!("Node stopped with error: {}", e),
        Err(e) => warn!("Node task failed: {}", e),
        Ok(Ok(())) => {}
    }
    info!("anchor-mesh shutdown complete");
}

/// Run one console line. Returns false to quit.
async fn handle_line(handle: &NodeHandle, line: &str) -> bool {
    if line.is_empty() {
        return true;
    }
    if line == "quit" {
        return false;
    }

    if line == "/peers" {
        match handle.peers().await {
            Ok(peers) if peers.is_empty() => println!("no peers yet"),
            Ok(peers) => {
                for peer in peers {
                    let reach = if peer.direct { "direct" } else { "relayed" };
                    println!("{}  {}  ({})", peer.peer_id, peer.nickname, reach);
                }
            }
            Err(e) => warn!(error = %e, "peers query failed"),
        }
        return true;
    }

    if let Some(rest) = line.strip_prefix("/dm ") {
        let Some((target, text)) = rest.trim().split_once(' ') else {
            println!("usage: /dm <nickname|peer-id> <text>");
            return true;
        };
        let Some(peer_id) = resolve_peer(handle, target).await else {
            println!("unknown peer: {}", target);
            return true;
        };
        match handle.send_direct(peer_id, text.trim()).await {
            Ok(message_id) => info!(peer = %peer_id, message_id = %message_id, "Direct message accepted"),
            Err(e) => println!("send failed: {}", e),
        }
        return true;
    }

    if let Err(e) = handle.broadcast(line).await {
        println!("broadcast failed: {}", e);
    }
    true
}

/// A PeerId given directly, or the peer announcing `target` as nickname.
async fn resolve_peer(handle: &NodeHandle, target: &str) -> Option<PeerId> {
    if let Ok(peer_id) = target.parse::<PeerId>() {
        return Some(peer_id);
    }
    let peers = handle.peers().await.ok()?;
    peers
        .into_iter()
        .find(|p| p.nickname == target)
        .map(|p| p.peer_id)
}

fn print_event(event: &NodeEvent) {
    match event {
        NodeEvent::PeerAnnounced { peer_id, nickname } => {
            println!("* {} joined ({})", nickname, peer_id);
        }
        NodeEvent::BroadcastMessage {
            from,
            nickname,
            content,
            ..
        } => {
            println!("<{}> {}", display_name(from, nickname), content);
        }
        NodeEvent::DirectMessage {
            from,
            nickname,
            content,
            ..
        } => {
            println!("[dm <{}>] {}", display_name(from, nickname), content);
        }
        NodeEvent::PeerLeft { peer_id, nickname } => {
            println!("* {} left", display_name(peer_id, nickname));
        }
        NodeEvent::SessionEstablished(peer_id) => {
            info!(peer = %peer_id, "Secure session ready");
        }
    }
}

fn display_name(peer_id: &PeerId, nickname: &Option<String>) -> String {
    match nickname {
        Some(nickname) => nickname.clone(),
        None => peer_id.short(),
    }
}
