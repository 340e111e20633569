//! Example of two overlay nodes talking over framed connections.
//!
//! Run a listener that echoes every plain message back to its sender:
//!
//! ```text
//! cargo run --example echo -- listen --port 11625
//! ```
//!
//! and dial it from a second terminal:
//!
//! ```text
//! cargo run --example echo -- dial --address 127.0.0.1 --port 11625 --count 5
//! ```

use clap::{Parser, Subcommand};
use log::LevelFilter;
use overlay_connection::{
    ChannelRegistry, Connection, ConnectionConfiguration, ConnectionContext, Envelope,
    EnvelopeCodec, Message, MeterCounts, Peer,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    /// Idle timeout in seconds.
    #[arg(short, long, default_value = "30", global = true)]
    idle_timeout: u64,

    /// Log level.
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Accept connections and echo plain messages back.
    Listen {
        /// Port to listen on.
        #[arg(short, long, default_value = "11625")]
        port: u16,
    },
    /// Connect to a listener and send some messages.
    Dial {
        /// IP address of the listener.
        #[arg(short, long)]
        address: String,

        /// Port of the listener.
        #[arg(short, long, default_value = "11625")]
        port: u16,

        /// Number of messages to send.
        #[arg(short, long, default_value = "3")]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] {} - {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log_level)
        .chain(std::io::stderr())
        .apply()?;

    let (registry, mut drops) = ChannelRegistry::new();
    let counts = Arc::new(MeterCounts::new());
    let configuration =
        ConnectionConfiguration::default().with_idle_timeout(Duration::from_secs(args.idle_timeout));
    log::debug!("Using {configuration}");
    let context = ConnectionContext::new(configuration, Arc::new(registry))
        .with_instrumentation(counts.clone());

    tokio::spawn(async move {
        while let Some(notice) = drops.recv().await {
            log::info!("Connection {} to {} dropped: {}", notice.id, notice.peer, notice.reason);
        }
    });

    let (messages_tx, mut messages_rx) = mpsc::unbounded_channel::<(Connection, Envelope)>();

    match args.mode {
        Mode::Listen { port } => {
            let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
            log::info!("Listening on {}", listener.local_addr()?);

            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        let (stream, _) = accepted?;
                        let connection =
                            Connection::accept(stream, &context, EnvelopeCodec, messages_tx.clone())?;
                        log::info!("Accepted {connection}");
                    }
                    Some((connection, message)) = messages_rx.recv() => {
                        log::info!("{connection}: {message:?}");
                        if let Envelope::Plain(_) = message {
                            if let Err(e) = connection.send(&EnvelopeCodec, &message) {
                                log::warn!("Could not echo to {connection}: {e}");
                            }
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
        Mode::Dial {
            address,
            port,
            count,
        } => {
            let ip_addr = address
                .parse::<IpAddr>()
                .map_err(|_| format!("Invalid IP address: {address}"))?;

            let connection =
                Connection::initiate(Peer::new(ip_addr, port), &context, EnvelopeCodec, messages_tx)
                    .await?;
            log::info!("Connected {connection}");

            for n in 0..count {
                let message = Envelope::Plain(Message::new(n, format!("ping {n}").into_bytes()));
                connection.send(&EnvelopeCodec, &message)?;

                match tokio::time::timeout(Duration::from_secs(5), messages_rx.recv()).await {
                    Ok(Some((_, echo))) => log::info!("Echo: {echo:?}"),
                    Ok(None) => break,
                    Err(_) => {
                        log::warn!("No echo for message {n}");
                        break;
                    }
                }
            }

            connection.drop_connection();
        }
    }

    log::info!("{counts}");
    Ok(())
}
