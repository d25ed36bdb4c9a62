//! Print the structure of the next reply from a bridge server.
//!
//! ```text
//! cargo run --example show_next --features zmq -- tcp://localhost:4545 --zmq
//! cargo run --example show_next -- tcp://localhost:4545 --raw
//! ```
//!
//! Without `--zmq` the demo speaks the envelope stream transport, which only
//! envelope relays and loopback servers understand.
//!
//! Set `RUST_LOG=karabo_bridge_client=debug` to see transport activity.

use clap::Parser;
use karabo_bridge_client::config::DEFAULT_ENDPOINT;
use karabo_bridge_client::Client;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server endpoint (`tcp://host:port` or `ipc://path`).
    #[arg(default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Dump every raw frame instead of the per-source summary.
    #[arg(long)]
    raw: bool,

    /// Connect with a ZeroMQ REQ socket, as bridge servers expect.
    #[cfg(feature = "zmq")]
    #[arg(long)]
    zmq: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let builder = Client::builder().endpoint(cli.endpoint.as_str());

    #[cfg(feature = "zmq")]
    {
        if cli.zmq {
            let mut client = builder.connect_zmq()?;
            let text = if cli.raw { client.show_msg()? } else { client.show_next()? };
            print!("{}", text);
            return Ok(());
        }
    }

    let mut client = builder.connect()?;
    let text = if cli.raw { client.show_msg()? } else { client.show_next()? };
    print!("{}", text);
    Ok(())
}
