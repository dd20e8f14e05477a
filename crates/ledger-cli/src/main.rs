use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for a ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:3001)
    #[arg(long, global = true, default_value = "http://127.0.0.1:3001")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the node's chain, pending pool and peers
    Chain,
    /// Create a transaction and broadcast it to the network
    Send {
        /// Sender address
        #[arg(long)]
        from: String,
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Amount
        #[arg(long)]
        amount: f64,
    },
    /// Mine the pending pool into a new block
    Mine,
    /// Register a new node with the network through this node
    Register {
        /// Base URL of the joining node
        url: String,
    },
    /// Replace the node's chain with the longest valid peer chain
    Consensus,
    /// Look up a block by hash
    Block { hash: String },
    /// Look up a transaction by id
    Tx { id: String },
    /// Show an address's transactions and balance
    Address { address: String },
}

#[derive(Serialize)]
struct NewTransaction {
    amount: f64,
    sender: String,
    recipient: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterNode {
    new_node_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = Client::new();
    let node = cli.node.trim_end_matches('/');
    let request = match cli.cmd {
        Command::Chain => client.get(format!("{node}/blockchain")),
        Command::Send { from, to, amount } => client
            .post(format!("{node}/transaction/broadcast"))
            .json(&NewTransaction {
                amount,
                sender: from,
                recipient: to,
            }),
        Command::Mine => client.get(format!("{node}/mine")),
        Command::Register { url } => client
            .post(format!("{node}/register-and-broadcast-node"))
            .json(&RegisterNode { new_node_url: url }),
        Command::Consensus => client.get(format!("{node}/consensus")),
        Command::Block { hash } => client.get(format!("{node}/block/{hash}")),
        Command::Tx { id } => client.get(format!("{node}/transaction/{id}")),
        Command::Address { address } => client.get(format!("{node}/address/{address}")),
    };
    print_response(request).await
}

async fn print_response(request: RequestBuilder) -> Result<()> {
    let res = request.send().await?;
    let status = res.status();
    debug!(%status, url = %res.url(), "node responded");
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_with_global_node() {
        let cli = Cli::parse_from([
            "ledger-cli",
            "--node",
            "http://127.0.0.1:4000",
            "send",
            "--from",
            "alice",
            "--to",
            "bob",
            "--amount",
            "2.5",
        ]);
        assert_eq!(cli.node, "http://127.0.0.1:4000");
        match cli.cmd {
            Command::Send { from, to, amount } => {
                assert_eq!(from, "alice");
                assert_eq!(to, "bob");
                assert_eq!(amount, 2.5);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn register_body_uses_camel_case() {
        let body = serde_json::to_value(RegisterNode {
            new_node_url: "http://127.0.0.1:3002".into(),
        })
        .unwrap();
        assert_eq!(body["newNodeUrl"], "http://127.0.0.1:3002");
    }
}
