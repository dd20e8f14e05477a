//! Outbound calls to other nodes.
//!
//! Every fan-out issues its calls concurrently and waits for all of them. The
//! first failure (transport error or non-2xx status) fails the whole operation.

use crate::messages::{NewBlockRequest, RegisterNodeRequest, RegisterNodesBulkRequest};
use futures::future::try_join_all;
use ledger_core::{Block, LedgerSnapshot, Transaction};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer call to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Clone, Debug)]
pub struct PeerClient {
    http: Client,
}

impl PeerClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub async fn broadcast_transaction(
        &self,
        nodes: &[String],
        transaction: &Transaction,
    ) -> Result<(), PeerError> {
        self.post_all(nodes, "/transaction", transaction).await
    }

    pub async fn broadcast_block(&self, nodes: &[String], block: &Block) -> Result<(), PeerError> {
        let body = NewBlockRequest {
            new_block: block.clone(),
        };
        self.post_all(nodes, "/receive-new-block", &body).await
    }

    /// Tell every known node about `new_node_url`.
    pub async fn announce_node(
        &self,
        nodes: &[String],
        new_node_url: &str,
    ) -> Result<(), PeerError> {
        let body = RegisterNodeRequest {
            new_node_url: new_node_url.to_string(),
        };
        self.post_all(nodes, "/register-node", &body).await
    }

    /// Hand a newly joined node the full membership list.
    pub async fn register_bulk(
        &self,
        target: &str,
        all_network_nodes: Vec<String>,
    ) -> Result<(), PeerError> {
        let body = RegisterNodesBulkRequest { all_network_nodes };
        self.post_json(format!("{target}/register-nodes-bulk"), &body).await
    }

    /// Fetch every node's ledger snapshot. Results keep the order of `nodes`.
    pub async fn fetch_snapshots(
        &self,
        nodes: &[String],
    ) -> Result<Vec<LedgerSnapshot>, PeerError> {
        try_join_all(nodes.iter().map(|node| self.fetch_snapshot(node))).await
    }

    async fn fetch_snapshot(&self, node: &str) -> Result<LedgerSnapshot, PeerError> {
        let url = format!("{node}/blockchain");
        let result = async {
            self.http
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json::<LedgerSnapshot>()
                .await
        }
        .await;
        result.map_err(|source| {
            warn!(%url, error = %source, "snapshot fetch failed");
            PeerError::Request { url, source }
        })
    }

    async fn post_all<T: Serialize + ?Sized>(
        &self,
        nodes: &[String],
        path: &str,
        body: &T,
    ) -> Result<(), PeerError> {
        debug!(path, peers = nodes.len(), "fanning out to peers");
        try_join_all(nodes.iter().map(|node| self.post_json(format!("{node}{path}"), body))).await?;
        Ok(())
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: String,
        body: &T,
    ) -> Result<(), PeerError> {
        let result = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .and_then(|res| res.error_for_status());
        match result {
            Ok(_) => Ok(()),
            Err(source) => {
                warn!(%url, error = %source, "peer call failed");
                Err(PeerError::Request { url, source })
            }
        }
    }
}
