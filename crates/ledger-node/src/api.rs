//! HTTP surface of a node. Handlers translate requests into ledger calls and
//! peer fan-outs; the ledger lock is never held across a peer call.

use crate::{
    messages::{
        AddressResponse, BlockLookupResponse, BlockResponse, ChainResponse, ErrorResponse,
        MessageResponse, NewBlockRequest, NewTransactionRequest, RegisterNodeRequest,
        RegisterNodesBulkRequest, TransactionResponse,
    },
    miner::{MineError, Miner, SharedLedger},
    peers::{PeerClient, PeerError},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{Ledger, LedgerConfig, LedgerSnapshot, Transaction, TransactionLookup};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub ledger: SharedLedger,
    pub peers: PeerClient,
    pub miner: Miner,
}

impl AppState {
    pub fn new(config: LedgerConfig, peers: PeerClient) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(Ledger::new(config))),
            peers,
            miner: Miner::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error(transparent)]
    Mining(#[from] MineError),
    #[error("mining was cancelled")]
    MiningCancelled,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Peer(_) => StatusCode::BAD_GATEWAY,
            ApiError::Mining(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MiningCancelled => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/blockchain", get(get_blockchain))
        .route("/transaction", post(add_transaction))
        .route("/transaction/broadcast", post(broadcast_transaction))
        .route("/transaction/{transaction_id}", get(get_transaction))
        .route("/mine", get(mine))
        .route("/receive-new-block", post(receive_new_block))
        .route(
            "/register-and-broadcast-node",
            post(register_and_broadcast_node),
        )
        .route("/register-node", post(register_node))
        .route("/register-nodes-bulk", post(register_nodes_bulk))
        .route("/consensus", get(consensus))
        .route("/block/{block_hash}", get(get_block))
        .route("/address/{address}", get(get_address))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn get_blockchain(State(state): State<AppState>) -> Json<LedgerSnapshot> {
    Json(state.ledger.read().await.snapshot())
}

async fn add_transaction(
    State(state): State<AppState>,
    Json(transaction): Json<Transaction>,
) -> (StatusCode, Json<MessageResponse>) {
    let index = state.ledger.write().await.add_to_pending(transaction);
    (
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Transaction will be added to block {index}"),
        }),
    )
}

async fn broadcast_transaction(
    State(state): State<AppState>,
    Json(req): Json<NewTransactionRequest>,
) -> ApiResult<(StatusCode, Json<TransactionResponse>)> {
    let (transaction, nodes) = {
        let mut ledger = state.ledger.write().await;
        let transaction = ledger.create_transaction(req.amount, req.sender, req.recipient);
        ledger.add_to_pending(transaction.clone());
        (transaction, ledger.network_nodes().to_vec())
    };
    state
        .peers
        .broadcast_transaction(&nodes, &transaction)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(TransactionResponse {
            message: "Transaction created and broadcast successfully".into(),
            transaction,
        }),
    ))
}

async fn mine(State(state): State<AppState>) -> ApiResult<Json<BlockResponse>> {
    let block = state
        .miner
        .mine(&state.ledger)
        .await?
        .ok_or(ApiError::MiningCancelled)?;

    let nodes = state.ledger.read().await.network_nodes().to_vec();
    state.peers.broadcast_block(&nodes, &block).await?;

    // The reward lands in the next block, on every node.
    let (reward, nodes) = {
        let mut ledger = state.ledger.write().await;
        let reward = ledger.reward_transaction();
        ledger.add_to_pending(reward.clone());
        (reward, ledger.network_nodes().to_vec())
    };
    state.peers.broadcast_transaction(&nodes, &reward).await?;

    info!(index = block.index, hash = %block.hash, "block mined and broadcast");
    Ok(Json(BlockResponse {
        message: "New block mined & broadcast successfully".into(),
        block,
    }))
}

async fn receive_new_block(
    State(state): State<AppState>,
    Json(req): Json<NewBlockRequest>,
) -> Json<BlockResponse> {
    let block = req.new_block;
    let accepted = state
        .ledger
        .write()
        .await
        .accept_external_block(block.clone());
    let message = if accepted {
        "New block received and accepted"
    } else {
        "New block rejected"
    };
    Json(BlockResponse {
        message: message.into(),
        block,
    })
}

async fn register_and_broadcast_node(
    State(state): State<AppState>,
    Json(req): Json<RegisterNodeRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let new_node_url = req.new_node_url;
    let (nodes, self_url) = {
        let mut ledger = state.ledger.write().await;
        ledger.register_node(&new_node_url);
        (ledger.network_nodes().to_vec(), ledger.node_url().to_string())
    };

    state.peers.announce_node(&nodes, &new_node_url).await?;

    let mut all_network_nodes = nodes;
    all_network_nodes.push(self_url);
    state
        .peers
        .register_bulk(&new_node_url, all_network_nodes)
        .await?;

    info!(%new_node_url, "node registered with network");
    Ok(Json(MessageResponse {
        message: "New node registered with network successfully".into(),
    }))
}

async fn register_node(
    State(state): State<AppState>,
    Json(req): Json<RegisterNodeRequest>,
) -> Json<MessageResponse> {
    state.ledger.write().await.register_node(&req.new_node_url);
    Json(MessageResponse {
        message: "New node registered successfully on node".into(),
    })
}

async fn register_nodes_bulk(
    State(state): State<AppState>,
    Json(req): Json<RegisterNodesBulkRequest>,
) -> Json<MessageResponse> {
    state
        .ledger
        .write()
        .await
        .register_nodes(req.all_network_nodes.iter().map(String::as_str));
    Json(MessageResponse {
        message: "Bulk registration successful".into(),
    })
}

async fn consensus(State(state): State<AppState>) -> ApiResult<Json<ChainResponse>> {
    let nodes = state.ledger.read().await.network_nodes().to_vec();
    let snapshots = state.peers.fetch_snapshots(&nodes).await?;

    let mut ledger = state.ledger.write().await;
    let outcome = ledger.reconcile(snapshots);
    let message = if outcome.is_replaced() {
        "This chain has been replaced"
    } else {
        "This chain has not been replaced"
    };
    Ok(Json(ChainResponse {
        message: message.into(),
        chain: ledger.chain().to_vec(),
    }))
}

async fn get_block(
    State(state): State<AppState>,
    Path(block_hash): Path<String>,
) -> Json<BlockLookupResponse> {
    let block = state.ledger.read().await.block_by_hash(&block_hash).cloned();
    Json(BlockLookupResponse { block })
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Json<TransactionLookup> {
    Json(state.ledger.read().await.transaction(&transaction_id))
}

async fn get_address(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Json<AddressResponse> {
    let address_data = state.ledger.read().await.address_activity(&address);
    Json(AddressResponse { address_data })
}
