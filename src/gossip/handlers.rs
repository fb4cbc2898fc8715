use super::protocol::*;
use super::service::Gossiper;
use crate::membership::types::{GossipSessionInfo, NodeInfoMap, NodeValueMap, StoreKey};

use axum::{Extension, Json, extract::Path, http::StatusCode};
use std::sync::Arc;

pub async fn handle_status(
    Extension(gossiper): Extension<Arc<Gossiper>>,
) -> (StatusCode, Json<StatusResponse>) {
    (
        StatusCode::OK,
        Json(StatusResponse {
            node_id: gossiper.node_id().clone(),
            gossip_addr: gossiper.gossip_addr().to_string(),
            status: gossiper.get_self_status(),
            quorum_provider: gossiper.quorum_provider_type(),
            running: gossiper.is_running(),
        }),
    )
}

pub async fn handle_nodes(
    Extension(gossiper): Extension<Arc<Gossiper>>,
) -> (StatusCode, Json<NodeInfoMap>) {
    (StatusCode::OK, Json(gossiper.get_local_state()))
}

pub async fn handle_peers(
    Extension(gossiper): Extension<Arc<Gossiper>>,
) -> (StatusCode, Json<Vec<String>>) {
    (StatusCode::OK, Json(gossiper.get_nodes()))
}

pub async fn handle_history(
    Extension(gossiper): Extension<Arc<Gossiper>>,
) -> (StatusCode, Json<Vec<GossipSessionInfo>>) {
    (StatusCode::OK, Json(gossiper.get_gossip_history()))
}

pub async fn handle_get_key(
    Extension(gossiper): Extension<Arc<Gossiper>>,
    Path(key): Path<String>,
) -> (StatusCode, Json<NodeValueMap>) {
    let values = gossiper.get_store_key_value(&StoreKey(key));
    if values.is_empty() {
        (StatusCode::NOT_FOUND, Json(values))
    } else {
        (StatusCode::OK, Json(values))
    }
}

pub async fn handle_update_self(
    Extension(gossiper): Extension<Arc<Gossiper>>,
    Json(req): Json<UpdateSelfRequest>,
) -> (StatusCode, Json<UpdateSelfResponse>) {
    tracing::debug!("Publishing key {} from HTTP", req.key);
    gossiper.update_self(req.key, req.value);
    (StatusCode::OK, Json(UpdateSelfResponse { success: true }))
}
