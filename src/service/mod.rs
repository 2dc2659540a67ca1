// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC 2.0 transport over HTTP.
//!
//! Two endpoints, one per caller class: `/api/v2/requests` for third-party
//! applications and `/api/v2/admin` for the owner's tooling. The transport
//! is deliberately thin: it resolves the request metadata (trace id,
//! hostname, cancellation), dispatches on the method name, and wraps the
//! outcome in the JSON-RPC envelope. All behavior lives in the API layer.

use axum::extract::State;
use axum::http::header::ORIGIN;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use url::Url;
use uuid::Uuid;

use crate::api::client::{
    CheckTransactionParams, DisconnectWalletParams, GetPermissionsParams, ListKeysParams,
    RequestPermissionsParams, SendTransactionParams, SignTransactionParams,
};
use crate::api::error::RpcError;
use crate::api::RequestContext;
use crate::api::admin::{
    AdminSendTransactionParams, AdminSignTransactionParams, CreateWalletParams,
    DescribePermissionsParams, GenerateKeyParams, RevokePermissionsParams, TaintKeyParams,
};
use crate::state::AppState;

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    fn from_outcome(
        id: Option<serde_json::Value>,
        outcome: Result<serde_json::Value, RpcError>,
    ) -> Self {
        match outcome {
            Ok(result) => Self {
                jsonrpc: JSONRPC_VERSION,
                id,
                result: Some(result),
                error: None,
            },
            Err(error) => Self {
                jsonrpc: JSONRPC_VERSION,
                id,
                result: None,
                error: Some(error),
            },
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v2/requests", post(handle_client_request))
        .route("/api/v2/admin", post(handle_admin_request))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn handle_client_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    let id = request.id.clone();
    let outcome = async {
        check_version(&request)?;
        let hostname = resolve_hostname(&headers)?;
        let ctx = RequestContext {
            trace_id: Uuid::new_v4().to_string(),
            hostname,
            cancellation: state.shutdown.child_token(),
        };
        tracing::info!(
            method = %request.method,
            trace_id = %ctx.trace_id,
            hostname = %ctx.hostname,
            "Handling client request"
        );
        dispatch_client(&state, &ctx, &request.method, request.params).await
    }
    .await;
    Json(JsonRpcResponse::from_outcome(id, outcome))
}

async fn handle_admin_request(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    let id = request.id.clone();
    let outcome = async {
        check_version(&request)?;
        tracing::info!(method = %request.method, "Handling admin request");
        dispatch_admin(&state, &request.method, request.params).await
    }
    .await;
    Json(JsonRpcResponse::from_outcome(id, outcome))
}

async fn dispatch_client(
    state: &AppState,
    ctx: &RequestContext,
    method: &str,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    match method {
        "client.connect_wallet" => to_result(state.client.connect_wallet(ctx).await?),
        "client.disconnect_wallet" => {
            let params: DisconnectWalletParams = parse_params(params)?;
            to_result(state.client.disconnect_wallet(params).await?)
        }
        "client.get_permissions" => {
            let params: GetPermissionsParams = parse_params(params)?;
            to_result(state.client.get_permissions(params).await?)
        }
        "client.list_keys" => {
            let params: ListKeysParams = parse_params(params)?;
            to_result(state.client.list_keys(params).await?)
        }
        "client.request_permissions" => {
            let params: RequestPermissionsParams = parse_params(params)?;
            to_result(state.client.request_permissions(ctx, params).await?)
        }
        "client.sign_transaction" => {
            let params: SignTransactionParams = parse_params(params)?;
            to_result(state.client.sign_transaction(ctx, params).await?)
        }
        "client.send_transaction" => {
            let params: SendTransactionParams = parse_params(params)?;
            to_result(state.client.send_transaction(ctx, params).await?)
        }
        "client.check_transaction" => {
            let params: CheckTransactionParams = parse_params(params)?;
            to_result(state.client.check_transaction(ctx, params).await?)
        }
        unknown => Err(RpcError::method_not_found(unknown)),
    }
}

async fn dispatch_admin(
    state: &AppState,
    method: &str,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    match method {
        "admin.create_wallet" => {
            let params: CreateWalletParams = parse_params(params)?;
            to_result(state.admin.create_wallet(params).await?)
        }
        "admin.list_wallets" => to_result(state.admin.list_wallets().await?),
        "admin.describe_permissions" => {
            let params: DescribePermissionsParams = parse_params(params)?;
            to_result(state.admin.describe_permissions(params).await?)
        }
        "admin.revoke_permissions" => {
            let params: RevokePermissionsParams = parse_params(params)?;
            to_result(state.admin.revoke_permissions(params).await?)
        }
        "admin.generate_key" => {
            let params: GenerateKeyParams = parse_params(params)?;
            to_result(state.admin.generate_key(params).await?)
        }
        "admin.taint_key" => {
            let params: TaintKeyParams = parse_params(params)?;
            to_result(state.admin.taint_key(params).await?)
        }
        "admin.untaint_key" => {
            let params: TaintKeyParams = parse_params(params)?;
            to_result(state.admin.untaint_key(params).await?)
        }
        "admin.list_connections" => to_result(state.admin.list_connections().await?),
        "admin.sign_transaction" => {
            let params: AdminSignTransactionParams = parse_params(params)?;
            to_result(state.admin.sign_transaction(params).await?)
        }
        "admin.send_transaction" => {
            let params: AdminSendTransactionParams = parse_params(params)?;
            to_result(state.admin.send_transaction(params).await?)
        }
        unknown => Err(RpcError::method_not_found(unknown)),
    }
}

fn check_version(request: &JsonRpcRequest) -> Result<(), RpcError> {
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(RpcError::invalid_params(
            "the request does not carry the JSON-RPC 2.0 version",
        ));
    }
    Ok(())
}

/// The hostname a third-party application claims is taken from its
/// `Origin` header, never from the request body.
fn resolve_hostname(headers: &HeaderMap) -> Result<String, RpcError> {
    let origin = headers
        .get(ORIGIN)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            RpcError::hostname_resolution_failure(
                "the request carries no usable origin to resolve the hostname from",
            )
        })?;
    let url = Url::parse(origin).map_err(|_| {
        RpcError::hostname_resolution_failure("the request origin is not a valid URL")
    })?;
    url.host_str().map(str::to_string).ok_or_else(|| {
        RpcError::hostname_resolution_failure("the request origin carries no hostname")
    })
}

fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(RpcError::invalid_params)
}

fn to_result<T: Serialize>(value: T) -> Result<serde_json::Value, RpcError> {
    serde_json::to_value(value).map_err(RpcError::internal)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::api::error;
    use crate::interaction::channel::ChannelInteractor;
    use crate::network::{
        LastBlock, Node, NodeError, RoundRobinSelector, SendingMode, TransactionError,
    };
    use crate::wallet::store::InMemoryWalletStore;

    use super::*;

    struct FakeNode;

    #[async_trait]
    impl Node for FakeNode {
        fn host(&self) -> &str {
            "node.example"
        }

        async fn last_block(&self) -> Result<LastBlock, NodeError> {
            Ok(LastBlock {
                chain_id: "test-chain".to_string(),
                block_height: 42,
                block_hash: "ab".repeat(32),
                proof_of_work_difficulty: 2,
                proof_of_work_hash_function: "sha2_256".to_string(),
                transactions_per_block: 10,
            })
        }

        async fn send_transaction(
            &self,
            _: &str,
            _: SendingMode,
        ) -> Result<String, TransactionError> {
            Ok("txhash123".to_string())
        }

        async fn check_transaction(&self, _: &str) -> Result<(), TransactionError> {
            Ok(())
        }
    }

    fn test_router() -> Router {
        let shutdown = CancellationToken::new();
        let (events, _receiver) = tokio::sync::mpsc::channel(8);
        let state = AppState::new(
            Arc::new(InMemoryWalletStore::new()),
            Arc::new(ChannelInteractor::new(events, shutdown.clone())),
            Arc::new(RoundRobinSelector::new(vec![
                Arc::new(FakeNode) as Arc<dyn Node>
            ])),
            shutdown,
        );
        router(state)
    }

    fn rpc_request(uri: &str, origin: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(origin) = origin {
            builder = builder.header("origin", origin);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn response_body(response: axum::response::Response) -> serde_json::Value {
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn client_requests_without_origin_fail_hostname_resolution() {
        let request = rpc_request(
            "/api/v2/requests",
            None,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": "1",
                "method": "client.connect_wallet",
            }),
        );
        let body = response_body(test_router().oneshot(request).await.unwrap()).await;
        assert_eq!(
            body["error"]["code"],
            error::ERROR_CODE_HOSTNAME_RESOLUTION_FAILURE
        );
        assert_eq!(body["id"], "1");
    }

    #[tokio::test]
    async fn unknown_methods_are_reported_as_such() {
        let request = rpc_request(
            "/api/v2/requests",
            Some("https://dapp.example"),
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "client.rob_wallet",
            }),
        );
        let body = response_body(test_router().oneshot(request).await.unwrap()).await;
        assert_eq!(body["error"]["code"], error::ERROR_CODE_METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_methods_dispatch_without_an_origin() {
        let router = test_router();
        let request = rpc_request(
            "/api/v2/admin",
            None,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "admin.create_wallet",
                "params": {"wallet": "w1", "passphrase": "s3cr3t"},
            }),
        );
        let body = response_body(router.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(body["result"]["wallet"], "w1");

        let request = rpc_request(
            "/api/v2/admin",
            None,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "admin.list_wallets",
            }),
        );
        let body = response_body(router.oneshot(request).await.unwrap()).await;
        assert_eq!(body["result"]["wallets"], serde_json::json!(["w1"]));
    }

    #[tokio::test]
    async fn unknown_session_tokens_fail_authentication() {
        let request = rpc_request(
            "/api/v2/requests",
            Some("https://dapp.example"),
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "client.get_permissions",
                "params": {"token": "unknown"},
            }),
        );
        let body = response_body(test_router().oneshot(request).await.unwrap()).await;
        assert_eq!(
            body["error"]["code"],
            error::ERROR_CODE_AUTHENTICATION_FAILURE
        );
    }

    #[tokio::test]
    async fn wrong_jsonrpc_version_is_invalid() {
        let request = rpc_request(
            "/api/v2/admin",
            None,
            serde_json::json!({
                "jsonrpc": "1.0",
                "id": 4,
                "method": "admin.list_wallets",
            }),
        );
        let body = response_body(test_router().oneshot(request).await.unwrap()).await;
        assert_eq!(body["error"]["code"], error::ERROR_CODE_INVALID_PARAMS);
    }
}
