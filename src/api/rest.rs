//! HTTP ingress
//!
//! `GET /call?phone_number=<string>` stamps the ingress instant, admits the
//! call, and reports the assigned id and admission status. A request without
//! a phone number fails with 400 before touching the engine.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::cdr::{CallId, CallStatus, Cdr};
use crate::clock::Clock;
use crate::dispatcher::Dispatcher;
use crate::error::{CallCenterError, CallCenterResult};

/// HTTP ingress server
pub struct RestApiServer {
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
}

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    phone_number: Option<String>,
}

#[derive(Debug, Serialize)]
struct CallResponse {
    call_id: CallId,
    call_status: CallStatus,
}

impl RestApiServer {
    pub fn new(dispatcher: Arc<Dispatcher>, clock: Arc<dyn Clock>) -> Self {
        Self { dispatcher, clock }
    }

    /// Create the router
    pub fn router(&self) -> Router {
        Router::new().route("/call", get(Self::call)).with_state(AppState {
            dispatcher: Arc::clone(&self.dispatcher),
            clock: Arc::clone(&self.clock),
        })
    }

    /// Bind and serve until the process exits
    pub async fn serve(&self, host: &str, port: u16) -> CallCenterResult<()> {
        let addr = format!("{host}:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|err| CallCenterError::Listen(format!("{addr}: {err}")))?;
        info!(%addr, "http ingress listening");
        axum::serve(listener, self.router())
            .await
            .map_err(|err| CallCenterError::Listen(err.to_string()))
    }

    /// Admit one call
    async fn call(
        State(state): State<AppState>,
        Query(params): Query<CallParams>,
    ) -> Result<Json<CallResponse>, StatusCode> {
        let phone_number = params.phone_number.ok_or(StatusCode::BAD_REQUEST)?;
        let cdr = state
            .dispatcher
            .enqueue(Cdr::new(phone_number, state.clock.now()));
        Ok(Json(CallResponse {
            call_id: cdr.call_id,
            call_status: cdr.status,
        }))
    }
}
