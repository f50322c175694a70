//! HTTP health endpoint for hosting platforms that probe a port.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
struct HealthState {
    bot_name: Arc<str>,
}

pub fn router(bot_name: &str) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .with_state(HealthState {
            bot_name: Arc::from(bot_name),
        })
}

async fn index(State(state): State<HealthState>) -> String {
    format!("✅ {} is running!", state.bot_name)
}

async fn health(State(state): State<HealthState>) -> Json<Value> {
    Json(json!({ "status": "healthy", "bot": &*state.bot_name }))
}

/// Bind `0.0.0.0:port` and serve until the task is dropped.
pub async fn serve(bot_name: &str, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "health endpoint listening");
    axum::serve(listener, router(bot_name)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn both_routes_answer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router("Saathi")).await.unwrap();
        });

        let http = reqwest::Client::new();
        let index = http
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(index, "✅ Saathi is running!");

        let health: Value = http
            .get(format!("http://{addr}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health, json!({ "status": "healthy", "bot": "Saathi" }));
    }
}
