//! Belgrano Ahorro HTTP client.

use chrono::Utc;
use reqwest::{Client, Method, Url};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::error::AhorroError;
use crate::config::AhorroConfig;

const USER_AGENT: &str = "BelgranoTickets/1.0";

/// Belgrano Ahorro API client.
#[derive(Clone)]
pub struct AhorroClient {
    client: Client,
    base_url: String,
    api_prefix: String,
    api_key: SecretString,
}

impl std::fmt::Debug for AhorroClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AhorroClient")
            .field("base_url", &self.base_url)
            .field("api_prefix", &self.api_prefix)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Accept both a bare array and `{"<key>": [...]}`.
fn into_list(value: Value, key: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

impl AhorroClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AhorroError::Config` if the HTTP client cannot be built.
    pub fn new(config: &AhorroConfig) -> Result<Self, AhorroError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AhorroError::Config(e.to_string()))?;

        info!(base_url = %config.base_url, "Belgrano Ahorro client initialized");

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_prefix: config.api_prefix.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Base URL of the remote API.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url + api_prefix + /seg1/seg2...`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, AhorroError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, self.api_prefix))
            .map_err(|e| AhorroError::Config(format!("invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| AhorroError::Config("base URL cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send one request and decode the JSON body.
    ///
    /// An empty successful body is reported as `{"status": "success"}`.
    async fn request(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<Value, AhorroError> {
        let url = self.url(segments)?;
        debug!(%method, %url, "Ahorro request");

        let mut request = self
            .client
            .request(method, url)
            .header("X-API-Key", self.api_key.expose_secret())
            .bearer_auth(self.api_key.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| format!("Error HTTP {}", status.as_u16()));
            return Err(AhorroError::Http {
                status: status.as_u16(),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(json!({"status": "success"}));
        }
        serde_json::from_str(&text).map_err(|e| AhorroError::Response(e.to_string()))
    }

    /// Remote health document, or an `unhealthy` stand-in on failure.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Value {
        match self.request(Method::GET, &["health"], None).await {
            Ok(health) => health,
            Err(e) => {
                warn!(error = %e, "Ahorro health check failed");
                json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                    "timestamp": Utc::now().to_rfc3339(),
                })
            }
        }
    }

    /// Whether the remote API reports itself healthy.
    pub async fn is_healthy(&self) -> bool {
        let health = self.health_check().await;
        matches!(
            health.get("status").and_then(Value::as_str),
            Some("healthy" | "ok" | "success")
        )
    }

    /// Products, optionally restricted to one category.
    #[instrument(skip(self))]
    pub async fn get_productos(&self, categoria: Option<&str>) -> Vec<Value> {
        let result = match categoria {
            Some(c) => {
                self.request(Method::GET, &["productos", "categoria", c], None)
                    .await
            }
            None => self.request(Method::GET, &["productos"], None).await,
        };
        match result {
            Ok(value) => into_list(value, "productos"),
            Err(e) => {
                warn!(error = %e, "Error obteniendo productos");
                Vec::new()
            }
        }
    }

    /// One order by number.
    #[instrument(skip(self))]
    pub async fn get_pedido(&self, numero: &str) -> Option<Value> {
        match self.request(Method::GET, &["pedidos", numero], None).await {
            Ok(mut value) => value
                .get_mut("pedido")
                .map(Value::take)
                .filter(|p| !p.is_null()),
            Err(e) => {
                warn!(error = %e, numero, "Error obteniendo pedido");
                None
            }
        }
    }

    /// Push an order status change upstream.
    #[instrument(skip(self))]
    pub async fn actualizar_estado_pedido(&self, numero: &str, estado: &str) -> bool {
        let body = json!({"estado": estado});
        match self
            .request(Method::PUT, &["pedidos", numero, "estado"], Some(&body))
            .await
        {
            Ok(_) => {
                info!(numero, estado, "Estado del pedido actualizado");
                true
            }
            Err(e) => {
                warn!(error = %e, numero, "Error actualizando estado del pedido");
                false
            }
        }
    }

    /// Bulk-send tickets upstream.
    #[instrument(skip(self, tickets), fields(count = tickets.len()))]
    pub async fn sync_tickets(&self, tickets: &[Value]) -> bool {
        let body = json!({"tickets": tickets});
        match self
            .request(Method::POST, &["sync", "tickets"], Some(&body))
            .await
        {
            Ok(_) => {
                info!(count = tickets.len(), "Tickets sincronizados");
                true
            }
            Err(e) => {
                warn!(error = %e, "Error sincronizando tickets");
                false
            }
        }
    }

    /// Mirror a new ticket upstream.
    pub async fn create_ticket(&self, ticket: &Value) -> Option<Value> {
        self.request(Method::POST, &["tickets"], Some(ticket))
            .await
            .map_err(|e| warn!(error = %e, "Error creando ticket remoto"))
            .ok()
    }

    /// Mirror a ticket update upstream.
    pub async fn update_ticket(&self, id: &str, ticket: &Value) -> Option<Value> {
        self.request(Method::PUT, &["tickets", id], Some(ticket))
            .await
            .map_err(|e| warn!(error = %e, id, "Error actualizando ticket remoto"))
            .ok()
    }

    /// Fetch one upstream ticket.
    pub async fn get_ticket(&self, id: &str) -> Option<Value> {
        self.request(Method::GET, &["tickets", id], None)
            .await
            .map_err(|e| warn!(error = %e, id, "Error obteniendo ticket remoto"))
            .ok()
    }

    /// All upstream tickets.
    pub async fn get_tickets(&self) -> Vec<Value> {
        match self.request(Method::GET, &["tickets"], None).await {
            Ok(value) => into_list(value, "tickets"),
            Err(e) => {
                warn!(error = %e, "Error obteniendo tickets remotos");
                Vec::new()
            }
        }
    }

    /// Upstream businesses.
    pub async fn get_negocios(&self) -> Vec<Value> {
        match self.request(Method::GET, &["negocios"], None).await {
            Ok(value) => into_list(value, "negocios"),
            Err(e) => {
                warn!(error = %e, "Error obteniendo negocios");
                Vec::new()
            }
        }
    }

    /// Upstream branches of one business.
    pub async fn get_sucursales(&self, negocio_id: &str) -> Vec<Value> {
        match self
            .request(Method::GET, &["negocios", negocio_id, "sucursales"], None)
            .await
        {
            Ok(value) => into_list(value, "sucursales"),
            Err(e) => {
                warn!(error = %e, negocio_id, "Error obteniendo sucursales");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::{get, post, put},
    };
    use std::time::Duration;

    fn config(base_url: String) -> AhorroConfig {
        AhorroConfig {
            base_url,
            api_prefix: "/api/v1".to_string(),
            api_key: SecretString::from("test-key"),
            timeout: Duration::from_secs(5),
        }
    }

    async fn spawn_mock() -> String {
        async fn health(headers: HeaderMap) -> (StatusCode, Json<Value>) {
            let authorized = headers.get("x-api-key").and_then(|v| v.to_str().ok())
                == Some("test-key")
                && headers.get("authorization").and_then(|v| v.to_str().ok())
                    == Some("Bearer test-key");
            if authorized {
                (StatusCode::OK, Json(json!({"status": "healthy"})))
            } else {
                (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"})))
            }
        }

        let app = Router::new()
            .route("/api/v1/health", get(health))
            .route(
                "/api/v1/productos",
                get(|| async { Json(json!({"productos": [{"id": 1}, {"id": 2}]})) }),
            )
            .route(
                "/api/v1/productos/categoria/{c}",
                get(|Path(c): Path<String>| async move { Json(json!([{"categoria": c}])) }),
            )
            .route(
                "/api/v1/pedidos/{n}",
                get(|Path(n): Path<String>| async move {
                    Json(json!({"pedido": {"numero": n}}))
                }),
            )
            .route(
                "/api/v1/pedidos/{n}/estado",
                put(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            )
            .route("/api/v1/sync/tickets", post(|| async { StatusCode::NO_CONTENT }))
            .route(
                "/api/v1/tickets",
                get(|| async { Json(json!({"tickets": [{"id": "7"}]})) }).post(
                    |Json(body): Json<Value>| async move {
                        (StatusCode::CREATED, Json(json!({"id": "7", "ticket": body})))
                    },
                ),
            )
            .route(
                "/api/v1/tickets/{id}",
                get(|Path(id): Path<String>| async move { Json(json!({"id": id})) })
                    .put(|| async { StatusCode::NOT_FOUND }),
            )
            .route(
                "/api/v1/negocios/{id}/sucursales",
                get(|Path(id): Path<String>| async move {
                    Json(json!({"sucursales": [{"negocio_id": id}]}))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_url_building_encodes_segments() {
        let client = AhorroClient::new(&config("http://ahorro.local/".to_string())).unwrap();
        let url = client.url(&["pedidos", "PED 1/2", "estado"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://ahorro.local/api/v1/pedidos/PED%201%2F2/estado"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = AhorroClient::new(&config("http://ahorro.local".to_string())).unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("test-key"));
    }

    #[tokio::test]
    async fn test_operations_against_mock() {
        let client = AhorroClient::new(&config(spawn_mock().await)).unwrap();

        assert!(client.is_healthy().await);
        assert_eq!(client.get_productos(None).await.len(), 2);
        assert_eq!(
            client.get_productos(Some("almacen")).await,
            vec![json!({"categoria": "almacen"})]
        );
        assert_eq!(
            client.get_pedido("PED-1").await,
            Some(json!({"numero": "PED-1"}))
        );
        assert!(!client.actualizar_estado_pedido("PED-1", "entregado").await);
        assert!(client.sync_tickets(&[json!({"id": 1})]).await);
    }

    #[tokio::test]
    async fn test_ticket_mirroring_against_mock() {
        let client = AhorroClient::new(&config(spawn_mock().await)).unwrap();

        let created = client.create_ticket(&json!({"numero": "PED-1"})).await.unwrap();
        assert_eq!(created["ticket"]["numero"], "PED-1");
        assert_eq!(client.get_ticket("7").await, Some(json!({"id": "7"})));
        assert!(client.update_ticket("7", &json!({"estado": "entregado"})).await.is_none());
        assert_eq!(client.get_tickets().await, vec![json!({"id": "7"})]);
        assert_eq!(
            client.get_sucursales("3").await,
            vec![json!({"negocio_id": "3"})]
        );
    }

    #[tokio::test]
    async fn test_unreachable_api_degrades() {
        // Port 9 (discard) is closed on test machines.
        let client = AhorroClient::new(&config("http://127.0.0.1:9".to_string())).unwrap();

        let health = client.health_check().await;
        assert_eq!(health["status"], "unhealthy");
        assert!(health["error"].is_string());
        assert!(client.get_productos(None).await.is_empty());
        assert!(client.get_pedido("X").await.is_none());
        assert!(!client.sync_tickets(&[]).await);
        assert!(client.get_negocios().await.is_empty());
    }
}
