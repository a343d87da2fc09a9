//! Local HTTP stand-in for the upstream services.
//!
//! Serves an axum router on an ephemeral port and records every request it
//! sees, so the real clients can be driven end to end.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::Request;
use axum::http::{Method, header};
use axum::middleware::{self, Next};
use secrecy::SecretString;
use tokio::net::TcpListener;
use url::Url;

use crate::config::UpstreamConfig;

/// A request as the stub received it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
}

/// A running stub server.
pub struct Stub {
    base: Url,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Stub {
    /// Serve `router` on `127.0.0.1:0`. Routes live under `/api/`.
    pub async fn start(router: Router) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let router = router.layer(middleware::from_fn(move |request: Request, next: Next| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(Seen {
                    method: request.method().clone(),
                    path: request.uri().path().to_string(),
                    authorization: request
                        .headers()
                        .get(header::AUTHORIZATION)
                        .and_then(|value| value.to_str().ok())
                        .map(String::from),
                });
                next.run(request).await
            }
        }));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        Self {
            base: Url::parse(&format!("http://{addr}/api/")).unwrap(),
            seen,
        }
    }

    /// Upstream configuration pointing every service at this stub.
    pub fn config(&self) -> UpstreamConfig {
        UpstreamConfig {
            cart_service_url: self.base.clone(),
            catalog_service_url: self.base.clone(),
            payment_service_url: self.base.clone(),
            payment_api_key: SecretString::from("sk_stub_key"),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    /// Number of requests received for `method` on `path`.
    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.seen()
            .iter()
            .filter(|seen| seen.method == *method && seen.path == path)
            .count()
    }
}
