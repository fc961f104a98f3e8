#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Builds the real router and state over in-memory collaborators, so the
//! full HTTP path runs without network services.

#![allow(dead_code)]

use std::net::{IpAddr, SocketAddr};

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use connected_api::AppState;
use connected_api::form::{CsrfSigner, CsrfToken, OriginPolicy};
use connected_api::routes;
use connected_test_utils::Fakes;

/// Signing secret shared by the app and the tests.
pub const SECRET: &str = "integration-test-secret";

/// The allow-listed origin.
pub const ORIGIN: &str = "https://connected.example";

/// Test application wrapper using the real routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub fakes: Fakes,
    signer: CsrfSigner,
}

impl TestApp {
    /// App over the given fakes, reached directly with no proxy.
    pub fn new(fakes: Fakes) -> Self {
        Self::behind_proxies(fakes, &[])
    }

    /// App that believes forwarding headers from `proxies`.
    pub fn behind_proxies(fakes: Fakes, proxies: &[&str]) -> Self {
        let proxies: Vec<IpAddr> = proxies
            .iter()
            .map(|p| p.parse().expect("proxy address"))
            .collect();
        let signer = CsrfSigner::new(SECRET);
        let state = AppState::from_parts(
            OriginPolicy::new([ORIGIN, "https://www.connected.example"]),
            proxies,
            signer.clone(),
            fakes.collaborators(),
        );
        let router = routes::app(state.clone());

        Self {
            router,
            state,
            fakes,
            signer,
        }
    }

    /// App whose collaborators all succeed.
    pub fn happy() -> Self {
        Self::new(Fakes::happy())
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// A token issued now under the app's secret.
    pub fn fresh_token(&self) -> CsrfToken {
        self.token_issued_at(chrono::Utc::now().timestamp())
    }

    /// A token issued at `timestamp` under the app's secret.
    pub fn token_issued_at(&self, timestamp: i64) -> CsrfToken {
        self.signer.issue_at(timestamp).expect("issue token")
    }

    pub fn stored(&self) -> usize {
        self.fakes.store.records().len()
    }

    pub fn sent(&self) -> usize {
        self.fakes.notifier.sent().len()
    }
}

/// Build a contact form POST.
pub fn post_contact(body: impl Into<Body>, origin: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/api/contact").header(header::CONTENT_TYPE, "application/json");
    if let Some(origin) = origin {
        builder = builder.header(header::ORIGIN, origin);
    }
    builder.body(body.into()).expect("valid request")
}

/// Mark a request as arriving from TCP peer `addr`.
pub fn from_peer(mut request: Request<Body>, addr: &str) -> Request<Body> {
    let addr: SocketAddr = addr.parse().expect("socket address");
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// Build a token GET.
pub fn get_token(origin: Option<&str>) -> Request<Body> {
    let mut builder = Request::get("/api/csrf-token");
    if let Some(origin) = origin {
        builder = builder.header(header::ORIGIN, origin);
    }
    builder.body(Body::empty()).expect("valid request")
}

/// Read a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}

/// Read a response body as text.
pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("UTF-8 body")
}
