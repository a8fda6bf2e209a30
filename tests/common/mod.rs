#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::{Duration, Utc};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use cheis::auth::{TokenGenerator, hash_password};
use cheis::config::ServerConfig;
use cheis::server::{AppState, create_router};
use cheis::store::{SqliteStore, Store};
use cheis::types::{NewCitation, NewData, NewUser, Role, Session, User};

pub const PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub router: Router,
}

pub struct Reply {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: Value,
}

impl Reply {
    /// Messages of all notices, in order.
    pub fn notices(&self) -> Vec<String> {
        self.body["notices"]
            .as_array()
            .map(|notices| {
                notices
                    .iter()
                    .filter_map(|n| n["message"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn field(&self, name: &str) -> Vec<String> {
        self.body["fields"][name]
            .as_array()
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = ServerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..config
        };

        let store = Arc::new(SqliteStore::new(config.db_path()).expect("open store"));
        store.initialize().expect("initialize store");

        let state = Arc::new(AppState::new(store.clone(), &config));
        let router = create_router(state);

        Self {
            temp_dir,
            store,
            router,
        }
    }

    pub fn user(&self, name: &str, role: Role) -> User {
        self.store
            .create_user(
                &NewUser {
                    name: name.to_string(),
                    email: format!("{}@test.com", name.to_lowercase()),
                    password_hash: hash_password(PASSWORD).expect("hash password"),
                },
                role,
            )
            .expect("create user")
    }

    /// Issues a session token for `user` directly through the store.
    pub fn token(&self, user: &User) -> String {
        let issued = TokenGenerator::new().issue().expect("issue token");
        let now = Utc::now();
        self.store
            .create_session(&Session {
                id: Uuid::new_v4().to_string(),
                token_hash: issued.hash,
                token_lookup: issued.lookup,
                user_id: user.id,
                created_at: now,
                expires_at: Some(now + Duration::hours(1)),
                last_used_at: None,
            })
            .expect("create session");
        issued.token
    }

    pub fn citation(&self, creator: &User, doi: &str) -> i64 {
        self.store
            .create_citation(
                creator,
                &NewCitation {
                    creator_id: creator.id,
                    authors: "Smith, J.; Jones, K.".to_string(),
                    year: 2001,
                    journal: "GCA".to_string(),
                    doi: doi.to_string(),
                    ads: String::new(),
                },
            )
            .expect("create citation")
            .id
    }

    pub fn data(&self, creator: &User, citation_id: i64, sample_type: &str, element: &str) -> i64 {
        self.store
            .create_data(
                creator,
                &[NewData {
                    citation_id,
                    creator_id: creator.id,
                    sample_type: sample_type.to_string(),
                    element: element.to_string(),
                }],
            )
            .expect("create data")[0]
            .id
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("send request");

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        Reply {
            status,
            location,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Reply {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Reply {
        self.request(Method::POST, uri, token, Some(body)).await
    }
}
