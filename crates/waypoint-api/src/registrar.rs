//! # API Registrar
//!
//! Binds operations to versioned routes under `/{service}/{major}` and
//! publishes the resulting description.
//!
//! Registration is declarative: [`ApiRegistrar::register`] only records the
//! operation. Routes are assembled in [`ApiRegistrar::build`], in key order
//! `(path, method)`, so the order of `register` calls never changes the
//! resulting router or description.
//!
//! Every operation passes through [`auth_middleware`] unless it is
//! registered with [`Access::Public`], in which case it receives an
//! anonymous [`AuthContext`](crate::auth::AuthContext).
//!
//! ## Discovery routes
//!
//! | Path | Content |
//! |------|---------|
//! | `/{service}/openapi.json` | OpenAPI document with versioned paths and security |
//! | `/{service}/routes` | [`ApiDescription`] route table |
//! | `/{service}/api-document` | HTML page rendering the OpenAPI document |

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::handler::Handler;
use axum::http::Method;
use axum::middleware::from_fn;
use axum::response::Html;
use axum::routing::{get, on, MethodFilter, MethodRouter};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::openapi::path::{Operation as OpenApiOperation, PathItem};
use utoipa::openapi::security::SecurityRequirement;
use utoipa::openapi::server::ServerBuilder;
use utoipa::openapi::OpenApi;
use utoipa::ToSchema;

use crate::auth::{anonymous_context, auth_middleware, Authenticator};
use crate::openapi::docs_page;

// ── Versions ────────────────────────────────────────────────────────────────

/// A service version such as `v1.4.2`. Only the major component appears in
/// route paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersion {
    full: String,
    major: u64,
}

impl ApiVersion {
    pub fn major(&self) -> String {
        format!("v{}", self.major)
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl FromStr for ApiVersion {
    type Err = RegistrarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let numeric = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let major = numeric
            .split('.')
            .next()
            .and_then(|m| m.parse::<u64>().ok())
            .ok_or_else(|| RegistrarError::Version(s.to_string()))?;
        Ok(Self {
            full: trimmed.to_string(),
            major,
        })
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full)
    }
}

// ── Operations ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// Reachable without credentials.
    Public,
    /// Requires a valid credential.
    Protected,
}

/// What a route does, for the route table and the OpenAPI document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub id: &'static str,
    pub method: Method,
    /// Path below the versioned prefix, e.g. `/players/{id}`.
    pub path: &'static str,
    pub summary: &'static str,
    pub access: Access,
    /// Schema name of the request body, if any.
    pub request: Option<&'static str>,
    /// Schema name of the success response body, if any.
    pub response: Option<&'static str>,
}

impl Operation {
    /// A protected operation.
    pub fn new(id: &'static str, method: Method, path: &'static str) -> Self {
        Self {
            id,
            method,
            path,
            summary: "",
            access: Access::Protected,
            request: None,
            response: None,
        }
    }

    pub fn summary(mut self, summary: &'static str) -> Self {
        self.summary = summary;
        self
    }

    pub fn public(mut self) -> Self {
        self.access = Access::Public;
        self
    }

    pub fn request(mut self, schema: &'static str) -> Self {
        self.request = Some(schema);
        self
    }

    pub fn response(mut self, schema: &'static str) -> Self {
        self.response = Some(schema);
        self
    }
}

/// Machine-readable route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ApiDescription {
    pub service: String,
    pub version: String,
    /// Versioned prefix every route path starts with.
    pub prefix: String,
    pub routes: Vec<RouteDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RouteDescription {
    pub operation_id: String,
    pub method: String,
    /// Full path, prefix included.
    pub path: String,
    pub summary: String,
    pub access: Access,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrarError {
    #[error("route {method} {path} is already registered")]
    Duplicate { method: String, path: String },

    #[error("method {0} cannot be routed")]
    UnsupportedMethod(String),

    #[error("invalid route path '{0}': must start with '/' and not end with '/'")]
    InvalidPath(String),

    #[error("invalid service name '{0}'")]
    InvalidService(String),

    #[error("invalid version '{0}': expected a form like v1.2.3")]
    Version(String),
}

// ── Registrar ───────────────────────────────────────────────────────────────

struct Registered<S> {
    operation: Operation,
    handler: MethodRouter<S>,
}

pub struct ApiRegistrar<S> {
    service: String,
    version: ApiVersion,
    routes: BTreeMap<(&'static str, String), Registered<S>>,
}

impl<S> std::fmt::Debug for ApiRegistrar<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRegistrar")
            .field("service", &self.service)
            .field("version", &self.version)
            .field("routes", &self.routes.len())
            .finish()
    }
}

impl<S> ApiRegistrar<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(service: impl Into<String>, version: ApiVersion) -> Result<Self, RegistrarError> {
        let service = service.into();
        let valid = !service.is_empty()
            && service
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
        if !valid {
            return Err(RegistrarError::InvalidService(service));
        }
        Ok(Self {
            service,
            version,
            routes: BTreeMap::new(),
        })
    }

    /// `/{service}/{major}`.
    pub fn prefix(&self) -> String {
        format!("/{}/{}", self.service, self.version.major())
    }

    /// Record `operation`, served by `handler`.
    pub fn register<H, T>(
        &mut self,
        operation: Operation,
        handler: H,
    ) -> Result<&mut Self, RegistrarError>
    where
        H: Handler<T, S>,
        T: 'static,
    {
        let path = operation.path;
        if !path.starts_with('/') || (path.len() > 1 && path.ends_with('/')) {
            return Err(RegistrarError::InvalidPath(path.to_string()));
        }
        let filter = MethodFilter::try_from(operation.method.clone())
            .map_err(|_| RegistrarError::UnsupportedMethod(operation.method.to_string()))?;

        let key = (path, operation.method.as_str().to_string());
        if self.routes.contains_key(&key) {
            return Err(RegistrarError::Duplicate {
                method: key.1,
                path: path.to_string(),
            });
        }
        self.routes.insert(
            key,
            Registered {
                operation,
                handler: on(filter, handler),
            },
        );
        Ok(self)
    }

    pub fn describe(&self) -> ApiDescription {
        let prefix = self.prefix();
        ApiDescription {
            service: self.service.clone(),
            version: self.version.to_string(),
            prefix: prefix.clone(),
            routes: self
                .routes
                .values()
                .map(|r| RouteDescription {
                    operation_id: r.operation.id.to_string(),
                    method: r.operation.method.to_string(),
                    path: format!("{prefix}{}", r.operation.path),
                    summary: r.operation.summary.to_string(),
                    access: r.operation.access,
                    request: r.operation.request.map(str::to_string),
                    response: r.operation.response.map(str::to_string),
                })
                .collect(),
        }
    }

    /// Rewrite `doc` to describe exactly the registered routes: versioned
    /// paths, operation ids, the credential scheme on protected
    /// operations, and `server_url` as the server.
    pub fn document(&self, mut doc: OpenApi, authenticator: &Authenticator, server_url: &str) -> OpenApi {
        let prefix = self.prefix();
        let scheme = authenticator.validator().scheme_name();
        let mut documented = std::mem::take(&mut doc.paths.paths);

        for registered in self.routes.values() {
            let op = &registered.operation;
            let Some(item) = documented.get_mut(op.path) else {
                tracing::debug!(path = op.path, "registered route has no documented path");
                continue;
            };
            let Some(operation) = operation_mut(item, &op.method) else {
                tracing::debug!(path = op.path, method = %op.method, "registered method is undocumented");
                continue;
            };
            operation.operation_id = Some(op.id.to_string());
            if !op.summary.is_empty() {
                operation.summary = Some(op.summary.to_string());
            }
            operation.security = match op.access {
                Access::Protected => Some(vec![SecurityRequirement::new(
                    scheme,
                    Vec::<String>::new(),
                )]),
                Access::Public => None,
            };
        }

        for (path, mut item) in documented {
            let registered = |method: &Method| {
                self.routes
                    .keys()
                    .any(|(p, m)| *p == path.as_str() && m == method.as_str())
            };
            prune_unregistered(&mut item, registered);
            if has_operations(&item) {
                doc.paths.paths.insert(format!("{prefix}{path}"), item);
            }
        }

        doc.components
            .get_or_insert_with(Default::default)
            .add_security_scheme(scheme, authenticator.validator().security_scheme());
        doc.servers = Some(vec![ServerBuilder::new()
            .url(server_url)
            .description(Some("Local Environment"))
            .build()]);
        doc.info.version = self.version.to_string();
        doc
    }

    /// Assemble the router: registered routes under the versioned prefix
    /// with auth attached, plus the discovery routes.
    pub fn build(self, authenticator: Authenticator, doc: OpenApi, server_url: &str) -> Router<S> {
        let description = Arc::new(self.describe());
        let document = Arc::new(self.document(doc, &authenticator, server_url));
        let prefix = self.prefix();
        let service = self.service;

        let mut by_path: BTreeMap<&'static str, MethodRouter<S>> = BTreeMap::new();
        for ((path, _), registered) in self.routes {
            let handler = match registered.operation.access {
                Access::Protected => registered.handler.route_layer(from_fn(auth_middleware)),
                Access::Public => registered.handler.route_layer(from_fn(anonymous_context)),
            };
            let merged = match by_path.remove(path) {
                Some(existing) => existing.merge(handler),
                None => handler,
            };
            by_path.insert(path, merged);
        }

        let versioned = by_path
            .into_iter()
            .fold(Router::new(), |router, (path, handler)| router.route(path, handler));

        tracing::info!(
            prefix = %prefix,
            routes = description.routes.len(),
            scheme = authenticator.validator().scheme_name(),
            "api routes registered"
        );

        let html = Arc::new(docs_page(&service));
        let discovery = Router::new()
            .route(
                &format!("/{service}/openapi.json"),
                get(move || {
                    let document = Arc::clone(&document);
                    async move { Json(document.as_ref().clone()) }
                }),
            )
            .route(
                &format!("/{service}/routes"),
                get(move || {
                    let description = Arc::clone(&description);
                    async move { Json(description.as_ref().clone()) }
                }),
            )
            .route(
                &format!("/{service}/api-document"),
                get(move || {
                    let html = Arc::clone(&html);
                    async move { Html(html.as_ref().clone()) }
                }),
            );

        Router::new()
            .nest(&prefix, versioned)
            .merge(discovery)
            .layer(Extension(authenticator))
    }
}

fn operation_mut<'a>(item: &'a mut PathItem, method: &Method) -> Option<&'a mut OpenApiOperation> {
    let slot = if method == Method::GET {
        &mut item.get
    } else if method == Method::POST {
        &mut item.post
    } else if method == Method::PUT {
        &mut item.put
    } else if method == Method::PATCH {
        &mut item.patch
    } else if method == Method::DELETE {
        &mut item.delete
    } else if method == Method::HEAD {
        &mut item.head
    } else if method == Method::OPTIONS {
        &mut item.options
    } else if method == Method::TRACE {
        &mut item.trace
    } else {
        return None;
    };
    slot.as_mut()
}

fn prune_unregistered(item: &mut PathItem, registered: impl Fn(&Method) -> bool) {
    let slots = [
        (Method::GET, &mut item.get),
        (Method::POST, &mut item.post),
        (Method::PUT, &mut item.put),
        (Method::PATCH, &mut item.patch),
        (Method::DELETE, &mut item.delete),
        (Method::HEAD, &mut item.head),
        (Method::OPTIONS, &mut item.options),
        (Method::TRACE, &mut item.trace),
    ];
    for (method, slot) in slots {
        if !registered(&method) {
            *slot = None;
        }
    }
}

fn has_operations(item: &PathItem) -> bool {
    [
        &item.get,
        &item.post,
        &item.put,
        &item.patch,
        &item.delete,
        &item.head,
        &item.options,
        &item.trace,
    ]
    .iter()
    .any(|slot| slot.is_some())
}
