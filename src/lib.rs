//! HTTP service for creating polls and collecting one vote per user per poll.
//!
//! Persistence sits behind [`store::Backend`]; caller identity behind
//! [`session::IdentityProvider`]. Both are chosen at startup from
//! [`config::Config`].
use std::sync::Arc;

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod models;
pub mod poll;
pub mod routes;
pub mod session;
pub mod store;
pub mod vote;

use session::IdentityProvider;
use store::Backend;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub identity: Arc<dyn IdentityProvider>,
    pub site_url: Arc<str>,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn Backend>,
        identity: Arc<dyn IdentityProvider>,
        site_url: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            backend,
            identity,
            site_url: site_url.into(),
        }
    }
}
