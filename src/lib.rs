//! Consórcio Query API Library
//!
//! Read-mostly JSON API over people, installment-purchase plans, and the
//! contracts linking them, backed by a volatile in-memory store. The
//! interesting part is the request-resolution pipeline: per-request context
//! construction plus the cross-cutting concerns applied to every query.
//!
//! # Modules
//!
//! - `auth`: phone-code login, session tokens, identity resolution.
//! - `cache`: TTL + LRU response cache and cache-key digests.
//! - `config`: environment configuration.
//! - `context`: per-request context extractor (rate check, identity, loaders).
//! - `errors`: error taxonomy and HTTP mapping.
//! - `handlers`: HTTP request handlers and the router.
//! - `loader`: request-scoped batch loaders for related entities.
//! - `models`: entity and payload types.
//! - `rate_limit`: fixed-window request limiter.
//! - `store`: in-memory entity store.

pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod errors;
pub mod handlers;
pub mod loader;
pub mod models;
pub mod rate_limit;
pub mod store;
