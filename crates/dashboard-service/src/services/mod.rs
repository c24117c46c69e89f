//! Service layer for the dashboard.
//!
//! # Components
//!
//! - `item_store` - `ItemStore` trait and the in-memory backend
//! - `redis_store` - Redis-backed `ItemStore`
//! - `identity` - identity provider client for sign-up, confirmation and login

pub mod identity;
pub mod item_store;
pub mod redis_store;

pub use identity::{CognitoIdentityClient, IdentityClient, IdentityError, IdentityErrorKind};
pub use item_store::{ItemStore, MemoryItemStore};
pub use redis_store::RedisItemStore;
