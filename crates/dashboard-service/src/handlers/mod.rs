//! HTTP request handlers for the dashboard service.

pub mod health;
pub mod items;
pub mod me;
pub mod metrics;
pub mod pages;
pub mod session;

pub use health::{health_check, readiness_check};
pub use items::{create_item, delete_item, list_items, update_item};
pub use me::get_me;
pub use metrics::metrics_handler;
pub use pages::{confirm_page, dashboard_page, login_page, root_redirect, signup_page};
pub use session::{confirm, login, logout, signup};
