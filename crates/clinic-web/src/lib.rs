//! # Clinic Web
//!
//! 诊所管理系统的HTTP服务层：会话认证、权限控制与REST接口。

pub mod auth;
pub mod handlers;
pub mod images;
pub mod permissions;
pub mod server;

pub use auth::SessionStore;
pub use server::{AppState, WebServer};
