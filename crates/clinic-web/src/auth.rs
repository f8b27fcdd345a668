//! 用户认证与会话管理
//!
//! 登录成功后签发不透明令牌，调用方以 `Authorization: Bearer <token>`
//! 回传；会话状态保存在服务端进程内。

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use clinic_core::{ClinicError, Result, User};
use clinic_database::DatabaseQueries;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::handlers::{ApiError, ApiResult};
use crate::server::AppState;

/// 会话数据
///
/// 用户配置的会话时长只存档展示，不参与超时计算。
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// 服务端会话存储（进程内）
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为用户签发新的会话令牌
    pub async fn create(&self, user_id: Uuid) -> String {
        let token = Uuid::new_v4().to_string();
        let session = Session {
            user_id,
            created_at: Utc::now(),
        };
        self.sessions.write().await.insert(token.clone(), session);
        token
    }

    /// 解析会话令牌
    pub async fn resolve(&self, token: &str) -> Option<Session> {
        self.sessions.read().await.get(token).cloned()
    }

    /// 注销会话令牌
    pub async fn remove(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }
}

/// 生成带盐的密码哈希
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| ClinicError::Internal(e.to_string()))
}

/// 校验密码（常量时间比较由bcrypt保证）
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}

/// 从请求头提取Bearer令牌
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// 登录请求
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// 登录响应
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// 修改密码请求
#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub new_password: String,
}

/// 认证中间件
///
/// 解析令牌并从数据库读取最新的用户信息注入请求扩展；
/// 会话指向的用户已被删除时按未认证处理。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ClinicError::NotAuthenticated("Not authenticated".to_string()))?
        .to_string();

    let session = state
        .sessions
        .resolve(&token)
        .await
        .ok_or_else(|| ClinicError::NotAuthenticated("Not authenticated".to_string()))?;

    let queries = DatabaseQueries::new(&state.db);
    let user = queries
        .get_user_by_id(session.user_id)
        .await?
        .ok_or_else(|| ClinicError::NotAuthenticated("User not found".to_string()))?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// 登录处理器
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    info!("Login attempt for user: {}", request.username);

    let queries = DatabaseQueries::new(&state.db);
    let row = queries.get_user_by_username(&request.username).await?;

    // 用户不存在与密码错误返回同一错误，不暴露账号是否存在
    let row = match row {
        Some(row) if verify_password(&request.password, &row.password_hash) => row,
        _ => {
            warn!("Login failed for user: {}", request.username);
            return Err(ClinicError::InvalidCredentials.into());
        }
    };

    let user = User::from(row);
    let token = state.sessions.create(user.id).await;
    info!("User logged in successfully: {}", user.username);

    Ok(Json(LoginResponse { token, user }))
}

/// 登出处理器（无论令牌是否有效都返回成功）
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<serde_json::Value> {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.remove(token).await;
    }

    Json(json!({"message": "Logged out successfully"}))
}

/// 获取当前用户信息
pub async fn get_current_user(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

/// 修改密码并清除首次登录标记
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<PasswordChangeRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let password_hash = hash_password(&request.new_password)?;

    let queries = DatabaseQueries::new(&state.db);
    queries.update_password(user.id, &password_hash).await?;

    info!("Password changed for user: {}", user.username);
    Ok(Json(json!({"message": "Password changed successfully"})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_round_trip() {
        let store = SessionStore::new();
        let user_id = Uuid::new_v4();

        let token = store.create(user_id).await;
        let session = store.resolve(&token).await.unwrap();
        assert_eq!(session.user_id, user_id);
    }

    #[tokio::test]
    async fn test_resolve_after_remove_fails() {
        let store = SessionStore::new();
        let token = store.create(Uuid::new_v4()).await;

        store.remove(&token).await;
        assert!(store.resolve(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_token_resolves_to_none() {
        let store = SessionStore::new();
        assert!(store.resolve("no-such-token").await.is_none());
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("s3cret").unwrap();
        assert_ne!(hash, "s3cret");
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("s3cret", "not-a-bcrypt-hash"));
    }
}
