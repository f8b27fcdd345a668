//! Web服务器

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use clinic_core::{ClinicError, Result};
use clinic_database::DatabasePool;
use clinic_storage::StorageManager;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::auth::{self, SessionStore};
use crate::{handlers, images};

/// 每个请求可见的共享状态（显式注入，无进程级单例连接）
#[derive(Clone)]
pub struct AppState {
    pub db: DatabasePool,
    pub sessions: SessionStore,
    pub storage: StorageManager,
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        let app = Self::create_app(state);
        Self { addr, app }
    }

    fn create_app(state: AppState) -> Router {
        // 需要会话的业务路由
        let protected = Router::new()
            .route("/auth/me", get(auth::get_current_user))
            .route("/auth/change-password", post(auth::change_password))
            .route("/users", post(handlers::create_user).get(handlers::list_users))
            .route(
                "/users/:id",
                put(handlers::update_user).delete(handlers::delete_user),
            )
            .route("/doctors", get(handlers::list_doctors))
            .route(
                "/patients",
                post(handlers::create_patient).get(handlers::list_patients),
            )
            .route(
                "/patients/:id",
                get(handlers::get_patient)
                    .put(handlers::update_patient)
                    .delete(handlers::delete_patient),
            )
            .route(
                "/procedures",
                post(handlers::create_procedure).get(handlers::list_procedures),
            )
            .route(
                "/procedures/:id",
                put(handlers::update_procedure).delete(handlers::delete_procedure),
            )
            .route(
                "/appointments",
                post(handlers::create_appointment).get(handlers::list_appointments),
            )
            .route(
                "/appointments/:id",
                put(handlers::update_appointment).delete(handlers::delete_appointment),
            )
            .route(
                "/visits",
                post(handlers::create_visit).get(handlers::list_visits),
            )
            .route("/visits/:id", put(handlers::update_visit))
            .route(
                "/payments",
                post(handlers::create_payment).get(handlers::list_payments),
            )
            .route("/images/upload", post(images::upload_image))
            .route(
                "/images/:id",
                get(images::get_image).delete(images::delete_image),
            )
            .route("/images/patient/:patient_id", get(images::list_patient_images))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                auth::auth_middleware,
            ));

        // 认证入口（无需会话）
        let public = Router::new()
            .route("/auth/login", post(auth::login))
            .route("/auth/logout", post(auth::logout));

        Router::new()
            // 根路径与健康检查
            .route("/", get(handlers::api_root))
            .route("/health", get(handlers::health))
            // 业务API
            .nest("/api", public.merge(protected))
            // 全局中间件
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(
                        CorsLayer::new()
                            .allow_origin(Any)
                            .allow_methods(Any)
                            .allow_headers(Any),
                    ),
            )
            // 影像上传需要放宽请求体上限
            .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
            .with_state(state)
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| ClinicError::Internal(format!("Failed to start web server: {}", e)))?;

        Ok(())
    }
}
