//! HTTP处理器

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use clinic_core::{
    Appointment, ClinicError, Patient, Payment, Procedure, Role, User, Visit,
};
use clinic_database::{
    DatabaseQueries, NewAppointment, NewPatient, NewPayment, NewProcedure, NewUser, NewVisit,
    UpdateAppointment, UpdatePatient, UpdateProcedure, UpdateUser, UpdateVisit,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::permissions::{self, allow};
use crate::server::AppState;

/// API结果类型
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "Clinic Management API",
        "version": "1.0.0",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "api": "/api"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": "1.0.0"
    }))
}

// ========== 用户管理 ==========

fn default_session_hours() -> i32 {
    8
}

/// 创建用户请求
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default = "default_session_hours")]
    pub session_duration_hours: i32,
}

/// 更新用户请求
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub session_duration_hours: Option<i32>,
    pub password: Option<String>,
}

/// 创建用户（仅管理员）
pub async fn create_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<Json<User>> {
    permissions::require_role(&current_user, allow::MANAGE_USERS)?;

    let new_user = NewUser {
        username: request.username,
        password_hash: hash_password(&request.password)?,
        full_name: request.full_name,
        role: request.role,
        session_duration_hours: request.session_duration_hours,
    };

    let queries = DatabaseQueries::new(&state.db);
    let user = queries.create_user(&new_user).await?;

    info!("Created user {} with role {}", user.username, user.role.as_str());
    Ok(Json(user))
}

/// 获取所有用户（仅管理员）
pub async fn list_users(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
) -> ApiResult<Json<Vec<User>>> {
    permissions::require_role(&current_user, allow::MANAGE_USERS)?;

    let queries = DatabaseQueries::new(&state.db);
    Ok(Json(queries.list_users().await?))
}

/// 更新用户（仅管理员）
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    permissions::require_role(&current_user, allow::MANAGE_USERS)?;

    let password_hash = match request.password {
        Some(password) => Some(hash_password(&password)?),
        None => None,
    };

    let changes = UpdateUser {
        full_name: request.full_name,
        session_duration_hours: request.session_duration_hours,
        password_hash,
    };

    let queries = DatabaseQueries::new(&state.db);
    let user = queries
        .update_user(user_id, &changes)
        .await?
        .ok_or_else(|| ClinicError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// 删除用户（仅管理员，禁止删除自己的账号）
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    permissions::require_role(&current_user, allow::MANAGE_USERS)?;
    permissions::forbid_self_delete(&current_user, user_id)?;

    let queries = DatabaseQueries::new(&state.db);
    queries.delete_user(user_id).await?;

    Ok(Json(json!({"message": "User deleted successfully"})))
}

/// 获取医生列表
pub async fn list_doctors(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let queries = DatabaseQueries::new(&state.db);
    Ok(Json(queries.list_doctors().await?))
}

// ========== 患者管理 ==========

/// 患者响应，余额为每次读取时重新计算的派生值
#[derive(Debug, Serialize)]
pub struct PatientResponse {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub notes: Option<String>,
    pub balance_jod: f64,
    pub created_at: DateTime<Utc>,
}

impl PatientResponse {
    fn new(patient: Patient, balance_jod: f64) -> Self {
        Self {
            id: patient.id,
            name: patient.name,
            phone: patient.phone,
            email: patient.email,
            date_of_birth: patient.date_of_birth,
            address: patient.address,
            medical_history: patient.medical_history,
            notes: patient.notes,
            balance_jod,
            created_at: patient.created_at,
        }
    }
}

/// 创建患者
pub async fn create_patient(
    State(state): State<AppState>,
    Json(request): Json<NewPatient>,
) -> ApiResult<Json<PatientResponse>> {
    let queries = DatabaseQueries::new(&state.db);
    let patient = queries.create_patient(&request).await?;
    let balance = queries.patient_balance(patient.id).await?;

    info!("Created patient {}", patient.id);
    Ok(Json(PatientResponse::new(patient, balance)))
}

/// 获取所有患者（附带余额）
pub async fn list_patients(State(state): State<AppState>) -> ApiResult<Json<Vec<PatientResponse>>> {
    let queries = DatabaseQueries::new(&state.db);

    let mut result = Vec::new();
    for patient in queries.list_patients().await? {
        let balance = queries.patient_balance(patient.id).await?;
        result.push(PatientResponse::new(patient, balance));
    }

    Ok(Json(result))
}

/// 根据ID获取患者（附带余额）
pub async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Json<PatientResponse>> {
    let queries = DatabaseQueries::new(&state.db);
    let patient = queries
        .get_patient(patient_id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Patient not found".to_string()))?;
    let balance = queries.patient_balance(patient_id).await?;

    Ok(Json(PatientResponse::new(patient, balance)))
}

/// 更新患者
pub async fn update_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdatePatient>,
) -> ApiResult<Json<PatientResponse>> {
    let queries = DatabaseQueries::new(&state.db);
    let patient = queries
        .update_patient(patient_id, &request)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Patient not found".to_string()))?;
    let balance = queries.patient_balance(patient_id).await?;

    Ok(Json(PatientResponse::new(patient, balance)))
}

/// 删除患者及其全部关联记录（仅管理员）
pub async fn delete_patient(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    permissions::require_role(&current_user, allow::DELETE_PATIENT)?;

    let queries = DatabaseQueries::new(&state.db);
    queries.delete_patient(patient_id).await?;

    info!("Deleted patient {} and dependent records", patient_id);
    Ok(Json(json!({"message": "Patient deleted successfully"})))
}

// ========== 诊疗项目管理 ==========

/// 创建诊疗项目（仅管理员）
pub async fn create_procedure(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    Json(request): Json<NewProcedure>,
) -> ApiResult<Json<Procedure>> {
    permissions::require_role(&current_user, allow::MANAGE_PROCEDURES)?;

    let queries = DatabaseQueries::new(&state.db);
    Ok(Json(queries.create_procedure(&request).await?))
}

/// 获取所有诊疗项目
pub async fn list_procedures(State(state): State<AppState>) -> ApiResult<Json<Vec<Procedure>>> {
    let queries = DatabaseQueries::new(&state.db);
    Ok(Json(queries.list_procedures().await?))
}

/// 更新诊疗项目（仅管理员；改价对既往就诊追溯生效）
pub async fn update_procedure(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    Path(procedure_id): Path<Uuid>,
    Json(request): Json<UpdateProcedure>,
) -> ApiResult<Json<Procedure>> {
    permissions::require_role(&current_user, allow::MANAGE_PROCEDURES)?;

    let queries = DatabaseQueries::new(&state.db);
    let procedure = queries
        .update_procedure(procedure_id, &request)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Procedure not found".to_string()))?;

    Ok(Json(procedure))
}

/// 删除诊疗项目（仅管理员）
pub async fn delete_procedure(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    Path(procedure_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    permissions::require_role(&current_user, allow::MANAGE_PROCEDURES)?;

    let queries = DatabaseQueries::new(&state.db);
    queries.delete_procedure(procedure_id).await?;

    Ok(Json(json!({"message": "Procedure deleted successfully"})))
}

// ========== 预约管理 ==========

/// 预约列表查询参数
#[derive(Debug, Deserialize)]
pub struct AppointmentQuery {
    pub doctor_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

/// 创建预约
pub async fn create_appointment(
    State(state): State<AppState>,
    Json(request): Json<NewAppointment>,
) -> ApiResult<Json<Appointment>> {
    let queries = DatabaseQueries::new(&state.db);

    queries
        .get_patient(request.patient_id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Patient not found".to_string()))?;
    queries
        .get_user_by_id(request.doctor_id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Doctor not found".to_string()))?;

    Ok(Json(queries.create_appointment(&request).await?))
}

/// 获取预约列表
///
/// 医生角色的可见域固定为本人，见 [`permissions::appointment_doctor_scope`]。
pub async fn list_appointments(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    Query(query): Query<AppointmentQuery>,
) -> ApiResult<Json<Vec<Appointment>>> {
    let doctor_id = permissions::appointment_doctor_scope(&current_user, query.doctor_id);

    let queries = DatabaseQueries::new(&state.db);
    Ok(Json(queries.list_appointments(doctor_id, query.date).await?))
}

/// 更新预约
pub async fn update_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointment>,
) -> ApiResult<Json<Appointment>> {
    let queries = DatabaseQueries::new(&state.db);
    let appointment = queries
        .update_appointment(appointment_id, &request)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Appointment not found".to_string()))?;

    Ok(Json(appointment))
}

/// 删除预约（管理员或前台）
pub async fn delete_appointment(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    permissions::require_role(&current_user, allow::DELETE_APPOINTMENT)?;

    let queries = DatabaseQueries::new(&state.db);
    queries.delete_appointment(appointment_id).await?;

    Ok(Json(json!({"message": "Appointment deleted successfully"})))
}

// ========== 就诊管理 ==========

/// 就诊列表查询参数
#[derive(Debug, Deserialize)]
pub struct VisitQuery {
    pub patient_id: Option<Uuid>,
}

/// 创建就诊记录（医生或管理员）
pub async fn create_visit(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    Json(request): Json<NewVisit>,
) -> ApiResult<Json<Visit>> {
    permissions::require_role(&current_user, allow::MANAGE_VISITS)?;

    let queries = DatabaseQueries::new(&state.db);

    queries
        .get_patient(request.patient_id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Patient not found".to_string()))?;
    queries
        .get_user_by_id(request.doctor_id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Doctor not found".to_string()))?;

    let visit = queries.create_visit(&request).await?;
    info!("Created visit {} for patient {}", visit.id, visit.patient_id);

    Ok(Json(visit))
}

/// 获取就诊列表
pub async fn list_visits(
    State(state): State<AppState>,
    Query(query): Query<VisitQuery>,
) -> ApiResult<Json<Vec<Visit>>> {
    let queries = DatabaseQueries::new(&state.db);
    Ok(Json(queries.list_visits(query.patient_id).await?))
}

/// 更新就诊记录（医生或管理员）
pub async fn update_visit(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    Path(visit_id): Path<Uuid>,
    Json(request): Json<UpdateVisit>,
) -> ApiResult<Json<Visit>> {
    permissions::require_role(&current_user, allow::MANAGE_VISITS)?;

    let queries = DatabaseQueries::new(&state.db);
    let visit = queries
        .update_visit(visit_id, &request)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Visit not found".to_string()))?;

    Ok(Json(visit))
}

// ========== 付款管理 ==========

/// 付款列表查询参数
#[derive(Debug, Deserialize)]
pub struct PaymentQuery {
    pub patient_id: Option<Uuid>,
}

/// 收款登记（前台或管理员），经手人取当前会话用户
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    Json(request): Json<NewPayment>,
) -> ApiResult<Json<Payment>> {
    permissions::require_role(&current_user, allow::RECORD_PAYMENT)?;

    let queries = DatabaseQueries::new(&state.db);

    queries
        .get_patient(request.patient_id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Patient not found".to_string()))?;

    let payment = queries.create_payment(&request, current_user.id).await?;
    info!(
        "Recorded payment of {} JOD for patient {}",
        payment.amount_jod, payment.patient_id
    );

    Ok(Json(payment))
}

/// 获取付款列表
pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentQuery>,
) -> ApiResult<Json<Vec<Payment>>> {
    let queries = DatabaseQueries::new(&state.db);
    Ok(Json(queries.list_payments(query.patient_id).await?))
}

// ========== 错误处理 ==========

/// API错误包装，将ClinicError映射为HTTP响应
#[derive(Debug)]
pub struct ApiError(pub ClinicError);

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self.0 {
            ClinicError::NotAuthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            ClinicError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
            }
            ClinicError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ClinicError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ClinicError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ClinicError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ClinicError::Database(msg) | ClinicError::Storage(msg) | ClinicError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            ClinicError::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        let body = Json(json!({
            "error": true,
            "message": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
