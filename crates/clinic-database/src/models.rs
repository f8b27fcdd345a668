//! 数据库模型

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clinic_core::models::*;
use clinic_core::utils::line_items_total;
use serde::Deserialize;
use sqlx::FromRow;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 数据库用户表（含密码哈希，仅在认证路径使用，不对外序列化）
#[derive(Debug, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: String, // 存储为字符串，转换为Role枚举
    pub is_first_login: bool,
    pub session_duration_hours: i32,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(db_user: DbUser) -> Self {
        User {
            id: db_user.id,
            username: db_user.username,
            // 未知角色按最低权限的前台处理
            role: Role::parse(&db_user.role).unwrap_or(Role::Receptionist),
            full_name: db_user.full_name,
            is_first_login: db_user.is_first_login,
            session_duration_hours: db_user.session_duration_hours,
            created_at: db_user.created_at,
        }
    }
}

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DbPatient> for Patient {
    fn from(db_patient: DbPatient) -> Self {
        Patient {
            id: db_patient.id,
            name: db_patient.name,
            phone: db_patient.phone,
            email: db_patient.email,
            date_of_birth: db_patient.date_of_birth,
            address: db_patient.address,
            medical_history: db_patient.medical_history,
            notes: db_patient.notes,
            created_at: db_patient.created_at,
        }
    }
}

/// 数据库诊疗项目表
#[derive(Debug, FromRow)]
pub struct DbProcedure {
    pub id: Uuid,
    pub name: String,
    pub price_jod: f64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DbProcedure> for Procedure {
    fn from(db_procedure: DbProcedure) -> Self {
        Procedure {
            id: db_procedure.id,
            name: db_procedure.name,
            price_jod: db_procedure.price_jod,
            description: db_procedure.description,
            created_at: db_procedure.created_at,
        }
    }
}

/// 预约联查行（附带患者/医生姓名）
#[derive(Debug, FromRow)]
pub struct DbAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DbAppointment> for Appointment {
    fn from(db_appointment: DbAppointment) -> Self {
        Appointment {
            id: db_appointment.id,
            patient_id: db_appointment.patient_id,
            patient_name: db_appointment.patient_name,
            doctor_id: db_appointment.doctor_id,
            doctor_name: db_appointment.doctor_name,
            appointment_date: db_appointment.appointment_date,
            appointment_time: db_appointment.appointment_time,
            duration_minutes: db_appointment.duration_minutes,
            status: db_appointment.status,
            notes: db_appointment.notes,
            created_at: db_appointment.created_at,
        }
    }
}

/// 就诊联查行，项目明细另行查询后组装
#[derive(Debug, FromRow)]
pub struct DbVisit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub visit_date: DateTime<Utc>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DbVisit {
    /// 与项目明细组装为完整就诊记录，费用按当前价格合计
    pub fn into_visit(self, procedures: Vec<VisitProcedure>) -> Visit {
        let total_cost_jod = line_items_total(&procedures);
        Visit {
            id: self.id,
            patient_id: self.patient_id,
            patient_name: self.patient_name,
            doctor_id: self.doctor_id,
            doctor_name: self.doctor_name,
            visit_date: self.visit_date,
            status: self.status,
            notes: self.notes,
            procedures,
            total_cost_jod,
            created_at: self.created_at,
        }
    }
}

/// 就诊项目明细行（联查项目当前价格）
#[derive(Debug, FromRow)]
pub struct DbVisitProcedure {
    pub id: Uuid,
    pub name: String,
    pub price_jod: f64,
    pub quantity: i32,
}

impl From<DbVisitProcedure> for VisitProcedure {
    fn from(row: DbVisitProcedure) -> Self {
        VisitProcedure {
            id: row.id,
            name: row.name,
            price_jod: row.price_jod,
            quantity: row.quantity,
        }
    }
}

/// 付款联查行
#[derive(Debug, FromRow)]
pub struct DbPayment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub amount_jod: f64,
    pub payment_date: DateTime<Utc>,
    pub recorded_by: Uuid,
    pub recorded_by_name: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DbPayment> for Payment {
    fn from(db_payment: DbPayment) -> Self {
        Payment {
            id: db_payment.id,
            patient_id: db_payment.patient_id,
            patient_name: db_payment.patient_name,
            amount_jod: db_payment.amount_jod,
            payment_date: db_payment.payment_date,
            recorded_by: db_payment.recorded_by,
            recorded_by_name: db_payment.recorded_by_name,
            notes: db_payment.notes,
            created_at: db_payment.created_at,
        }
    }
}

/// 影像表原始行（不联查，供下载和删除路径使用）
#[derive(Debug, FromRow)]
pub struct DbImageRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub uploaded_by: Uuid,
    pub image_path: String,
    pub image_type: String,
    pub description: Option<String>,
    pub upload_date: DateTime<Utc>,
}

/// 影像联查行（附带患者/上传者姓名）
#[derive(Debug, FromRow)]
pub struct DbMedicalImage {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub uploaded_by: Uuid,
    pub uploaded_by_name: String,
    pub image_path: String,
    pub image_type: String,
    pub description: Option<String>,
    pub upload_date: DateTime<Utc>,
}

impl From<DbMedicalImage> for MedicalImage {
    fn from(db_image: DbMedicalImage) -> Self {
        MedicalImage {
            id: db_image.id,
            patient_id: db_image.patient_id,
            patient_name: db_image.patient_name,
            uploaded_by: db_image.uploaded_by,
            uploaded_by_name: db_image.uploaded_by_name,
            image_path: db_image.image_path,
            image_type: db_image.image_type,
            description: db_image.description,
            upload_date: db_image.upload_date,
        }
    }
}

// 插入模型 - 用于创建新记录

/// 新用户插入模型（密码已在上层哈希）
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub session_duration_hours: i32,
}

/// 用户部分更新（password_hash已在上层哈希）
#[derive(Debug, Default)]
pub struct UpdateUser {
    pub full_name: Option<String>,
    pub session_duration_hours: Option<i32>,
    pub password_hash: Option<String>,
}

/// 新患者插入模型
#[derive(Debug, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub notes: Option<String>,
}

/// 患者部分更新
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePatient {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub notes: Option<String>,
}

/// 新诊疗项目插入模型
#[derive(Debug, Deserialize)]
pub struct NewProcedure {
    pub name: String,
    pub price_jod: f64,
    pub description: Option<String>,
}

/// 诊疗项目部分更新
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProcedure {
    pub name: Option<String>,
    pub price_jod: Option<f64>,
    pub description: Option<String>,
}

fn default_appointment_status() -> String {
    "scheduled".to_string()
}

fn default_duration_minutes() -> i32 {
    30
}

/// 新预约插入模型
#[derive(Debug, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: i32,
    #[serde(default = "default_appointment_status")]
    pub status: String,
    pub notes: Option<String>,
}

/// 预约部分更新
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAppointment {
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

fn default_visit_status() -> String {
    "in_progress".to_string()
}

fn default_quantity() -> i32 {
    1
}

/// 就诊项目行
#[derive(Debug, Deserialize)]
pub struct NewVisitProcedure {
    pub procedure_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

/// 新就诊插入模型，就诊时间由创建时刻决定
#[derive(Debug, Deserialize)]
pub struct NewVisit {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default = "default_visit_status")]
    pub status: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub procedures: Vec<NewVisitProcedure>,
}

/// 就诊部分更新（仅状态与备注可改）
#[derive(Debug, Default, Deserialize)]
pub struct UpdateVisit {
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// 新付款插入模型，经手人由会话决定
#[derive(Debug, Deserialize)]
pub struct NewPayment {
    pub patient_id: Uuid,
    pub amount_jod: f64,
    pub notes: Option<String>,
}

/// 新影像插入模型（文件已先行落盘）
#[derive(Debug)]
pub struct NewImage {
    pub patient_id: Uuid,
    pub uploaded_by: Uuid,
    pub image_path: String,
    pub image_type: String,
    pub description: Option<String>,
}
