//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 管理员 - 完全访问权限
    Admin,
    /// 医生 - 诊疗和就诊记录权限
    Doctor,
    /// 前台 - 预约和收款权限
    Receptionist,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Receptionist => "receptionist",
        }
    }

    /// 解析数据库中存储的角色字符串
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "doctor" => Some(Role::Doctor),
            "receptionist" => Some(Role::Receptionist),
            _ => None,
        }
    }
}

/// 系统用户（不含密码哈希，可直接序列化为响应）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub is_first_login: bool,
    pub session_duration_hours: i32,
    pub created_at: DateTime<Utc>,
}

/// 患者基本信息（余额为派生值，不在此存储）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
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

/// 诊疗项目（价格不留历史版本，改价对既往就诊追溯生效）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    pub id: Uuid,
    pub name: String,
    pub price_jod: f64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 预约信息（含冗余的患者/医生姓名，便于前端展示）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
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

/// 就诊项目明细（价格取读取时的当前价）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitProcedure {
    pub id: Uuid,
    pub name: String,
    pub price_jod: f64,
    pub quantity: i32,
}

/// 就诊记录，total_cost_jod 按当前项目价格计算
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub visit_date: DateTime<Utc>,
    pub status: String,
    pub notes: Option<String>,
    pub procedures: Vec<VisitProcedure>,
    pub total_cost_jod: f64,
    pub created_at: DateTime<Utc>,
}

/// 付款记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
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

/// 医学影像记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalImage {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Admin, Role::Doctor, Role::Receptionist] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_role_rejects_unknown() {
        assert_eq!(Role::parse("nurse"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse("Admin"), None);
    }
}
