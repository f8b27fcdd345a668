//! 权限控制
//!
//! 受限端点的角色准入集中声明在此，网关只做集合成员判断，
//! 处理器内不再出现零散的角色比较。

use clinic_core::{ClinicError, Result, Role, User};
use uuid::Uuid;

/// 各端点的角色准入表
pub mod allow {
    use clinic_core::Role;

    /// 用户管理（创建/列表/更新/删除）
    pub const MANAGE_USERS: &[Role] = &[Role::Admin];
    /// 删除患者（触发级联删除）
    pub const DELETE_PATIENT: &[Role] = &[Role::Admin];
    /// 诊疗项目管理（创建/更新/删除）
    pub const MANAGE_PROCEDURES: &[Role] = &[Role::Admin];
    /// 取消预约
    pub const DELETE_APPOINTMENT: &[Role] = &[Role::Admin, Role::Receptionist];
    /// 就诊记录（创建/更新）
    pub const MANAGE_VISITS: &[Role] = &[Role::Doctor, Role::Admin];
    /// 收款登记
    pub const RECORD_PAYMENT: &[Role] = &[Role::Receptionist, Role::Admin];
    /// 影像上传与删除
    pub const MANAGE_IMAGES: &[Role] = &[Role::Doctor, Role::Admin];
}

/// 角色网关：当且仅当用户角色在准入表中时放行
pub fn require_role<'a>(user: &'a User, allowed: &[Role]) -> Result<&'a User> {
    if allowed.contains(&user.role) {
        Ok(user)
    } else {
        Err(ClinicError::Forbidden("Insufficient permissions".to_string()))
    }
}

/// 自删保护：用户不能删除自己的账号
pub fn forbid_self_delete(current_user: &User, target_id: Uuid) -> Result<()> {
    if current_user.id == target_id {
        Err(ClinicError::BadRequest(
            "Cannot delete your own account".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// 预约列表的医生可见域
///
/// 医生角色固定只能看到自己的预约，请求中的doctor_id参数被静默覆盖；
/// 其他角色按请求参数过滤。
pub fn appointment_doctor_scope(user: &User, requested: Option<Uuid>) -> Option<Uuid> {
    if user.role == Role::Doctor {
        Some(user.id)
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "u".to_string(),
            full_name: "U".to_string(),
            role,
            is_first_login: false,
            session_duration_hours: 8,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_admin_only_tables() {
        for table in [allow::MANAGE_USERS, allow::DELETE_PATIENT, allow::MANAGE_PROCEDURES] {
            assert!(require_role(&user(Role::Admin), table).is_ok());
            assert!(require_role(&user(Role::Doctor), table).is_err());
            assert!(require_role(&user(Role::Receptionist), table).is_err());
        }
    }

    #[test]
    fn test_delete_appointment_admits_admin_and_receptionist() {
        assert!(require_role(&user(Role::Admin), allow::DELETE_APPOINTMENT).is_ok());
        assert!(require_role(&user(Role::Receptionist), allow::DELETE_APPOINTMENT).is_ok());
        assert!(require_role(&user(Role::Doctor), allow::DELETE_APPOINTMENT).is_err());
    }

    #[test]
    fn test_visits_and_images_admit_doctor_and_admin() {
        for table in [allow::MANAGE_VISITS, allow::MANAGE_IMAGES] {
            assert!(require_role(&user(Role::Doctor), table).is_ok());
            assert!(require_role(&user(Role::Admin), table).is_ok());
            assert!(require_role(&user(Role::Receptionist), table).is_err());
        }
    }

    #[test]
    fn test_payment_admits_receptionist_and_admin() {
        assert!(require_role(&user(Role::Receptionist), allow::RECORD_PAYMENT).is_ok());
        assert!(require_role(&user(Role::Admin), allow::RECORD_PAYMENT).is_ok());
        assert!(require_role(&user(Role::Doctor), allow::RECORD_PAYMENT).is_err());
    }

    #[test]
    fn test_self_delete_guard() {
        let admin = user(Role::Admin);
        assert!(forbid_self_delete(&admin, admin.id).is_err());
        assert!(forbid_self_delete(&admin, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_doctor_scope_overrides_requested_filter() {
        let doctor = user(Role::Doctor);
        let other = Uuid::new_v4();

        // 医生请求他人的预约列表时被静默覆盖为自己
        assert_eq!(appointment_doctor_scope(&doctor, Some(other)), Some(doctor.id));
        assert_eq!(appointment_doctor_scope(&doctor, None), Some(doctor.id));
    }

    #[test]
    fn test_non_doctor_scope_passes_filter_through() {
        let admin = user(Role::Admin);
        let requested = Uuid::new_v4();

        assert_eq!(appointment_doctor_scope(&admin, Some(requested)), Some(requested));
        assert_eq!(appointment_doctor_scope(&admin, None), None);

        let receptionist = user(Role::Receptionist);
        assert_eq!(
            appointment_doctor_scope(&receptionist, Some(requested)),
            Some(requested)
        );
    }
}
