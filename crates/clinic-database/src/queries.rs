//! 数据库查询操作

use crate::connection::DatabasePool;
use crate::models::*;
use clinic_core::utils::outstanding_balance;
use clinic_core::{
    Appointment, ClinicError, MedicalImage, Patient, Payment, Procedure, Result, User, Visit,
    VisitProcedure,
};
use chrono::NaiveDate;
use uuid::Uuid;

/// 数据库查询操作接口
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    ///
    /// 有意不声明外键：删除诊疗项目或用户必须保留历史引用（余额计算
    /// 对缺失项目宽松跳过），患者的关联清理由应用层级联删除负责。
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建用户表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                username VARCHAR(64) UNIQUE NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                full_name VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL,
                is_first_login BOOLEAN NOT NULL DEFAULT TRUE,
                session_duration_hours INTEGER NOT NULL DEFAULT 8,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| ClinicError::Database(e.to_string()))?;

        // 创建患者表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS patients (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                phone VARCHAR(64) NOT NULL,
                email VARCHAR(255),
                date_of_birth DATE,
                address TEXT,
                medical_history TEXT,
                notes TEXT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| ClinicError::Database(e.to_string()))?;

        // 创建诊疗项目表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS procedures (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                price_jod DOUBLE PRECISION NOT NULL,
                description TEXT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| ClinicError::Database(e.to_string()))?;

        // 创建预约表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS appointments (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL,
                doctor_id UUID NOT NULL,
                appointment_date DATE NOT NULL,
                appointment_time TIME NOT NULL,
                duration_minutes INTEGER NOT NULL DEFAULT 30,
                status VARCHAR(32) NOT NULL DEFAULT 'scheduled',
                notes TEXT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| ClinicError::Database(e.to_string()))?;

        // 创建就诊表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS visits (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL,
                doctor_id UUID NOT NULL,
                visit_date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                status VARCHAR(32) NOT NULL DEFAULT 'in_progress',
                notes TEXT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| ClinicError::Database(e.to_string()))?;

        // 创建就诊项目表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS visit_procedures (
                id UUID PRIMARY KEY,
                visit_id UUID NOT NULL,
                procedure_id UUID NOT NULL,
                quantity INTEGER NOT NULL DEFAULT 1,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| ClinicError::Database(e.to_string()))?;

        // 创建付款表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS payments (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL,
                amount_jod DOUBLE PRECISION NOT NULL,
                payment_date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                recorded_by UUID NOT NULL,
                notes TEXT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| ClinicError::Database(e.to_string()))?;

        // 创建影像表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS medical_images (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL,
                uploaded_by UUID NOT NULL,
                image_path VARCHAR(512) NOT NULL,
                image_type VARCHAR(64) NOT NULL,
                description TEXT,
                upload_date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| ClinicError::Database(e.to_string()))?;

        // 创建索引以优化查询性能
        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_users_username ON users(username)",
            "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_doctor_id ON appointments(doctor_id)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(appointment_date)",
            "CREATE INDEX IF NOT EXISTS idx_visits_patient_id ON visits(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_visit_procedures_visit_id ON visit_procedures(visit_id)",
            "CREATE INDEX IF NOT EXISTS idx_payments_patient_id ON payments(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_medical_images_patient_id ON medical_images(patient_id)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(pool)
                .await
                .map_err(|e| ClinicError::Database(e.to_string()))?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }

    /// 确保默认管理员账号存在（首次启动时创建）
    pub async fn ensure_default_admin(&self, password_hash: &str) -> Result<()> {
        let pool = self.pool.pool();

        let existing = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM users WHERE username = 'admin'"
        )
        .fetch_optional(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        if existing.is_none() {
            sqlx::query(r#"
                INSERT INTO users (id, username, password_hash, full_name, role, is_first_login, session_duration_hours)
                VALUES ($1, 'admin', $2, 'System Administrator', 'admin', TRUE, 8)
            "#)
            .bind(Uuid::new_v4())
            .bind(password_hash)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

            tracing::info!("Created default admin account");
        }

        Ok(())
    }

    // ========== 用户相关操作 ==========

    /// 创建新用户
    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbUser>(r#"
            INSERT INTO users (id, username, password_hash, full_name, role, session_duration_hours)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
        "#)
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(user.session_duration_hours)
        .fetch_one(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(User::from(row))
    }

    /// 根据ID查找用户
    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(result.map(User::from))
    }

    /// 根据用户名查找用户原始行（认证路径，含密码哈希）
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<DbUser>> {
        let pool = self.pool.pool();

        sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))
    }

    /// 获取所有用户
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbUser>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// 获取所有医生（按姓名排序）
    pub async fn list_doctors(&self) -> Result<Vec<User>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbUser>(
            "SELECT * FROM users WHERE role = 'doctor' ORDER BY full_name"
        )
        .fetch_all(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// 更新用户（仅更新提供的字段）
    pub async fn update_user(&self, id: Uuid, changes: &UpdateUser) -> Result<Option<User>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbUser>(r#"
            UPDATE users SET
                full_name = COALESCE($2, full_name),
                session_duration_hours = COALESCE($3, session_duration_hours),
                password_hash = COALESCE($4, password_hash)
            WHERE id = $1
            RETURNING *
        "#)
        .bind(id)
        .bind(&changes.full_name)
        .bind(changes.session_duration_hours)
        .bind(&changes.password_hash)
        .fetch_optional(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(row.map(User::from))
    }

    /// 修改密码并清除首次登录标记
    pub async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("UPDATE users SET password_hash = $2, is_first_login = FALSE WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    /// 删除用户
    pub async fn delete_user(&self, id: Uuid) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    // ========== 患者相关操作 ==========

    /// 创建新患者
    pub async fn create_patient(&self, patient: &NewPatient) -> Result<Patient> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbPatient>(r#"
            INSERT INTO patients (id, name, phone, email, date_of_birth, address, medical_history, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
        "#)
        .bind(Uuid::new_v4())
        .bind(&patient.name)
        .bind(&patient.phone)
        .bind(&patient.email)
        .bind(patient.date_of_birth)
        .bind(&patient.address)
        .bind(&patient.medical_history)
        .bind(&patient.notes)
        .fetch_one(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(Patient::from(row))
    }

    /// 根据ID查找患者
    pub async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbPatient>("SELECT * FROM patients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(result.map(Patient::from))
    }

    /// 获取所有患者（最近建档在前）
    pub async fn list_patients(&self) -> Result<Vec<Patient>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients ORDER BY created_at DESC"
        )
        .fetch_all(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Patient::from).collect())
    }

    /// 更新患者（仅更新提供的字段）
    pub async fn update_patient(&self, id: Uuid, changes: &UpdatePatient) -> Result<Option<Patient>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbPatient>(r#"
            UPDATE patients SET
                name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                email = COALESCE($4, email),
                date_of_birth = COALESCE($5, date_of_birth),
                address = COALESCE($6, address),
                medical_history = COALESCE($7, medical_history),
                notes = COALESCE($8, notes)
            WHERE id = $1
            RETURNING *
        "#)
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.phone)
        .bind(&changes.email)
        .bind(changes.date_of_birth)
        .bind(&changes.address)
        .bind(&changes.medical_history)
        .bind(&changes.notes)
        .fetch_optional(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(row.map(Patient::from))
    }

    /// 删除患者及其全部关联记录
    ///
    /// 按顺序逐表删除，不使用事务：中途失败不回滚（领域允许的已知限制）。
    pub async fn delete_patient(&self, id: Uuid) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("DELETE FROM appointments WHERE patient_id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM payments WHERE patient_id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM medical_images WHERE patient_id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        sqlx::query(r#"
            DELETE FROM visit_procedures
            WHERE visit_id IN (SELECT id FROM visits WHERE patient_id = $1)
        "#)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM visits WHERE patient_id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    // ========== 余额计算 ==========

    /// 计算患者应收余额
    ///
    /// 两条独立的标量聚合：就诊项目费用（按当前价格）与累计付款。
    /// 内连接使已删除项目的明细行贡献为0；无就诊/无付款贡献为0。
    pub async fn patient_balance(&self, patient_id: Uuid) -> Result<f64> {
        let pool = self.pool.pool();

        let total_cost = sqlx::query_scalar::<_, f64>(r#"
            SELECT COALESCE(SUM(p.price_jod * vp.quantity), 0.0)
            FROM visits v
            JOIN visit_procedures vp ON v.id = vp.visit_id
            JOIN procedures p ON vp.procedure_id = p.id
            WHERE v.patient_id = $1
        "#)
        .bind(patient_id)
        .fetch_one(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        let total_paid = sqlx::query_scalar::<_, f64>(r#"
            SELECT COALESCE(SUM(amount_jod), 0.0)
            FROM payments
            WHERE patient_id = $1
        "#)
        .bind(patient_id)
        .fetch_one(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(outstanding_balance(total_cost, total_paid))
    }

    // ========== 诊疗项目相关操作 ==========

    /// 创建新诊疗项目
    pub async fn create_procedure(&self, procedure: &NewProcedure) -> Result<Procedure> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbProcedure>(r#"
            INSERT INTO procedures (id, name, price_jod, description)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        "#)
        .bind(Uuid::new_v4())
        .bind(&procedure.name)
        .bind(procedure.price_jod)
        .bind(&procedure.description)
        .fetch_one(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(Procedure::from(row))
    }

    /// 获取所有诊疗项目（按名称排序）
    pub async fn list_procedures(&self) -> Result<Vec<Procedure>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbProcedure>("SELECT * FROM procedures ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Procedure::from).collect())
    }

    /// 更新诊疗项目（改价对既往就诊追溯生效）
    pub async fn update_procedure(
        &self,
        id: Uuid,
        changes: &UpdateProcedure,
    ) -> Result<Option<Procedure>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbProcedure>(r#"
            UPDATE procedures SET
                name = COALESCE($2, name),
                price_jod = COALESCE($3, price_jod),
                description = COALESCE($4, description)
            WHERE id = $1
            RETURNING *
        "#)
        .bind(id)
        .bind(&changes.name)
        .bind(changes.price_jod)
        .bind(&changes.description)
        .fetch_optional(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(row.map(Procedure::from))
    }

    /// 删除诊疗项目（历史就诊的明细行保留为悬挂引用）
    pub async fn delete_procedure(&self, id: Uuid) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("DELETE FROM procedures WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    // ========== 预约相关操作 ==========

    /// 创建新预约
    pub async fn create_appointment(&self, appointment: &NewAppointment) -> Result<Appointment> {
        let pool = self.pool.pool();

        let id = sqlx::query_scalar::<_, Uuid>(r#"
            INSERT INTO appointments (id, patient_id, doctor_id, appointment_date, appointment_time, duration_minutes, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
        "#)
        .bind(Uuid::new_v4())
        .bind(appointment.patient_id)
        .bind(appointment.doctor_id)
        .bind(appointment.appointment_date)
        .bind(appointment.appointment_time)
        .bind(appointment.duration_minutes)
        .bind(&appointment.status)
        .bind(&appointment.notes)
        .fetch_one(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        self.get_appointment(id).await?.ok_or_else(|| {
            ClinicError::Internal("appointment row missing after insert".to_string())
        })
    }

    /// 根据ID查找预约（附带患者/医生姓名）
    pub async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbAppointment>(r#"
            SELECT a.*, p.name AS patient_name, u.full_name AS doctor_name
            FROM appointments a
            JOIN patients p ON a.patient_id = p.id
            JOIN users u ON a.doctor_id = u.id
            WHERE a.id = $1
        "#)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(row.map(Appointment::from))
    }

    /// 按条件获取预约（按日期、时间排序）
    pub async fn list_appointments(
        &self,
        doctor_id: Option<Uuid>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbAppointment>(r#"
            SELECT a.*, p.name AS patient_name, u.full_name AS doctor_name
            FROM appointments a
            JOIN patients p ON a.patient_id = p.id
            JOIN users u ON a.doctor_id = u.id
            WHERE ($1::UUID IS NULL OR a.doctor_id = $1)
              AND ($2::DATE IS NULL OR a.appointment_date = $2)
            ORDER BY a.appointment_date, a.appointment_time
        "#)
        .bind(doctor_id)
        .bind(date)
        .fetch_all(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    /// 更新预约（仅更新提供的字段）
    pub async fn update_appointment(
        &self,
        id: Uuid,
        changes: &UpdateAppointment,
    ) -> Result<Option<Appointment>> {
        let pool = self.pool.pool();

        let updated = sqlx::query(r#"
            UPDATE appointments SET
                appointment_date = COALESCE($2, appointment_date),
                appointment_time = COALESCE($3, appointment_time),
                duration_minutes = COALESCE($4, duration_minutes),
                status = COALESCE($5, status),
                notes = COALESCE($6, notes)
            WHERE id = $1
        "#)
        .bind(id)
        .bind(changes.appointment_date)
        .bind(changes.appointment_time)
        .bind(changes.duration_minutes)
        .bind(&changes.status)
        .bind(&changes.notes)
        .execute(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_appointment(id).await
    }

    /// 删除预约
    pub async fn delete_appointment(&self, id: Uuid) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("DELETE FROM appointments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    // ========== 就诊相关操作 ==========

    /// 创建新就诊及其项目明细，就诊时间取当前时刻
    pub async fn create_visit(&self, visit: &NewVisit) -> Result<Visit> {
        let pool = self.pool.pool();

        let id = sqlx::query_scalar::<_, Uuid>(r#"
            INSERT INTO visits (id, patient_id, doctor_id, status, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        "#)
        .bind(Uuid::new_v4())
        .bind(visit.patient_id)
        .bind(visit.doctor_id)
        .bind(&visit.status)
        .bind(&visit.notes)
        .fetch_one(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        for item in &visit.procedures {
            sqlx::query(r#"
                INSERT INTO visit_procedures (id, visit_id, procedure_id, quantity)
                VALUES ($1, $2, $3, $4)
            "#)
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(item.procedure_id)
            .bind(item.quantity)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;
        }

        self.get_visit(id)
            .await?
            .ok_or_else(|| ClinicError::Internal("visit row missing after insert".to_string()))
    }

    /// 根据ID查找就诊（附带姓名与项目明细）
    pub async fn get_visit(&self, id: Uuid) -> Result<Option<Visit>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbVisit>(r#"
            SELECT v.*, p.name AS patient_name, u.full_name AS doctor_name
            FROM visits v
            JOIN patients p ON v.patient_id = p.id
            JOIN users u ON v.doctor_id = u.id
            WHERE v.id = $1
        "#)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        match row {
            Some(visit) => {
                let items = self.visit_items(visit.id).await?;
                Ok(Some(visit.into_visit(items)))
            }
            None => Ok(None),
        }
    }

    /// 获取就诊的项目明细（按当前价格；已删除项目被内连接跳过）
    async fn visit_items(&self, visit_id: Uuid) -> Result<Vec<VisitProcedure>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbVisitProcedure>(r#"
            SELECT pr.id, pr.name, pr.price_jod, vp.quantity
            FROM visit_procedures vp
            JOIN procedures pr ON vp.procedure_id = pr.id
            WHERE vp.visit_id = $1
        "#)
        .bind(visit_id)
        .fetch_all(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(VisitProcedure::from).collect())
    }

    /// 按条件获取就诊（最近在前）
    pub async fn list_visits(&self, patient_id: Option<Uuid>) -> Result<Vec<Visit>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbVisit>(r#"
            SELECT v.*, p.name AS patient_name, u.full_name AS doctor_name
            FROM visits v
            JOIN patients p ON v.patient_id = p.id
            JOIN users u ON v.doctor_id = u.id
            WHERE ($1::UUID IS NULL OR v.patient_id = $1)
            ORDER BY v.visit_date DESC
        "#)
        .bind(patient_id)
        .fetch_all(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        let mut visits = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.visit_items(row.id).await?;
            visits.push(row.into_visit(items));
        }

        Ok(visits)
    }

    /// 更新就诊（仅状态与备注）
    pub async fn update_visit(&self, id: Uuid, changes: &UpdateVisit) -> Result<Option<Visit>> {
        let pool = self.pool.pool();

        let updated = sqlx::query(r#"
            UPDATE visits SET
                status = COALESCE($2, status),
                notes = COALESCE($3, notes)
            WHERE id = $1
        "#)
        .bind(id)
        .bind(&changes.status)
        .bind(&changes.notes)
        .execute(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_visit(id).await
    }

    // ========== 付款相关操作 ==========

    /// 记录付款，付款时间取当前时刻
    pub async fn create_payment(&self, payment: &NewPayment, recorded_by: Uuid) -> Result<Payment> {
        let pool = self.pool.pool();

        let id = sqlx::query_scalar::<_, Uuid>(r#"
            INSERT INTO payments (id, patient_id, amount_jod, recorded_by, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        "#)
        .bind(Uuid::new_v4())
        .bind(payment.patient_id)
        .bind(payment.amount_jod)
        .bind(recorded_by)
        .bind(&payment.notes)
        .fetch_one(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        self.get_payment(id)
            .await?
            .ok_or_else(|| ClinicError::Internal("payment row missing after insert".to_string()))
    }

    /// 根据ID查找付款（附带患者/经手人姓名）
    pub async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbPayment>(r#"
            SELECT pm.*, p.name AS patient_name, u.full_name AS recorded_by_name
            FROM payments pm
            JOIN patients p ON pm.patient_id = p.id
            JOIN users u ON pm.recorded_by = u.id
            WHERE pm.id = $1
        "#)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(row.map(Payment::from))
    }

    /// 按条件获取付款（最近在前）
    pub async fn list_payments(&self, patient_id: Option<Uuid>) -> Result<Vec<Payment>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbPayment>(r#"
            SELECT pm.*, p.name AS patient_name, u.full_name AS recorded_by_name
            FROM payments pm
            JOIN patients p ON pm.patient_id = p.id
            JOIN users u ON pm.recorded_by = u.id
            WHERE ($1::UUID IS NULL OR pm.patient_id = $1)
            ORDER BY pm.payment_date DESC
        "#)
        .bind(patient_id)
        .fetch_all(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Payment::from).collect())
    }

    // ========== 影像相关操作 ==========

    /// 创建影像记录（文件已先行写入存储）
    pub async fn create_image(&self, image: &NewImage) -> Result<Uuid> {
        let pool = self.pool.pool();

        sqlx::query_scalar::<_, Uuid>(r#"
            INSERT INTO medical_images (id, patient_id, uploaded_by, image_path, image_type, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
        "#)
        .bind(Uuid::new_v4())
        .bind(image.patient_id)
        .bind(image.uploaded_by)
        .bind(&image.image_path)
        .bind(&image.image_type)
        .bind(&image.description)
        .fetch_one(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))
    }

    /// 根据ID查找影像原始行（不联查，供下载与删除）
    pub async fn get_image_row(&self, id: Uuid) -> Result<Option<DbImageRow>> {
        let pool = self.pool.pool();

        sqlx::query_as::<_, DbImageRow>("SELECT * FROM medical_images WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))
    }

    /// 获取患者的全部影像（最近上传在前）
    pub async fn list_patient_images(&self, patient_id: Uuid) -> Result<Vec<MedicalImage>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbMedicalImage>(r#"
            SELECT mi.*, p.name AS patient_name, u.full_name AS uploaded_by_name
            FROM medical_images mi
            JOIN patients p ON mi.patient_id = p.id
            JOIN users u ON mi.uploaded_by = u.id
            WHERE mi.patient_id = $1
            ORDER BY mi.upload_date DESC
        "#)
        .bind(patient_id)
        .fetch_all(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(MedicalImage::from).collect())
    }

    /// 删除影像记录
    pub async fn delete_image(&self, id: Uuid) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("DELETE FROM medical_images WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }
}
