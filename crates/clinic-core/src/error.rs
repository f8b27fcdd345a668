//! 错误定义模块

use thiserror::Error;

/// 诊所系统统一错误类型
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("未认证: {0}")]
    NotAuthenticated(String),

    #[error("用户名或密码错误")]
    InvalidCredentials,

    #[error("权限不足: {0}")]
    Forbidden(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("请求无效: {0}")]
    BadRequest(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// 诊所系统统一结果类型
pub type Result<T> = std::result::Result<T, ClinicError>;
