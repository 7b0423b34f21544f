//! MedEventa 统一错误类型定义
//!
//! 业务规则失败（校验、资格、前置条件）携带原因码返回给前端；
//! 基础设施失败（数据库、IO）只记录日志并返回通用信息。

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 业务原因码，序列化为大写蛇形字符串供前端区分展示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    TypeInvalid,
    EventNotFound,
    EventNotFinished,
    UserNotFound,
    NotRegistered,
    NoAcceptedCommunication,
    NotCommitteeMember,
    NotOrganizer,
    NotInvited,
    AttestationNotFound,
    FileMissing,
    Forbidden,
    Unauthenticated,
    CodeInvalid,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::TypeInvalid => "TYPE_INVALID",
            ReasonCode::EventNotFound => "EVENT_NOT_FOUND",
            ReasonCode::EventNotFinished => "EVENT_NOT_FINISHED",
            ReasonCode::UserNotFound => "USER_NOT_FOUND",
            ReasonCode::NotRegistered => "NOT_REGISTERED",
            ReasonCode::NoAcceptedCommunication => "NO_ACCEPTED_COMMUNICATION",
            ReasonCode::NotCommitteeMember => "NOT_COMMITTEE_MEMBER",
            ReasonCode::NotOrganizer => "NOT_ORGANIZER",
            ReasonCode::NotInvited => "NOT_INVITED",
            ReasonCode::AttestationNotFound => "ATTESTATION_NOT_FOUND",
            ReasonCode::FileMissing => "FILE_MISSING",
            ReasonCode::Forbidden => "FORBIDDEN",
            ReasonCode::Unauthenticated => "UNAUTHENTICATED",
            ReasonCode::CodeInvalid => "CODE_INVALID",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MedEventa 统一错误类型
#[derive(Error, Debug)]
pub enum MedeventaError {
    /// 请求参数错误 (400)
    #[error("validation failed ({reason}): {message}")]
    Validation { reason: ReasonCode, message: String },

    /// 未认证 (401)
    #[error("unauthenticated: {0}")]
    Unauthorized(String),

    /// 角色或归属不满足 (403)
    #[error("permission denied ({reason}): {message}")]
    Permission { reason: ReasonCode, message: String },

    /// 前置条件不满足，例如活动尚未结束 (403)
    #[error("precondition failed ({reason}): {message}")]
    Precondition { reason: ReasonCode, message: String },

    /// 资源未找到 (404)
    #[error("not found ({reason}): {message}")]
    NotFound { reason: ReasonCode, message: String },

    /// 数据库错误 (500)
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// IO 错误 (500)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 其他内部错误 (500)
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl MedeventaError {
    pub fn validation(reason: ReasonCode, msg: impl Into<String>) -> Self {
        Self::Validation {
            reason,
            message: msg.into(),
        }
    }

    pub fn permission(reason: ReasonCode, msg: impl Into<String>) -> Self {
        Self::Permission {
            reason,
            message: msg.into(),
        }
    }

    pub fn precondition(reason: ReasonCode, msg: impl Into<String>) -> Self {
        Self::Precondition {
            reason,
            message: msg.into(),
        }
    }

    pub fn not_found(reason: ReasonCode, msg: impl Into<String>) -> Self {
        Self::NotFound {
            reason,
            message: msg.into(),
        }
    }

    pub fn invalid_type(raw: &str) -> Self {
        Self::validation(
            ReasonCode::TypeInvalid,
            format!("unknown attestation type {}", raw),
        )
    }

    /// 业务原因码；基础设施错误没有原因码
    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            Self::Validation { reason, .. }
            | Self::Permission { reason, .. }
            | Self::Precondition { reason, .. }
            | Self::NotFound { reason, .. } => Some(*reason),
            Self::Unauthorized(_) => Some(ReasonCode::Unauthenticated),
            Self::Database(_) | Self::Io(_) | Self::Internal(_) => None,
        }
    }

    /// 判断是否为客户端错误（4xx）
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// 判断是否为服务端错误（5xx）
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_) | Self::Internal(_))
    }

    /// 获取 HTTP 状态码
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Unauthorized(_) => 401,
            Self::Permission { .. } | Self::Precondition { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Database(_) | Self::Io(_) | Self::Internal(_) => 500,
        }
    }

    /// 获取 HTTP 状态码（axum 类型）
    #[cfg(feature = "server")]
    pub fn axum_status_code(&self) -> axum::http::StatusCode {
        axum::http::StatusCode::from_u16(self.http_status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// MedEventa Result 类型别名
pub type Result<T> = std::result::Result<T, MedeventaError>;

// ============ 事务错误支持 ============

/// 事务闭包内的业务错误原样返回，连接错误归为数据库错误
impl<T> From<sea_orm::TransactionError<T>> for MedeventaError
where
    T: Into<MedeventaError>,
{
    fn from(err: sea_orm::TransactionError<T>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(db) => Self::Database(db),
            sea_orm::TransactionError::Transaction(inner) => inner.into(),
        }
    }
}

// ============ Axum HTTP 响应支持 ============

#[cfg(feature = "server")]
mod axum_impl {
    use super::*;
    use axum::{
        Json,
        response::{IntoResponse, Response},
    };
    use serde_json::json;

    impl IntoResponse for MedeventaError {
        fn into_response(self) -> Response {
            let status = self.axum_status_code();

            if let Some(reason) = self.reason() {
                // 客户端错误（4xx）- info 级别，通常是正常的业务流程
                tracing::info!(
                    status = status.as_u16(),
                    reason = %reason,
                    error = %self,
                    "Request rejected"
                );
                let body = Json(json!({"error": self.to_string(), "reason": reason}));
                return (status, body).into_response();
            }

            let message = match &self {
                MedeventaError::Database(db_err) => {
                    tracing::error!(
                        status = status.as_u16(),
                        error = %db_err,
                        "Database operation failed"
                    );
                    "database operation failed"
                }
                MedeventaError::Io(io_err) => {
                    tracing::error!(
                        status = status.as_u16(),
                        io_error = %io_err,
                        "IO operation failed"
                    );
                    "file operation failed"
                }
                _ => {
                    tracing::error!(
                        status = status.as_u16(),
                        internal_error = ?self,
                        "Internal server error"
                    );
                    "internal server error"
                }
            };

            let body = Json(json!({"error": message, "details": self.to_string()}));
            (status, body).into_response()
        }
    }
}
