//! 数据库错误映射工具
//!
//! 提供统一的 SQLx 错误到 AppError 的转换

use bastion_errors::AppError;

/// 将 SQLx 错误转换为 AppError，区分不同错误类型
pub fn map_sqlx_error(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::RowNotFound => AppError::not_found("Record not found"),
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => map_sqlstate(code.as_ref()).unwrap_or_else(|| {
                AppError::database(format!("Database error ({}): {}", code, db_err))
            }),
            None => AppError::database(db_err.to_string()),
        },
        sqlx::Error::PoolTimedOut => AppError::internal("Database connection pool timeout"),
        sqlx::Error::PoolClosed => AppError::internal("Database connection pool is closed"),
        _ => AppError::database(e.to_string()),
    }
}

/// PostgreSQL 约束违规代码
fn map_sqlstate(code: &str) -> Option<AppError> {
    let err = match code {
        "23505" => AppError::conflict("Duplicate entry violates unique constraint"),
        // 删除仍被引用的记录
        "23503" => AppError::conflict("Record is still referenced"),
        "23514" => AppError::validation("Check constraint violation"),
        "23502" => AppError::validation("Not null constraint violation"),
        "22001" => AppError::validation("String data too long"),
        _ => return None,
    };
    Some(err)
}
