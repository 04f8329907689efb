use crate::domain::port::RepositoryError;

/// MySQLのロック待ちタイムアウト
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
/// MySQLのデッドロック検出
const ER_LOCK_DEADLOCK: u16 = 1213;

/// データベースエラー型
/// データベース操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseError {
    /// データベース接続エラー
    ConnectionError(String),
    /// SQLクエリエラー
    QueryError(String),
    /// ロック待ちタイムアウトまたはデッドロック
    LockError(String),
    /// マイグレーションエラー
    MigrationError(String),
}

impl std::fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseError::ConnectionError(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::QueryError(msg) => write!(f, "Database query error: {}", msg),
            DatabaseError::LockError(msg) => write!(f, "Database lock error: {}", msg),
            DatabaseError::MigrationError(msg) => write!(f, "Migration error: {}", msg),
        }
    }
}

impl std::error::Error for DatabaseError {}

impl DatabaseError {
    /// MySQLのエラー番号からエラーを分類する
    pub fn from_mysql_code(code: u16, message: String) -> Self {
        match code {
            ER_LOCK_WAIT_TIMEOUT | ER_LOCK_DEADLOCK => DatabaseError::LockError(message),
            _ => DatabaseError::QueryError(message),
        }
    }
}

/// sqlxのエラーを分類する
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                match db_err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
                    Some(mysql_err) => {
                        DatabaseError::from_mysql_code(mysql_err.number(), err.to_string())
                    }
                    None => DatabaseError::QueryError(err.to_string()),
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => DatabaseError::ConnectionError(err.to_string()),
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}

/// DatabaseErrorからRepositoryErrorへの変換
impl From<DatabaseError> for RepositoryError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConnectionError(msg) => RepositoryError::ConnectionFailed(msg),
            DatabaseError::QueryError(msg) => RepositoryError::OperationFailed(msg),
            DatabaseError::LockError(msg) => RepositoryError::Transient(msg),
            DatabaseError::MigrationError(msg) => RepositoryError::OperationFailed(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_errors_are_transient() {
        let deadlock = DatabaseError::from_mysql_code(1213, "Deadlock found".to_string());
        let timeout = DatabaseError::from_mysql_code(1205, "Lock wait timeout".to_string());
        assert!(RepositoryError::from(deadlock).is_transient());
        assert!(RepositoryError::from(timeout).is_transient());
    }

    #[test]
    fn test_other_codes_are_query_errors() {
        let duplicate = DatabaseError::from_mysql_code(1062, "Duplicate entry".to_string());
        assert_eq!(duplicate, DatabaseError::QueryError("Duplicate entry".to_string()));
        assert_eq!(
            RepositoryError::from(duplicate),
            RepositoryError::OperationFailed("Duplicate entry".to_string())
        );
    }

    #[test]
    fn test_pool_timeout_is_connection_error() {
        let err = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DatabaseError::ConnectionError(_)));
    }
}
