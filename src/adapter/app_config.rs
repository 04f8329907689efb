use crate::domain::model::TenantId;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

/// 設定ファイルの既定パス（拡張子なし、存在しなくてもよい）
pub const DEFAULT_CONFIG_FILE: &str = "config/inventory";

/// アプリケーション設定
/// 既定値 → 設定ファイル → 環境変数（`INVENTORY_` 接頭辞、`__` で入れ子）の順に上書きする
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tenants: TenantsConfig,
}

/// HTTPサーバー設定
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// データベース接続設定を管理する構造体
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
}

/// テナント設定
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantsConfig {
    /// 契約が停止されているテナント
    #[serde(default)]
    pub suspended: Vec<TenantId>,
}

/// 設定エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl AppConfig {
    /// 既定の設定ファイルと環境変数から設定を読み取る
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_sources(Some(DEFAULT_CONFIG_FILE), None)
    }

    /// 設定ソースを指定して設定を読み取る
    ///
    /// # Arguments
    /// * `file` - 設定ファイルのパス（存在しなくてもよい）
    /// * `toml` - TOML文字列の設定（ファイルの後に適用）
    pub fn from_sources(file: Option<&str>, toml: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.host", "localhost")?
            .set_default("database.port", 3306)?
            .set_default("database.database", "fieldservice_db")?
            .set_default("database.username", "fieldservice_user")?
            .set_default("database.password", "fieldservice_password")?
            .set_default("database.max_connections", 10)?;

        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        if let Some(content) = toml {
            builder = builder.add_source(File::from_str(content, FileFormat::Toml));
        }

        let config: AppConfig = builder
            .add_source(
                Environment::with_prefix("INVENTORY")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("tenants.suspended")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "database.max_connections must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// サーバーの待ち受けアドレス
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl DatabaseConfig {
    /// MySQL接続文字列を生成
    pub fn connection_string(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}
