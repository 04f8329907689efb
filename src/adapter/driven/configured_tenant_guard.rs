use crate::domain::model::TenantId;
use crate::domain::port::{TenantError, TenantGuard};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::RwLock;

/// 設定に基づくテナントガード
/// 停止リストに載っているテナントの操作を拒否する
pub struct ConfiguredTenantGuard {
    suspended: RwLock<HashSet<TenantId>>,
}

impl ConfiguredTenantGuard {
    /// 停止中のテナントを指定してガードを作成
    pub fn new(suspended: impl IntoIterator<Item = TenantId>) -> Self {
        Self {
            suspended: RwLock::new(suspended.into_iter().collect()),
        }
    }

    /// すべてのテナントを許可するガードを作成
    pub fn allow_all() -> Self {
        Self::new(Vec::new())
    }

    /// テナントの契約を停止する
    pub fn suspend(&self, tenant_id: TenantId) {
        if let Ok(mut suspended) = self.suspended.write() {
            suspended.insert(tenant_id);
        }
    }

    /// テナントの契約を再開する
    pub fn reinstate(&self, tenant_id: TenantId) {
        if let Ok(mut suspended) = self.suspended.write() {
            suspended.remove(&tenant_id);
        }
    }
}

#[async_trait]
impl TenantGuard for ConfiguredTenantGuard {
    async fn assert_active(&self, tenant_id: TenantId) -> Result<(), TenantError> {
        let suspended = self
            .suspended
            .read()
            .map(|s| s.contains(&tenant_id))
            .unwrap_or(true);
        if suspended {
            return Err(TenantError::Inactive(tenant_id));
        }
        Ok(())
    }
}
