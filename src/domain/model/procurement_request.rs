use crate::domain::error::DomainError;
use crate::domain::model::{ItemId, OriginRef, ProcurementId, ProcurementStatus, TenantId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// 起票前の調達依頼
#[derive(Debug, Clone, PartialEq)]
pub struct NewProcurementRequest {
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub qty: Decimal,
    pub raised_from_work_order_ref: Option<String>,
    pub required_by: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl NewProcurementRequest {
    /// 不足数量から調達依頼を作成
    /// 発生元の参照と期日を引き継ぐ
    ///
    /// # Returns
    /// * `Err(DomainError::InvalidQuantity)` - 不足数量が0以下
    pub fn for_shortage(
        tenant_id: TenantId,
        item_id: ItemId,
        shortage: Decimal,
        origin: Option<&OriginRef>,
    ) -> Result<Self, DomainError> {
        if shortage <= Decimal::ZERO {
            return Err(DomainError::InvalidQuantity(format!(
                "調達数量は正である必要があります: {}",
                shortage
            )));
        }
        Ok(Self {
            tenant_id,
            item_id,
            qty: shortage,
            raised_from_work_order_ref: origin.map(|o| o.reference().to_string()),
            required_by: origin.and_then(OriginRef::due_date),
            created_at: Utc::now(),
        })
    }

    /// 採番済みの調達依頼に変換（初期ステータスはDRAFT）
    pub fn into_request(self, id: ProcurementId) -> ProcurementRequest {
        ProcurementRequest {
            id,
            tenant_id: self.tenant_id,
            item_id: self.item_id,
            qty: self.qty,
            status: ProcurementStatus::Draft,
            raised_from_work_order_ref: self.raised_from_work_order_ref,
            required_by: self.required_by,
            created_at: self.created_at,
        }
    }
}

/// 調達依頼
/// 振替でも解消できなかった在庫不足を表す
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcurementRequest {
    id: ProcurementId,
    tenant_id: TenantId,
    item_id: ItemId,
    qty: Decimal,
    status: ProcurementStatus,
    raised_from_work_order_ref: Option<String>,
    required_by: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl ProcurementRequest {
    /// データベースから取得したデータで調達依頼を再構築
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        id: ProcurementId,
        tenant_id: TenantId,
        item_id: ItemId,
        qty: Decimal,
        status: ProcurementStatus,
        raised_from_work_order_ref: Option<String>,
        required_by: Option<NaiveDate>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            item_id,
            qty,
            status,
            raised_from_work_order_ref,
            required_by,
            created_at,
        }
    }

    pub fn id(&self) -> ProcurementId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// 不足数量を取得
    pub fn qty(&self) -> Decimal {
        self.qty
    }

    pub fn status(&self) -> ProcurementStatus {
        self.status
    }

    pub fn raised_from_work_order_ref(&self) -> Option<&str> {
        self.raised_from_work_order_ref.as_deref()
    }

    pub fn required_by(&self) -> Option<NaiveDate> {
        self.required_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 入荷済みにする
    /// 既に入荷済みの場合は何もしない（冪等）
    ///
    /// # Returns
    /// * `true` - ステータスが変化した
    /// * `false` - 既に入荷済み
    pub fn mark_received(&mut self) -> bool {
        match self.status {
            ProcurementStatus::Draft => {
                self.status = ProcurementStatus::Received;
                true
            }
            ProcurementStatus::Received => false,
        }
    }
}
