use crate::domain::error::DomainError;
use crate::domain::model::{ItemId, RateType, TenantId};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// 品目マスタの単価の小数桁数
pub const RATE_SCALE: u32 = 4;

/// 品目登録用の入力値
#[derive(Debug, Clone)]
pub struct NewItem {
    pub code: String,
    pub name: String,
    pub unit_of_measure: String,
    pub rate: Decimal,
    pub rate_type: RateType,
    pub tax_percent: Decimal,
}

/// 品目エンティティ
/// 単価の意味は原価計算方式に依存し、AVGの場合は入荷のたびに再計算される
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    tenant_id: TenantId,
    id: ItemId,
    code: String,
    name: String,
    unit_of_measure: String,
    rate: Decimal,
    rate_type: RateType,
    tax_percent: Decimal,
}

impl Item {
    /// 新しい品目を作成
    /// バリデーション:
    /// - コードと単位は空でない必要がある
    /// - 単価は0以上である必要がある
    /// - 税率は0から100の範囲である必要がある
    pub fn new(tenant_id: TenantId, id: ItemId, input: NewItem) -> Result<Self, DomainError> {
        if input.code.trim().is_empty() {
            return Err(DomainError::InvalidValue(
                "品目コードは空にできません".to_string(),
            ));
        }
        if input.unit_of_measure.trim().is_empty() {
            return Err(DomainError::InvalidValue("単位は空にできません".to_string()));
        }
        if input.rate < Decimal::ZERO {
            return Err(DomainError::InvalidValue(format!(
                "単価は0以上である必要があります: {}",
                input.rate
            )));
        }
        if input.tax_percent < Decimal::ZERO || input.tax_percent > Decimal::ONE_HUNDRED {
            return Err(DomainError::InvalidValue(format!(
                "税率は0から100の範囲である必要があります: {}",
                input.tax_percent
            )));
        }

        Ok(Self {
            tenant_id,
            id,
            code: input.code.trim().to_string(),
            name: input.name,
            unit_of_measure: input.unit_of_measure,
            rate: input.rate.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero),
            rate_type: input.rate_type,
            tax_percent: input.tax_percent,
        })
    }

    /// データベースから取得したデータで品目を再構築
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        tenant_id: TenantId,
        id: ItemId,
        code: String,
        name: String,
        unit_of_measure: String,
        rate: Decimal,
        rate_type: RateType,
        tax_percent: Decimal,
    ) -> Self {
        Self {
            tenant_id,
            id,
            code,
            name,
            unit_of_measure,
            rate,
            rate_type,
            tax_percent,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_of_measure(&self) -> &str {
        &self.unit_of_measure
    }

    /// 現在の単価を取得
    pub fn rate(&self) -> Decimal {
        self.rate
    }

    pub fn rate_type(&self) -> RateType {
        self.rate_type
    }

    pub fn tax_percent(&self) -> Decimal {
        self.tax_percent
    }

    /// 入荷原価を単価に反映する
    /// AVGの場合のみ移動加重平均で単価を再計算し、STANDARDの場合は何もしない
    ///
    /// # Arguments
    /// * `on_hand_before` - 入荷前の手持ち数量
    /// * `received` - 入荷数量
    /// * `unit_cost` - 入荷単価
    ///
    /// # Returns
    /// * `true` - 単価が更新された
    /// * `false` - 単価は変更されない
    pub fn apply_receipt_cost(
        &mut self,
        on_hand_before: Decimal,
        received: Decimal,
        unit_cost: Decimal,
    ) -> bool {
        if self.rate_type != RateType::Avg {
            return false;
        }
        let Some(average) = rolling_average(self.rate, on_hand_before, unit_cost, received) else {
            return false;
        };
        let changed = average != self.rate;
        self.rate = average;
        changed
    }
}

/// 移動加重平均単価を計算する
/// (旧単価 × 旧数量 + 入荷単価 × 入荷数量) / (旧数量 + 入荷数量) を四捨五入する
///
/// 旧数量が負の場合は0として扱う。合計数量が0以下の場合はNoneを返す
pub fn rolling_average(
    old_rate: Decimal,
    old_quantity: Decimal,
    unit_cost: Decimal,
    received: Decimal,
) -> Option<Decimal> {
    let old_quantity = old_quantity.max(Decimal::ZERO);
    let total_quantity = old_quantity + received;
    if total_quantity <= Decimal::ZERO {
        return None;
    }
    let total_value = old_rate.checked_mul(old_quantity)?
        .checked_add(unit_cost.checked_mul(received)?)?;
    let average = total_value.checked_div(total_quantity)?;
    Some(average.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero))
}
