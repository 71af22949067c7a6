use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, EntityTrait, QueryOrder,
};
use tracing::{info, instrument};

use crate::db::DbPool;
use crate::entities::{discount, Discount, DiscountModel};
use crate::errors::{is_unique_violation, ServiceError};

/// Discount code management. Codes are unique; the value is a
/// percentage in [0, 100] and the expiration date may not be in the
/// past when written.
#[derive(Clone)]
pub struct DiscountService {
    db: DbPool,
}

#[derive(Clone, Debug)]
pub struct CreateDiscountInput {
    pub discount_code: String,
    pub value: Decimal,
    pub expiration_date: NaiveDate,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct UpdateDiscountInput {
    pub discount_code: Option<String>,
    pub value: Option<Decimal>,
    pub expiration_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

impl DiscountService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<DiscountModel>, ServiceError> {
        Ok(Discount::find()
            .order_by_asc(discount::Column::Id)
            .all(&self.db)
            .await?)
    }

    #[instrument(skip(self, input), fields(code = %input.discount_code))]
    pub async fn create(&self, input: CreateDiscountInput) -> Result<DiscountModel, ServiceError> {
        ensure_percentage(input.value)?;
        ensure_not_expired(input.expiration_date)?;

        let now = Utc::now();
        let model = discount::ActiveModel {
            discount_code: Set(input.discount_code),
            value: Set(input.value),
            expiration_date: Set(input.expiration_date),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let created = model.insert(&self.db).await.map_err(remap_duplicate_code)?;
        info!(discount_id = created.id, "created discount");
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<DiscountModel, ServiceError> {
        self.find(id).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i64,
        input: UpdateDiscountInput,
    ) -> Result<DiscountModel, ServiceError> {
        let found = self.find(id).await?;

        if let Some(value) = input.value {
            ensure_percentage(value)?;
        }
        if let Some(expiration_date) = input.expiration_date {
            ensure_not_expired(expiration_date)?;
        }

        let mut active: discount::ActiveModel = found.into();
        if let Some(code) = input.discount_code {
            active.discount_code = Set(code);
        }
        if let Some(value) = input.value {
            active.value = Set(value);
        }
        if let Some(expiration_date) = input.expiration_date {
            active.expiration_date = Set(expiration_date);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&self.db).await.map_err(remap_duplicate_code)?;
        info!(discount_id = updated.id, "updated discount");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let found = self.find(id).await?;
        Discount::delete_by_id(found.id).exec(&self.db).await?;
        info!(discount_id = id, "deleted discount");
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<DiscountModel, ServiceError> {
        Discount::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Discount not found".to_string()))
    }
}

fn ensure_percentage(value: Decimal) -> Result<(), ServiceError> {
    if value < Decimal::ZERO || value > Decimal::from(100) {
        return Err(ServiceError::validation(
            "value",
            "The value must be between 0 and 100.",
        ));
    }
    Ok(())
}

fn ensure_not_expired(date: NaiveDate) -> Result<(), ServiceError> {
    if date < Utc::now().date_naive() {
        return Err(ServiceError::validation(
            "expiration_date",
            "The expiration date must be a date after or equal to today.",
        ));
    }
    Ok(())
}

fn remap_duplicate_code(err: sea_orm::DbErr) -> ServiceError {
    if is_unique_violation(&err) {
        ServiceError::conflict(
            "The given data was invalid.",
            "discount_code",
            "The discount code has already been taken.",
        )
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn percentage_bounds() {
        assert!(ensure_percentage(dec!(0)).is_ok());
        assert!(ensure_percentage(dec!(100)).is_ok());
        assert!(ensure_percentage(dec!(-0.01)).is_err());
        assert!(ensure_percentage(dec!(100.5)).is_err());
    }

    #[test]
    fn expiration_accepts_today_and_later() {
        let today = Utc::now().date_naive();
        assert!(ensure_not_expired(today).is_ok());
        assert!(ensure_not_expired(today + chrono::Days::new(1)).is_ok());
        assert!(ensure_not_expired(today - chrono::Days::new(1)).is_err());
    }
}
