use rust_decimal::Decimal;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    rating, Order, OrderItem, OrderModel, OrderStatus, Product, ProductModel, Rating, RatingModel,
    User, UserModel,
};
use crate::errors::{is_unique_violation, ServiceError};
use crate::services::catalog::average;

/// Rating service.
///
/// A product may be rated once per account per order, and only once the
/// order is delivered. The predicate is evaluated fresh on every call;
/// the only persisted state is the rating row itself. The non-mutating
/// check and the commit share [`RatingService::eligibility`] so the two
/// can never drift.
#[derive(Clone)]
pub struct RatingService {
    db: DbPool,
}

/// Outcome of the eligibility predicate, ordered: the first failing
/// clause wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    NotOwner,
    NotDelivered,
    NotPurchased,
    AlreadyRated { rating: i32 },
}

/// Hydrated rating for responses.
#[derive(Debug, Serialize)]
pub struct RatingView {
    #[serde(flatten)]
    pub rating: RatingModel,
    pub user: Option<UserModel>,
    pub product: Option<ProductModel>,
    pub order: Option<OrderModel>,
}

/// Payload of the read-only eligibility probe. Always 200; the outcome
/// is in the body so a client can pre-render its rating UI.
#[derive(Debug, Serialize)]
pub struct RatingCheck {
    pub can_rate: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_rated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ProductRatings {
    pub product_id: Uuid,
    pub average_rating: Decimal,
    pub ratings_count: u64,
    pub breakdown: RatingBreakdown,
}

/// Count of ratings per star, five down to one.
#[derive(Debug, Default, Serialize)]
pub struct RatingBreakdown {
    #[serde(rename = "5")]
    pub five: u64,
    #[serde(rename = "4")]
    pub four: u64,
    #[serde(rename = "3")]
    pub three: u64,
    #[serde(rename = "2")]
    pub two: u64,
    #[serde(rename = "1")]
    pub one: u64,
}

impl RatingService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Runs the eligibility chain for (user, order, product). A missing
    /// order or product is a validation error; every later clause is a
    /// structured outcome.
    pub async fn eligibility(
        &self,
        user_id: Uuid,
        order_id: i64,
        product_id: Uuid,
    ) -> Result<Eligibility, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::validation("order_id", "The selected order id is invalid.")
            })?;

        if Product::find_by_id(product_id)
            .one(&self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::validation(
                "product_id",
                "The selected product id is invalid.",
            ));
        }

        if order.user_id != user_id {
            return Ok(Eligibility::NotOwner);
        }
        if order.status != OrderStatus::Delivered {
            return Ok(Eligibility::NotDelivered);
        }

        let purchased = OrderItem::find()
            .filter(crate::entities::order_item::Column::OrderId.eq(order_id))
            .filter(crate::entities::order_item::Column::ProductId.eq(product_id))
            .one(&self.db)
            .await?
            .is_some();
        if !purchased {
            return Ok(Eligibility::NotPurchased);
        }

        let existing = Rating::find()
            .filter(rating::Column::UserId.eq(user_id))
            .filter(rating::Column::ProductId.eq(product_id))
            .filter(rating::Column::OrderId.eq(order_id))
            .one(&self.db)
            .await?;
        if let Some(existing) = existing {
            return Ok(Eligibility::AlreadyRated {
                rating: existing.rating,
            });
        }

        Ok(Eligibility::Eligible)
    }

    /// Commits a rating once the eligibility chain passes. The unique
    /// index on (user, product, order) closes the check-then-act race:
    /// a concurrent duplicate surfaces as the same rejection, not a
    /// server error.
    #[instrument(skip(self))]
    pub async fn rate(
        &self,
        user_id: Uuid,
        order_id: i64,
        product_id: Uuid,
        score: i32,
    ) -> Result<RatingView, ServiceError> {
        match self.eligibility(user_id, order_id, product_id).await? {
            Eligibility::NotOwner => {
                return Err(ServiceError::forbidden(
                    "Unauthorized. This order does not belong to you.",
                ));
            }
            Eligibility::NotDelivered => {
                return Err(ServiceError::rejected(
                    "You can only rate products from delivered orders.",
                    "order_id",
                    "Order must be delivered before rating.",
                ));
            }
            Eligibility::NotPurchased => {
                return Err(ServiceError::rejected(
                    "This product was not purchased in this order.",
                    "product_id",
                    "Product not found in order.",
                ));
            }
            Eligibility::AlreadyRated { .. } => {
                return Err(duplicate_rating());
            }
            Eligibility::Eligible => {}
        }

        let now = Utc::now();
        let model = rating::ActiveModel {
            user_id: Set(user_id),
            product_id: Set(product_id),
            order_id: Set(order_id),
            rating: Set(score),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let created = model.insert(&self.db).await.map_err(|err| {
            if is_unique_violation(&err) {
                duplicate_rating()
            } else {
                err.into()
            }
        })?;

        info!(rating_id = created.id, %user_id, order_id, "created rating");
        self.hydrate(created).await
    }

    /// The read-only twin of [`RatingService::rate`].
    pub async fn check(
        &self,
        user_id: Uuid,
        order_id: i64,
        product_id: Uuid,
    ) -> Result<RatingCheck, ServiceError> {
        let outcome = self.eligibility(user_id, order_id, product_id).await?;
        Ok(match outcome {
            Eligibility::NotOwner => {
                RatingCheck::cannot("This order does not belong to you.")
            }
            Eligibility::NotDelivered => {
                RatingCheck::cannot("Order must be delivered before rating.")
            }
            Eligibility::NotPurchased => RatingCheck::cannot("Product not found in order."),
            Eligibility::AlreadyRated { rating } => RatingCheck {
                can_rate: false,
                message: "You have already rated this product from this order.".to_string(),
                already_rated: Some(true),
                rating: Some(rating),
            },
            Eligibility::Eligible => RatingCheck {
                can_rate: true,
                message: "Product can be rated.".to_string(),
                already_rated: None,
                rating: None,
            },
        })
    }

    /// Aggregate view for a product: average over all ratings (two
    /// decimals, zero when there are none) plus a per-star breakdown.
    pub async fn product_ratings(&self, product_id: Uuid) -> Result<ProductRatings, ServiceError> {
        if Product::find_by_id(product_id)
            .one(&self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::NotFound("Product not found".to_string()));
        }

        let scores: Vec<i32> = Rating::find()
            .select_only()
            .column(rating::Column::Rating)
            .filter(rating::Column::ProductId.eq(product_id))
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut breakdown = RatingBreakdown::default();
        let mut sum: i64 = 0;
        for score in &scores {
            sum += i64::from(*score);
            match score {
                5 => breakdown.five += 1,
                4 => breakdown.four += 1,
                3 => breakdown.three += 1,
                2 => breakdown.two += 1,
                _ => breakdown.one += 1,
            }
        }

        let count = scores.len() as u64;
        let average_rating = if count == 0 {
            Decimal::ZERO
        } else {
            average(sum, count, 2)
        };

        Ok(ProductRatings {
            product_id,
            average_rating,
            ratings_count: count,
            breakdown,
        })
    }

    /// All ratings, newest first, hydrated for the admin listing.
    pub async fn list_all(&self) -> Result<Vec<RatingView>, ServiceError> {
        let ratings = Rating::find()
            .order_by_desc(rating::Column::CreatedAt)
            .all(&self.db)
            .await?;

        let mut views = Vec::with_capacity(ratings.len());
        for r in ratings {
            views.push(self.hydrate(r).await?);
        }
        Ok(views)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let found = Rating::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Rating not found".to_string()))?;
        Rating::delete_by_id(found.id).exec(&self.db).await?;
        info!(rating_id = id, "deleted rating");
        Ok(())
    }

    async fn hydrate(&self, model: RatingModel) -> Result<RatingView, ServiceError> {
        let user = User::find_by_id(model.user_id).one(&self.db).await?;
        let product = Product::find_by_id(model.product_id).one(&self.db).await?;
        let order = Order::find_by_id(model.order_id).one(&self.db).await?;
        Ok(RatingView {
            rating: model,
            user,
            product,
            order,
        })
    }
}

impl RatingCheck {
    fn cannot(message: &str) -> Self {
        RatingCheck {
            can_rate: false,
            message: message.to_string(),
            already_rated: None,
            rating: None,
        }
    }
}

fn duplicate_rating() -> ServiceError {
    ServiceError::conflict(
        "You have already rated this product from this order.",
        "rating",
        "Duplicate rating not allowed.",
    )
}
