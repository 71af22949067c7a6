use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, ModelTrait, QueryOrder,
    QuerySelect,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    category, product, rating, Category, CategoryModel, Product, ProductModel, Rating,
};
use crate::errors::ServiceError;
use crate::storage::ImageStore;

const DEFAULT_CURRENCY: &str = "₱";

/// Catalog service covering categories and products.
#[derive(Clone)]
pub struct CatalogService {
    db: DbPool,
    images: ImageStore,
}

/// Category row with how many products it holds.
#[derive(Debug, Serialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: CategoryModel,
    pub products_count: u64,
}

#[derive(Debug, Serialize)]
pub struct CategoryWithProducts {
    #[serde(flatten)]
    pub category: CategoryModel,
    pub products: Vec<ProductModel>,
}

#[derive(Debug, Serialize)]
pub struct ProductWithCategory {
    #[serde(flatten)]
    pub product: ProductModel,
    pub category: Option<CategoryModel>,
}

/// Flattened listing shape: the category collapses to its name and the
/// rating aggregate is computed per request, rounded to one decimal.
#[derive(Debug, Serialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub rating: Decimal,
    pub review_count: u64,
    pub stock_quantity: i32,
    pub image_filename: Option<String>,
    pub is_available: bool,
    pub category: String,
}

#[derive(Clone, Debug)]
pub struct CreateProductInput {
    pub category_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: Option<String>,
    pub stock_quantity: i32,
    pub image_filename: Option<String>,
    pub is_available: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct UpdateProductInput {
    pub category_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub stock_quantity: Option<i32>,
    pub image_filename: Option<String>,
    pub is_available: Option<bool>,
}

impl CatalogService {
    pub fn new(db: DbPool, images: ImageStore) -> Self {
        Self { db, images }
    }

    // --- categories ---

    pub async fn list_categories(&self) -> Result<Vec<CategoryWithCount>, ServiceError> {
        let categories = Category::find()
            .order_by_asc(category::Column::Id)
            .all(&self.db)
            .await?;

        let counts: Vec<(Option<i64>, i64)> = Product::find()
            .select_only()
            .column(product::Column::CategoryId)
            .column_as(product::Column::Id.count(), "count")
            .group_by(product::Column::CategoryId)
            .into_tuple()
            .all(&self.db)
            .await?;
        let counts: HashMap<i64, u64> = counts
            .into_iter()
            .filter_map(|(id, count)| id.map(|id| (id, count as u64)))
            .collect();

        Ok(categories
            .into_iter()
            .map(|c| {
                let products_count = counts.get(&c.id).copied().unwrap_or(0);
                CategoryWithCount {
                    category: c,
                    products_count,
                }
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn create_category(&self, name: String) -> Result<CategoryModel, ServiceError> {
        let now = Utc::now();
        let model = category::ActiveModel {
            category_name: Set(name),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let created = model.insert(&self.db).await?;
        info!(category_id = created.id, "created category");
        Ok(created)
    }

    pub async fn get_category(&self, id: i64) -> Result<CategoryWithProducts, ServiceError> {
        let found = self.find_category(id).await?;
        let products = found.find_related(Product).all(&self.db).await?;
        Ok(CategoryWithProducts {
            category: found,
            products,
        })
    }

    #[instrument(skip(self))]
    pub async fn update_category(
        &self,
        id: i64,
        name: String,
    ) -> Result<CategoryModel, ServiceError> {
        let found = self.find_category(id).await?;
        let mut active: category::ActiveModel = found.into();
        active.category_name = Set(name);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: i64) -> Result<(), ServiceError> {
        let found = self.find_category(id).await?;
        found.delete(&self.db).await?;
        info!(category_id = id, "deleted category");
        Ok(())
    }

    async fn find_category(&self, id: i64) -> Result<CategoryModel, ServiceError> {
        Category::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Category not found".to_string()))
    }

    // --- products ---

    pub async fn list_products(&self) -> Result<Vec<ProductSummary>, ServiceError> {
        let products = Product::find()
            .find_also_related(Category)
            .order_by_asc(product::Column::CreatedAt)
            .all(&self.db)
            .await?;

        // Per-product (sum, count) of ratings, aggregated over one scan
        let scores: Vec<(Uuid, i32)> = Rating::find()
            .select_only()
            .column(rating::Column::ProductId)
            .column(rating::Column::Rating)
            .into_tuple()
            .all(&self.db)
            .await?;
        let mut totals: HashMap<Uuid, (i64, u64)> = HashMap::new();
        for (product_id, score) in scores {
            let entry = totals.entry(product_id).or_insert((0, 0));
            entry.0 += i64::from(score);
            entry.1 += 1;
        }

        Ok(products
            .into_iter()
            .map(|(p, c)| {
                let (rating, review_count) = match totals.get(&p.id) {
                    Some(&(sum, count)) if count > 0 => {
                        (average(sum, count, 1), count)
                    }
                    _ => (Decimal::ZERO, 0),
                };
                ProductSummary {
                    id: p.id,
                    name: p.name,
                    description: p.description,
                    price: p.price,
                    currency: p.currency,
                    rating,
                    review_count,
                    stock_quantity: p.stock_quantity,
                    image_filename: p.image_filename,
                    is_available: p.is_available,
                    category: c
                        .map(|c| c.category_name)
                        .unwrap_or_else(|| "Uncategorized".to_string()),
                }
            })
            .collect())
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductWithCategory, ServiceError> {
        self.ensure_category_exists(input.category_id).await?;
        ensure_non_negative_price(input.price)?;
        ensure_non_negative_stock(input.stock_quantity)?;

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            category_id: Set(Some(input.category_id)),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            currency: Set(input
                .currency
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())),
            stock_quantity: Set(input.stock_quantity),
            image_filename: Set(input.image_filename),
            is_available: Set(input.is_available.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&self.db).await?;
        info!(product_id = %created.id, "created product");
        self.get_product(created.id).await
    }

    pub async fn get_product(&self, id: Uuid) -> Result<ProductWithCategory, ServiceError> {
        let found = self.find_product(id).await?;
        let cat = match found.category_id {
            Some(category_id) => Category::find_by_id(category_id).one(&self.db).await?,
            None => None,
        };
        Ok(ProductWithCategory {
            product: found,
            category: cat,
        })
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductWithCategory, ServiceError> {
        let found = self.find_product(id).await?;
        let old_image = found.image_filename.clone();

        if let Some(category_id) = input.category_id {
            self.ensure_category_exists(category_id).await?;
        }
        if let Some(price) = input.price {
            ensure_non_negative_price(price)?;
        }
        if let Some(stock) = input.stock_quantity {
            ensure_non_negative_stock(stock)?;
        }

        let mut active: product::ActiveModel = found.into();
        if let Some(category_id) = input.category_id {
            active.category_id = Set(Some(category_id));
        }
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(currency) = input.currency {
            active.currency = Set(currency);
        }
        if let Some(stock) = input.stock_quantity {
            active.stock_quantity = Set(stock);
        }
        let image_replaced = input.image_filename.is_some();
        if let Some(filename) = input.image_filename {
            active.image_filename = Set(Some(filename));
        }
        if let Some(is_available) = input.is_available {
            active.is_available = Set(is_available);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&self.db).await?;

        if image_replaced {
            if let Some(old) = old_image {
                self.images.delete(&old).await;
            }
        }

        info!(product_id = %updated.id, "updated product");
        self.get_product(updated.id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let found = self.find_product(id).await?;
        let image = found.image_filename.clone();
        found.delete(&self.db).await?;
        if let Some(filename) = image {
            self.images.delete(&filename).await;
        }
        info!(product_id = %id, "deleted product");
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    async fn ensure_category_exists(&self, id: i64) -> Result<(), ServiceError> {
        if Category::find_by_id(id).one(&self.db).await?.is_none() {
            return Err(ServiceError::validation(
                "category_id",
                "The selected category id is invalid.",
            ));
        }
        Ok(())
    }
}

/// Mean of `sum` over `count`, rounded away from zero at `dp` decimals.
pub(crate) fn average(sum: i64, count: u64, dp: u32) -> Decimal {
    (Decimal::from(sum) / Decimal::from(count))
        .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

fn ensure_non_negative_price(price: Decimal) -> Result<(), ServiceError> {
    if price < Decimal::ZERO {
        return Err(ServiceError::validation(
            "price",
            "The price must be at least 0.",
        ));
    }
    Ok(())
}

fn ensure_non_negative_stock(stock: i32) -> Result<(), ServiceError> {
    if stock < 0 {
        return Err(ServiceError::validation(
            "stock_quantity",
            "The stock quantity must be at least 0.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_rounds_away_from_zero() {
        use rust_decimal_macros::dec;

        // 4.25 at one decimal goes up, not to even
        assert_eq!(average(17, 4, 1), dec!(4.3));
        assert_eq!(average(5, 1, 2), dec!(5));
        assert_eq!(average(7, 2, 2), dec!(3.5));
        assert_eq!(average(11, 3, 2), dec!(3.67));
    }
}
