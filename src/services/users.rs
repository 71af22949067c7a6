use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, EntityTrait, ModelTrait, QueryOrder,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::db::DbPool;
use crate::entities::{user, Order, OrderModel, User, UserModel, UserRole};
use crate::errors::{is_unique_violation, ServiceError};
use crate::storage::ImageStore;

/// Account management service.
///
/// Self-service registration always produces a `customer` account: the
/// supplied role is ignored on create and can only be changed through
/// an explicit update.
#[derive(Clone)]
pub struct UserService {
    db: DbPool,
    images: ImageStore,
}

#[derive(Clone, Debug)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub image_filename: Option<String>,
}

/// Account with its order history, for the detail view.
#[derive(Debug, Serialize)]
pub struct UserWithOrders {
    #[serde(flatten)]
    pub user: UserModel,
    pub orders: Vec<OrderModel>,
}

impl UserService {
    pub fn new(db: DbPool, images: ImageStore) -> Self {
        Self { db, images }
    }

    pub async fn list(&self) -> Result<Vec<UserModel>, ServiceError> {
        Ok(User::find()
            .order_by_asc(user::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create(&self, input: CreateUserInput) -> Result<UserModel, ServiceError> {
        let now = Utc::now();
        let account = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            email: Set(input.email),
            password_hash: Set(hash_password(&input.password)?),
            // Registration never grants admin
            role: Set(UserRole::Customer),
            phone: Set(input.phone),
            address: Set(input.address),
            image_filename: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let account = account.insert(&self.db).await.map_err(|err| {
            if is_unique_violation(&err) {
                ServiceError::conflict(
                    "The given data was invalid.",
                    "email",
                    "The email has already been taken.",
                )
            } else {
                err.into()
            }
        })?;

        info!(user_id = %account.id, "created user");
        Ok(account)
    }

    pub async fn get(&self, id: Uuid) -> Result<UserWithOrders, ServiceError> {
        let account = self.find(id).await?;
        let orders = account.find_related(Order).all(&self.db).await?;
        Ok(UserWithOrders {
            user: account,
            orders,
        })
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateUserInput) -> Result<UserModel, ServiceError> {
        let account = self.find(id).await?;
        let old_image = account.image_filename.clone();

        let mut active: user::ActiveModel = account.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(email) = input.email {
            active.email = Set(email);
        }
        if let Some(password) = input.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        if let Some(role) = input.role {
            active.role = Set(role);
        }
        if let Some(phone) = input.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(address) = input.address {
            active.address = Set(Some(address));
        }
        let image_replaced = input.image_filename.is_some();
        if let Some(filename) = input.image_filename {
            active.image_filename = Set(Some(filename));
        }
        active.updated_at = Set(Utc::now());

        let account = active.update(&self.db).await.map_err(|err| {
            if is_unique_violation(&err) {
                ServiceError::conflict(
                    "The given data was invalid.",
                    "email",
                    "The email has already been taken.",
                )
            } else {
                err.into()
            }
        })?;

        // The old file only becomes garbage once the row points elsewhere
        if image_replaced {
            if let Some(old) = old_image {
                self.images.delete(&old).await;
            }
        }

        info!(user_id = %account.id, "updated user");
        Ok(account)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let account = self.find(id).await?;
        let image = account.image_filename.clone();
        account.delete(&self.db).await?;
        if let Some(filename) = image {
            self.images.delete(&filename).await;
        }
        info!(user_id = %id, "deleted user");
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<UserModel, ServiceError> {
        User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }
}
