//! Business-logic services. Handlers stay thin; every rule that touches
//! the database lives here.

pub mod cart;
pub mod catalog;
pub mod discounts;
pub mod orders;
pub mod ratings;
pub mod users;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use discounts::DiscountService;
pub use orders::OrderService;
pub use ratings::RatingService;
pub use users::UserService;

use crate::db::DbPool;
use crate::storage::ImageStore;

/// Container for all application services, shared with handlers through
/// the router state.
#[derive(Clone)]
pub struct AppServices {
    pub users: UserService,
    pub catalog: CatalogService,
    pub cart: CartService,
    pub orders: OrderService,
    pub ratings: RatingService,
    pub discounts: DiscountService,
}

impl AppServices {
    pub fn new(db: DbPool, images: ImageStore) -> Self {
        Self {
            users: UserService::new(db.clone(), images.clone()),
            catalog: CatalogService::new(db.clone(), images),
            cart: CartService::new(db.clone()),
            orders: OrderService::new(db.clone()),
            ratings: RatingService::new(db.clone()),
            discounts: DiscountService::new(db),
        }
    }
}
