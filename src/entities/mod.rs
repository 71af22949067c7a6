//! Database entities for the storefront domain.

pub mod access_token;
pub mod cart_item;
pub mod category;
pub mod discount;
pub mod order;
pub mod order_item;
pub mod product;
pub mod rating;
pub mod user;

// Re-export entities under their domain names
pub use access_token::{Entity as AccessToken, Model as AccessTokenModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use discount::{Entity as Discount, Model as DiscountModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use rating::{Entity as Rating, Model as RatingModel};
pub use user::{Entity as User, Model as UserModel, UserRole};
