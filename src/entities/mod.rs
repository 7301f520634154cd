pub mod address;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_variant;
pub mod store_status;

pub use address::Entity as Address;
pub use cart_item::Entity as CartItem;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use product::Entity as Product;
pub use product_variant::Entity as ProductVariant;
pub use store_status::Entity as StoreStatus;
