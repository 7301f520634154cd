pub mod addresses;
pub mod carts;
pub mod delivery;
pub mod order_status;
pub mod orders;
pub mod variants;

pub use addresses::AddressService;
pub use carts::CartService;
pub use order_status::{OrderStatus, OrderStatusService};
pub use orders::OrderService;
