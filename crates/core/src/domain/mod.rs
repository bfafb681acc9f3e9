pub mod cart;
pub mod order;
pub mod product;

pub use cart::{
    Cart, CartId, CartItem, CartStatus, RecoveryAttempt, SessionEvent, SessionEventKind, SessionId,
};
pub use order::{CustomerId, Order, OrderFilters, OrderId, OrderLine, Purchase};
pub use product::{Product, ProductId, VolumeTier};
