//! Aggregates module
pub mod cart;
pub mod notification;
pub mod order;
pub mod product;
pub mod review;
pub mod ticket;
pub mod user;

pub use cart::{CartLine, CartView};
pub use notification::{LowStockPolicy, NotificationKind, PreviousAlert, StockAlertDecision};
pub use order::{OrderDraft, OrderLine, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus, RequestedItem, ShippingPolicy};
pub use product::{Pricing, StockAdjustment};
pub use review::{Rating, RatingSummary};
pub use ticket::{TicketCategory, TicketPriority, TicketStatus};
pub use user::Role;
