pub mod carts;
pub mod catalog;
pub mod feedback;
pub mod offers;
pub mod orders;
pub mod payments;
pub mod stock;
pub mod users;
pub mod wishlists;

pub use carts::CartService;
pub use catalog::CatalogService;
pub use feedback::FeedbackService;
pub use offers::OfferService;
pub use orders::OrderService;
pub use payments::{PaymentOutcome, PaymentProvider, StripeCheckout, UnconfiguredProvider};
pub use stock::StockService;
pub use users::{HttpSms, LoggingSms, SmsSender, UserService};
pub use wishlists::WishlistService;
