pub mod cart;
pub mod cart_item;
pub mod feedback;
pub mod offer;
pub mod order;
pub mod order_item;
pub mod otp_code;
pub mod product;
pub mod product_variant;
pub mod user;
pub mod user_address;
pub mod wishlist_item;

// Re-export entities
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use feedback::{Entity as Feedback, Model as FeedbackModel};
pub use offer::{Entity as Offer, Model as OfferModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentStatus, ShippingMethod};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use otp_code::{Entity as OtpCode, Model as OtpCodeModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_variant::{Entity as ProductVariant, Model as ProductVariantModel};
pub use user::{Entity as User, Model as UserModel, UserRole};
pub use user_address::{AddressType, Entity as UserAddress, Model as UserAddressModel};
pub use wishlist_item::{Entity as WishlistItem, Model as WishlistItemModel};
