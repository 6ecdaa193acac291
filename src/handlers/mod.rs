pub mod carts;
pub mod common;
pub mod feedback;
pub mod offers;
pub mod orders;
pub mod products;
pub mod users;
pub mod wishlists;
