use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{error, instrument};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::entities::{
    cart, cart_item, Cart, CartItem, CartItemModel, CartModel, Product,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Per-user shopping cart.
///
/// Invariant: after every mutation the cart's `total_price` equals the sum
/// of `quantity * unit_price` over its lines. The recomputation happens in
/// the same transaction as the mutation, so readers never observe a stale
/// total.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Fetches the user's cart and its lines, creating an empty cart on
    /// first touch. Lines come back newest-first.
    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn get_cart(
        &self,
        principal: &AuthenticatedUser,
    ) -> Result<(CartModel, Vec<CartItemModel>), ServiceError> {
        let cart = self.get_or_create(principal.id).await?;
        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::Position)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((cart, items))
    }

    async fn get_or_create(&self, user_id: Uuid) -> Result<CartModel, ServiceError> {
        if let Some(existing) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
        {
            return Ok(existing);
        }

        let model = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            total_price: Set(Decimal::ZERO),
            ..Default::default()
        };

        model.insert(self.db.as_ref()).await.map_err(|e| {
            error!("Failed to create cart for user {}: {}", user_id, e);
            ServiceError::DatabaseError(e)
        })
    }

    /// Adds a product to the cart. A line for the same product has its
    /// quantity bumped; a new product becomes the first line. The unit
    /// price is captured from the catalog at add time and never refreshed.
    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn add_item(
        &self,
        principal: &AuthenticatedUser,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(CartModel, Vec<CartItemModel>), ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let product = Product::find_by_id(product_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        let unit_price = product.discounted_price.unwrap_or(product.base_price);

        let cart = self.get_or_create(principal.id).await?;

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        match existing {
            Some(line) => {
                let new_quantity = line.quantity + quantity;
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(new_quantity);
                active.update(&txn).await.map_err(ServiceError::DatabaseError)?;
            }
            None => {
                let top_position = CartItem::find()
                    .filter(cart_item::Column::CartId.eq(cart.id))
                    .order_by_asc(cart_item::Column::Position)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?
                    .map(|line| line.position)
                    .unwrap_or(0);

                let line = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    unit_price: Set(unit_price),
                    position: Set(top_position - 1),
                    ..Default::default()
                };
                line.insert(&txn).await.map_err(ServiceError::DatabaseError)?;
            }
        }

        Self::recalculate_totals(&txn, cart.id).await?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id,
                quantity,
            })
            .await;

        self.get_cart(principal).await
    }

    /// Sets the quantity of an existing line.
    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn update_quantity(
        &self,
        principal: &AuthenticatedUser,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(CartModel, Vec<CartItemModel>), ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let cart = self.get_or_create(principal.id).await?;
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let line = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
            })?;

        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(quantity);
        active.update(&txn).await.map_err(ServiceError::DatabaseError)?;

        Self::recalculate_totals(&txn, cart.id).await?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.get_cart(principal).await
    }

    /// Removes a line from the cart.
    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn remove_item(
        &self,
        principal: &AuthenticatedUser,
        product_id: Uuid,
    ) -> Result<(CartModel, Vec<CartItemModel>), ServiceError> {
        let cart = self.get_or_create(principal.id).await?;
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let line = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
            })?;

        CartItem::delete_by_id(line.id)
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Self::recalculate_totals(&txn, cart.id).await?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                product_id,
            })
            .await;

        self.get_cart(principal).await
    }

    /// Empties the cart. Clearing an already empty cart is an error, which
    /// keeps accidental double-clears visible to the client.
    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn clear_cart(&self, principal: &AuthenticatedUser) -> Result<CartModel, ServiceError> {
        let cart = self.get_or_create(principal.id).await?;
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let deleted = CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if deleted.rows_affected == 0 {
            return Err(ServiceError::NotFound(
                "Cart is already empty".to_string(),
            ));
        }

        let cart_id = cart.id;
        let mut active: cart::ActiveModel = cart.into();
        active.total_price = Set(Decimal::ZERO);
        let cleared = active.update(&txn).await.map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender.send_or_log(Event::CartCleared(cart_id)).await;

        Ok(cleared)
    }

    /// Recomputes `total_price` from the lines inside the caller's
    /// transaction.
    async fn recalculate_totals<C: ConnectionTrait>(
        conn: &C,
        cart_id: Uuid,
    ) -> Result<(), ServiceError> {
        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(conn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let total: Decimal = items
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum();

        let cart = Cart::find_by_id(cart_id)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        let mut active: cart::ActiveModel = cart.into();
        active.total_price = Set(total);
        active.update(conn).await.map_err(ServiceError::DatabaseError)?;

        Ok(())
    }
}
