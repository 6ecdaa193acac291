use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::entities::{
    cart, cart_item, order, user, Cart, CartItem, Order, OrderItem, OrderItemModel, OrderModel,
    OrderStatus, PaymentStatus, ShippingMethod, User, UserModel,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::payments::{
    CheckoutLineItem, CheckoutSessionRequest, PaymentOutcome, PaymentProvider,
};
use crate::services::stock::{StockRequirement, StockService};

/// Shipping address copied verbatim onto the order at checkout time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddressSnapshot {
    pub street: String,
    pub city: String,
    pub land_mark: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
}

/// One line of a checkout request, already priced by the client cart.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub items: Vec<NewOrderItem>,
    pub amount: Decimal,
    pub address: AddressSnapshot,
    pub shipping_method: Option<ShippingMethod>,
    pub delivery_date: Option<DateTime<Utc>>,
}

/// Result of an online checkout initiation: the order is persisted Pending
/// and the caller is redirected to the provider's hosted page.
#[derive(Debug, Clone)]
pub struct CheckoutInitiation {
    pub order_id: Uuid,
    pub session_url: String,
}

/// Order workflow: checkout initiation, finalization, administration.
///
/// Finalization runs all of its mutations (payment flags, stock decrements,
/// order counter, cart clear) in one transaction; the stock decrement is a
/// conditional update with a floor at zero, so of two finalizations racing
/// for the last unit exactly one commits.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    stock: StockService,
    provider: Arc<dyn PaymentProvider>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        stock: StockService,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            db,
            event_sender,
            stock,
            provider,
        }
    }

    fn validate_request(request: &CheckoutRequest) -> Result<(), ServiceError> {
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }
        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Order amount must be greater than zero".to_string(),
            ));
        }
        if request.items.iter().any(|item| item.quantity < 1) {
            return Err(ServiceError::ValidationError(
                "Item quantities must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn requirements(request: &CheckoutRequest) -> Vec<StockRequirement> {
        request
            .items
            .iter()
            .map(|item| StockRequirement {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect()
    }

    async fn load_user(&self, user_id: Uuid) -> Result<UserModel, ServiceError> {
        User::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }

    /// Persists a Pending, unpaid order with item and address snapshots.
    async fn persist_pending_order(
        &self,
        principal: &AuthenticatedUser,
        request: &CheckoutRequest,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let address = serde_json::to_value(&request.address)
            .map_err(|e| ServiceError::InternalError(format!("Address snapshot: {}", e)))?;

        let order_model = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(principal.id),
            amount: Set(request.amount),
            order_status: Set(OrderStatus::Processing),
            payment_status: Set(PaymentStatus::Pending),
            payment: Set(false),
            shipping_address: Set(address),
            shipping_method: Set(request.shipping_method),
            delivery_date: Set(request.delivery_date),
            ..Default::default()
        };

        let saved = order_model.insert(&txn).await.map_err(|e| {
            error!("Failed to insert order: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        for item in &request.items {
            let item_model = crate::entities::order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(saved.id),
                product_id: Set(item.product_id),
                title: Set(item.title.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                image: Set(item.image.clone()),
                created_at: Set(Utc::now()),
            };
            item_model.insert(&txn).await.map_err(|e| {
                error!("Failed to insert order item: {}", e);
                ServiceError::DatabaseError(e)
            })?;
        }

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::OrderCreated(saved.id))
            .await;

        Ok(saved)
    }

    /// Online checkout: advisory stock check, pending order, provider
    /// session. The order stays Pending until the provider reports an
    /// outcome; a provider failure leaves it Pending for manual
    /// reconciliation.
    #[instrument(skip(self, request), fields(user_id = %principal.id))]
    pub async fn initiate_online_checkout(
        &self,
        principal: &AuthenticatedUser,
        request: CheckoutRequest,
    ) -> Result<CheckoutInitiation, ServiceError> {
        Self::validate_request(&request)?;
        let user = self.load_user(principal.id).await?;
        self.stock
            .validate_availability(&Self::requirements(&request))
            .await?;

        let order = self.persist_pending_order(principal, &request).await?;

        let session_request = CheckoutSessionRequest {
            order_id: order.id,
            user_id: principal.id,
            customer_name: user.fullname,
            line_items: request
                .items
                .iter()
                .map(|item| CheckoutLineItem {
                    title: item.title.clone(),
                    image: item.image.clone(),
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                })
                .collect(),
        };

        let session = self.provider.create_checkout_session(&session_request).await?;

        self.event_sender
            .send_or_log(Event::CheckoutSessionCreated {
                order_id: order.id,
                user_id: principal.id,
            })
            .await;

        Ok(CheckoutInitiation {
            order_id: order.id,
            session_url: session.url,
        })
    }

    /// Cash on delivery: no provider step, the order is created and
    /// finalized as paid in one call.
    #[instrument(skip(self, request), fields(user_id = %principal.id))]
    pub async fn initiate_cod_checkout(
        &self,
        principal: &AuthenticatedUser,
        request: CheckoutRequest,
    ) -> Result<OrderModel, ServiceError> {
        Self::validate_request(&request)?;
        self.load_user(principal.id).await?;
        self.stock
            .validate_availability(&Self::requirements(&request))
            .await?;

        let order = self.persist_pending_order(principal, &request).await?;

        self.finalize_order(PaymentOutcome {
            order_id: order.id,
            success: true,
        })
        .await
    }

    /// Applies a payment outcome to an order.
    ///
    /// Success commits, atomically: guarded stock decrements for every item
    /// snapshot, `payment_status = Paid` + `payment = true`, the owner's
    /// order counter, and an unconditional cart clear. Any failed decrement
    /// rolls everything back. Failure marks the order Failed and nothing
    /// else; the caller re-initiates checkout rather than resuming.
    #[instrument(skip(self), fields(order_id = %outcome.order_id))]
    pub async fn finalize_order(&self, outcome: PaymentOutcome) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = Order::find_by_id(outcome.order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", outcome.order_id))
            })?;

        if order.payment_status == PaymentStatus::Paid {
            return Err(ServiceError::Conflict(format!(
                "Order {} is already paid",
                order.id
            )));
        }

        if !outcome.success {
            let mut active: order::ActiveModel = order.into();
            active.payment_status = Set(PaymentStatus::Failed);
            let failed = active.update(&txn).await.map_err(ServiceError::DatabaseError)?;
            txn.commit().await.map_err(ServiceError::DatabaseError)?;

            self.event_sender
                .send_or_log(Event::OrderPaymentFailed(failed.id))
                .await;

            return Err(ServiceError::PaymentFailed(format!(
                "Payment for order {} was not completed",
                failed.id
            )));
        }

        let items = OrderItem::find()
            .filter(crate::entities::order_item::Column::OrderId.eq(order.id))
            .all(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut stock_changes = Vec::with_capacity(items.len());
        for item in &items {
            let variant =
                StockService::decrement_guarded(&txn, item.product_id, item.quantity).await?;
            stock_changes.push((variant.id, variant.stock, variant.stock - item.quantity));
        }

        let user_id = order.user_id;
        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(PaymentStatus::Paid);
        active.payment = Set(true);
        let paid = active.update(&txn).await.map_err(ServiceError::DatabaseError)?;

        User::update_many()
            .col_expr(
                user::Column::OrderCount,
                Expr::col(user::Column::OrderCount).add(1),
            )
            .filter(user::Column::Id.eq(user_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        self.clear_cart_in_txn(&txn, user_id).await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(order_id = %paid.id, %user_id, "order finalized as paid");
        self.event_sender
            .send_or_log(Event::OrderPaid {
                order_id: paid.id,
                user_id,
            })
            .await;
        for (variant_id, old_stock, new_stock) in stock_changes {
            self.event_sender
                .send_or_log(Event::VariantStockChanged {
                    variant_id,
                    old_stock,
                    new_stock,
                })
                .await;
        }

        Ok(paid)
    }

    /// Empties the user's cart: every line, not just the purchased ones.
    async fn clear_cart_in_txn(
        &self,
        txn: &DatabaseTransaction,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(txn)
            .await
            .map_err(ServiceError::DatabaseError)?
        else {
            return Ok(());
        };

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut active: cart::ActiveModel = cart.into();
        active.total_price = Set(Decimal::ZERO);
        active.update(txn).await.map_err(ServiceError::DatabaseError)?;

        Ok(())
    }

    /// Loads an order with its item snapshots, enforcing ownership unless
    /// the caller is an admin.
    pub async fn get_order(
        &self,
        principal: &AuthenticatedUser,
        order_id: Uuid,
    ) -> Result<(OrderModel, Vec<OrderItemModel>), ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.user_id != principal.id && !principal.is_admin() {
            return Err(ServiceError::Forbidden(
                "Order belongs to another user".to_string(),
            ));
        }

        let items = OrderItem::find()
            .filter(crate::entities::order_item::Column::OrderId.eq(order.id))
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((order, items))
    }

    /// Admin listing, newest first, with the owning user for display.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<(OrderModel, Option<UserModel>)>, u64), ServiceError> {
        let paginator = Order::find()
            .find_also_related(User)
            .order_by_desc(order::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((orders, total))
    }

    /// Exact-match filter on the fulfillment status, newest first.
    pub async fn filter_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        Order::find()
            .filter(order::Column::OrderStatus.eq(status))
            .order_by_desc(order::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// The caller's own order history, newest first.
    pub async fn user_orders(
        &self,
        principal: &AuthenticatedUser,
    ) -> Result<Vec<(OrderModel, Vec<OrderItemModel>)>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::UserId.eq(principal.id))
            .order_by_desc(order::Column::CreatedAt)
            .find_with_related(OrderItem)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(orders)
    }

    /// Operator update of order and/or payment status. Rejects a call with
    /// neither field; never touches stock, the cart, or the order counter.
    #[instrument(skip(self))]
    pub async fn update_order(
        &self,
        order_id: Uuid,
        order_status: Option<OrderStatus>,
        payment_status: Option<PaymentStatus>,
    ) -> Result<OrderModel, ServiceError> {
        if order_status.is_none() && payment_status.is_none() {
            return Err(ServiceError::ValidationError(
                "Provide order_status and/or payment_status".to_string(),
            ));
        }

        let order = Order::find_by_id(order_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.order_status;
        let mut active: order::ActiveModel = order.into();
        if let Some(status) = order_status {
            active.order_status = Set(status);
        }
        if let Some(status) = payment_status {
            active.payment_status = Set(status);
        }

        let updated = active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        if let Some(new_status) = order_status {
            if new_status != old_status {
                self.event_sender
                    .send_or_log(Event::OrderStatusChanged {
                        order_id: updated.id,
                        old_status: format!("{:?}", old_status),
                        new_status: format!("{:?}", new_status),
                    })
                    .await;
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_request() -> CheckoutRequest {
        CheckoutRequest {
            items: vec![NewOrderItem {
                product_id: Uuid::new_v4(),
                title: "Galaxy S24".to_string(),
                quantity: 2,
                unit_price: dec!(699.99),
                image: None,
            }],
            amount: dec!(1399.98),
            address: AddressSnapshot {
                street: "12 MG Road".to_string(),
                city: "Bengaluru".to_string(),
                land_mark: "Opposite metro".to_string(),
                state: "Karnataka".to_string(),
                country: "India".to_string(),
                zip_code: "560001".to_string(),
            },
            shipping_method: Some(ShippingMethod::FreeDelivery),
            delivery_date: None,
        }
    }

    #[test]
    fn empty_items_are_rejected() {
        let mut request = sample_request();
        request.items.clear();
        assert!(matches!(
            OrderService::validate_request(&request),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let mut request = sample_request();
        request.amount = Decimal::ZERO;
        assert!(matches!(
            OrderService::validate_request(&request),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn zero_quantity_item_is_rejected() {
        let mut request = sample_request();
        request.items[0].quantity = 0;
        assert!(matches!(
            OrderService::validate_request(&request),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn requirements_mirror_items() {
        let request = sample_request();
        let reqs = OrderService::requirements(&request);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].product_id, request.items[0].product_id);
        assert_eq!(reqs[0].quantity, 2);
    }
}
