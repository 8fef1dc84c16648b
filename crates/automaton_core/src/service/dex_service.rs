//! DEX order book.
//!
//! # Responsibility
//! - Mirror the contract's open orders into the order model.
//! - Place and cancel orders as signed calls.
//! - Build per-kind order book views sorted by price.
//!
//! # Invariants
//! - Only the owner of an order may cancel it.
//! - Buy books list the highest price first; sell and auction books the
//!   lowest first. Equal prices keep contract order.

use super::{require_positive, ServiceError, ServiceResult};
use crate::contract::{ContractCall, ContractContext};
use crate::model::account::Account;
use crate::model::list::{ListModel, ObservableList};
use crate::model::notify::{NotificationDispatcher, Notify};
use crate::model::order::{Order, OrderKind};
use crate::model::proxy::ProxyModel;
use crate::task::{OwnerId, Task, TaskContext, TaskManager, TaskResult};
use serde_json::json;
use std::sync::Arc;

pub const GET_ORDERS_METHOD: &str = "getOrders";
pub const PLACE_ORDER_METHOD: &str = "placeOrder";
pub const CANCEL_ORDER_METHOD: &str = "cancelOrder";

pub struct DexService {
    orders: Arc<ListModel<Order>>,
    dispatcher: NotificationDispatcher,
    contract: ContractContext,
    tasks: TaskManager,
}

impl DexService {
    pub fn new(
        dispatcher: &NotificationDispatcher,
        contract: ContractContext,
        tasks: TaskManager,
    ) -> Self {
        Self {
            orders: Arc::new(ListModel::new(dispatcher)),
            dispatcher: dispatcher.clone(),
            contract,
            tasks,
        }
    }

    pub fn orders(&self) -> Arc<ListModel<Order>> {
        Arc::clone(&self.orders)
    }

    /// Live view of `kind` orders, best price first.
    pub fn order_book(&self, kind: OrderKind) -> Arc<ProxyModel<Order>> {
        let book = ProxyModel::new(&self.dispatcher);
        book.set_filter(move |order: &Order| order.kind == kind);
        match kind {
            OrderKind::Buy => book.sort_by(|left, right| right.cmp_price(left)),
            OrderKind::Sell | OrderKind::Auction => book.sort_by(Order::cmp_price),
        }
        let source: Arc<dyn ObservableList<Order>> = self.orders();
        book.set_model(Some(source));
        book
    }

    pub fn refresh_orders(&self, owner: impl Into<OwnerId>) -> Arc<Task> {
        let contract = self.contract.clone();
        let orders = Arc::clone(&self.orders);
        self.tasks.launch_task(
            "Refresh orders",
            owner,
            move |ctx| reload_orders(ctx, &contract, &orders),
            |_| {},
        )
    }

    pub fn place_order(
        &self,
        account: &Account,
        kind: OrderKind,
        token_amount: u64,
        eth_amount: u64,
    ) -> ServiceResult<Arc<Task>> {
        account.validate()?;
        let token_amount = require_positive("token amount", token_amount)?;
        let eth_amount = require_positive("ETH amount", eth_amount)?;

        let call = ContractCall::signed(
            PLACE_ORDER_METHOD,
            vec![json!(kind.as_str()), json!(token_amount), json!(eth_amount)],
            account.private_key.clone(),
        );
        let contract = self.contract.clone();
        let orders = Arc::clone(&self.orders);
        Ok(self.tasks.launch_task(
            format!("Place {} order", kind.as_str()),
            OwnerId::for_account(&account.address),
            move |ctx| {
                ctx.set_message("Submitting order");
                contract.call_raw(&call)?;
                ctx.check_exit()?;
                reload_orders(ctx, &contract, &orders)
            },
            |_| {},
        ))
    }

    /// # Errors
    /// - `NotFound` when the order is not in the model.
    /// - `Validation` when `account` does not own it.
    pub fn cancel_order(&self, account: &Account, order_id: u64) -> ServiceResult<Arc<Task>> {
        account.validate()?;
        let order = self
            .orders
            .find(|order| order.id == order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id}")))?;
        if !order.is_owned_by(&account.address) {
            return Err(ServiceError::Validation(format!(
                "order {order_id} belongs to another account"
            )));
        }

        let call = ContractCall::signed(
            CANCEL_ORDER_METHOD,
            vec![json!(order_id)],
            account.private_key.clone(),
        );
        let contract = self.contract.clone();
        let orders = Arc::clone(&self.orders);
        Ok(self.tasks.launch_task(
            format!("Cancel order {order_id}"),
            OwnerId::for_account(&account.address),
            move |_ctx| {
                contract.call_raw(&call)?;
                orders.remove_where(|order| order.id == order_id, Notify::Deferred);
                Ok(())
            },
            |_| {},
        ))
    }
}

fn reload_orders(
    ctx: &TaskContext,
    contract: &ContractContext,
    orders: &ListModel<Order>,
) -> TaskResult<()> {
    ctx.set_message("Loading orders");
    let loaded: Vec<Order> =
        contract.call_json(&ContractCall::read(GET_ORDERS_METHOD, Vec::new()))?;
    ctx.set_message(format!("Loaded {} orders", loaded.len()));
    orders.replace_all(loaded, Notify::Deferred);
    Ok(())
}
