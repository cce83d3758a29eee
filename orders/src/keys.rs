//! Lock and cache key layout.
//!
//! Lock keys are namespaced by the lock manager (`lock:`), cache keys by the
//! cache service (`cache:`); these helpers build the part after the prefix.

use storefront_core::types::{OrderId, OrderIntent, OrderStatus, PageRequest, UserId};

/// Lock serializing creation for one user and one item set.
///
/// Cart ids are sorted and de-duplicated, so the same set always maps to the
/// same key whatever order the client sent them in.
#[must_use]
pub fn create_lock(user: UserId, intent: &OrderIntent) -> String {
    let mut key = format!("order:create:user:{user}");
    match intent {
        OrderIntent::Cart { cart_item_ids } => {
            let mut ids = cart_item_ids.clone();
            ids.sort_unstable();
            ids.dedup();
            for id in ids {
                key.push_str(&format!(":cart:{id}"));
            }
        }
        OrderIntent::Direct { product_id, quantity } => {
            key.push_str(&format!(":product:{product_id}:qty:{quantity}"));
        }
    }
    key
}

/// Lock serializing status changes of one order.
#[must_use]
pub fn status_lock(order: OrderId) -> String {
    format!("order:status:{order}")
}

/// Cached order by id.
#[must_use]
pub fn order(order: OrderId) -> String {
    format!("order:{order}")
}

/// Cached order by order number.
#[must_use]
pub fn order_no(order_no: &str) -> String {
    format!("order:no:{order_no}")
}

/// Version token of a user's cached listings.
#[must_use]
pub fn list_version(user: UserId) -> String {
    format!("order:user:{user}:version")
}

/// Cached listing page.
#[must_use]
pub fn list(user: UserId, version: &str, page: PageRequest, status: Option<OrderStatus>) -> String {
    let mut key = format!(
        "order:user:{user}:v:{version}:page:{}:size:{}",
        page.page(),
        page.page_size()
    );
    if let Some(status) = status {
        key.push_str(&format!(":status:{}", status.code()));
    }
    key
}
