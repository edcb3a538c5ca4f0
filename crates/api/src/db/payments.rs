//! Payment attempt queries.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor, PgPool};

use ecom_core::{CurrencyCode, OrderId, PartnerId, PaymentId, PaymentMethod, PaymentState};

use super::RepositoryError;
use crate::models::Payment;

const PAYMENT_COLUMNS: &str = "id, order_id, payment_method, status, amount, currency, \
     transaction_id, gateway_response, processed_at, created_at, updated_at";

/// A payment the gateway may still settle: never reported, or failed only
/// because its order was cancelled first.
const OPEN_FOR_SETTLEMENT: &str =
    "(status = 'pending' OR (status = 'failed' AND gateway_response IS NULL))";

/// Create a `pending` payment attempt.
///
/// Partner payments start without a transaction reference; the partner
/// supplies one when it settles.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the transaction reference is taken.
pub async fn create<'e>(
    executor: impl PgExecutor<'e>,
    order_id: OrderId,
    method: PaymentMethod,
    amount: Decimal,
    currency: CurrencyCode,
    transaction_id: Option<&str>,
) -> Result<Payment, RepositoryError> {
    sqlx::query_as::<_, Payment>(&format!(
        "INSERT INTO payments (order_id, payment_method, amount, currency, transaction_id) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(order_id)
    .bind(method)
    .bind(amount)
    .bind(currency)
    .bind(transaction_id)
    .fetch_one(executor)
    .await
    .map_err(|e| RepositoryError::unique_violation(e, "Transaction already exists"))
}

/// Find a payment by its gateway transaction reference.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_transaction(
    conn: &mut PgConnection,
    transaction_id: &str,
) -> Result<Option<Payment>, RepositoryError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = $1"
    ))
    .bind(transaction_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// Find a partner payment on `order_id` that `partner_id` may settle.
///
/// The partner must supply at least one product on the order. VNPay, COD and
/// bank transfer payments never match.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_for_partner(
    conn: &mut PgConnection,
    id: PaymentId,
    order_id: OrderId,
    partner_id: PartnerId,
) -> Result<Option<Payment>, RepositoryError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments p \
         WHERE p.id = $1 AND p.order_id = $2 AND p.payment_method = 'partner' \
           AND EXISTS ( \
               SELECT 1 FROM order_items oi \
               JOIN products pr ON pr.id = oi.product_id \
               WHERE oi.order_id = p.order_id AND pr.partner_id = $3)"
    ))
    .bind(id)
    .bind(order_id)
    .bind(partner_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// Lock a payment row. Callers lock the owning order first.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the payment is gone.
pub async fn lock(conn: &mut PgConnection, id: PaymentId) -> Result<Payment, RepositoryError> {
    sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Fail every pending payment of a cancelled order.
///
/// The gateway response stays empty so a late gateway report can still be
/// recorded against the payment.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn void_pending_for_order(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        "UPDATE payments SET status = 'failed', processed_at = NOW(), updated_at = NOW() \
         WHERE order_id = $1 AND status = 'pending'",
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Record the gateway outcome of a payment.
///
/// Only pending or voided payments are updated. Anything the gateway has
/// already reported on is left untouched and `NotFound` is returned, so
/// replays cannot flip an outcome.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if no open payment matches.
pub async fn settle(
    conn: &mut PgConnection,
    id: PaymentId,
    state: PaymentState,
    transaction_id: Option<&str>,
    gateway_response: &serde_json::Value,
) -> Result<Payment, RepositoryError> {
    sqlx::query_as::<_, Payment>(&format!(
        "UPDATE payments SET status = $2, \
             transaction_id = COALESCE(transaction_id, $3), \
             gateway_response = $4, processed_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND {OPEN_FOR_SETTLEMENT} \
         RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(id)
    .bind(state)
    .bind(transaction_id)
    .bind(gateway_response)
    .fetch_optional(conn)
    .await
    .map_err(|e| RepositoryError::unique_violation(e, "Transaction already exists"))?
    .ok_or(RepositoryError::NotFound)
}

/// Payments recorded against an order, oldest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_order(
    pool: &PgPool,
    order_id: OrderId,
) -> Result<Vec<Payment>, RepositoryError> {
    let payments = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at, id"
    ))
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(payments)
}
