//! Operation templates and weighted kind selection.
//!
//! Every parameter carries an explicit cast so the driver never has to infer
//! a type from the prepared statement.

use rand::Rng;

use crate::domain::{OperationKind, OperationWeights};
use crate::port::outbound::database::{Param, Statement};

const USER_BY_ID: &str = "SELECT id, email, last_login_at FROM users WHERE id = $1::bigint";

const PRODUCT_BY_ID: &str =
    "SELECT id, name, price_cents, stock FROM products WHERE id = $1::bigint";

const RECENT_ORDERS: &str = "SELECT o.id, o.quantity, o.status, p.name \
     FROM orders o JOIN products p ON p.id = o.product_id \
     WHERE o.user_id = $1::bigint ORDER BY o.created_at DESC LIMIT 10";

const TOUCH_LOGIN: &str = "UPDATE users SET last_login_at = now() WHERE id = $1::bigint";

const PLACE_ORDER: &str = "INSERT INTO orders (user_id, product_id, quantity, status) \
     VALUES ($1::bigint, $2::bigint, $3::bigint, 'pending')";

const LOCK_PRODUCT: &str = "SELECT stock FROM products WHERE id = $1::bigint FOR UPDATE";

const CONFIRM_ORDER: &str = "INSERT INTO orders (user_id, product_id, quantity, status) \
     VALUES ($1::bigint, $2::bigint, $3::bigint, 'confirmed')";

const DECREMENT_STOCK: &str =
    "UPDATE products SET stock = stock - $1::bigint WHERE id = $2::bigint";

const AUDIT_STOCK: &str = "INSERT INTO inventory_audit (product_id, delta, reason) \
     VALUES ($1::bigint, $2::bigint, $3::text)";

/// Largest quantity a synthetic order asks for.
const MAX_QUANTITY: i64 = 3;

/// Statements for one concrete operation, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPlan {
    pub kind: OperationKind,
    /// Template variant name, for logs.
    pub variant: &'static str,
    pub statements: Vec<Statement>,
    /// Run all statements as one transaction.
    pub atomic: bool,
}

/// Read/write/transaction templates plus the weights used to pick a kind.
///
/// Stateless: every draw comes from the caller's RNG.
#[derive(Debug, Clone)]
pub struct OperationCatalog {
    weights: OperationWeights,
    user_id_max: i64,
    product_id_max: i64,
}

impl OperationCatalog {
    pub const READ_VARIANTS: [&'static str; 3] = ["user_by_id", "product_by_id", "recent_orders"];
    pub const WRITE_VARIANTS: [&'static str; 2] = ["touch_login", "place_order"];

    #[must_use]
    pub fn new(weights: OperationWeights, user_id_max: i64, product_id_max: i64) -> Self {
        Self {
            weights,
            user_id_max: user_id_max.max(1),
            product_id_max: product_id_max.max(1),
        }
    }

    #[must_use]
    pub const fn weights(&self) -> &OperationWeights {
        &self.weights
    }

    /// Weighted draw over the three kinds.
    ///
    /// Weights are validated to sum to 100 before a run; an all-zero table
    /// falls back to `Read`.
    pub fn pick_kind<R: Rng + ?Sized>(&self, rng: &mut R) -> OperationKind {
        let total = self.weights.total();
        if total == 0 {
            return OperationKind::Read;
        }

        let mut roll = rng.gen_range(0..total);
        for kind in OperationKind::ALL {
            let weight = self.weights.get(kind);
            if roll < weight {
                return kind;
            }
            roll -= weight;
        }
        OperationKind::Read
    }

    /// Build a concrete operation of `kind` with synthetic parameters.
    ///
    /// Read and write variants are chosen uniformly within their kind.
    pub fn plan<R: Rng + ?Sized>(&self, kind: OperationKind, rng: &mut R) -> OperationPlan {
        let user = rng.gen_range(1..=self.user_id_max);
        let product = rng.gen_range(1..=self.product_id_max);
        let quantity = rng.gen_range(1..=MAX_QUANTITY);

        match kind {
            OperationKind::Read => {
                let index = rng.gen_range(0..Self::READ_VARIANTS.len());
                let statement = match index {
                    0 => Statement::new(USER_BY_ID, vec![Param::Int(user)]),
                    1 => Statement::new(PRODUCT_BY_ID, vec![Param::Int(product)]),
                    _ => Statement::new(RECENT_ORDERS, vec![Param::Int(user)]),
                };
                Self::single(kind, Self::READ_VARIANTS[index], statement)
            }
            OperationKind::Write => {
                let index = rng.gen_range(0..Self::WRITE_VARIANTS.len());
                let statement = match index {
                    0 => Statement::new(TOUCH_LOGIN, vec![Param::Int(user)]),
                    _ => Statement::new(
                        PLACE_ORDER,
                        vec![Param::Int(user), Param::Int(product), Param::Int(quantity)],
                    ),
                };
                Self::single(kind, Self::WRITE_VARIANTS[index], statement)
            }
            OperationKind::Transaction => OperationPlan {
                kind,
                variant: "purchase",
                statements: vec![
                    Statement::new(LOCK_PRODUCT, vec![Param::Int(product)]),
                    Statement::new(
                        CONFIRM_ORDER,
                        vec![Param::Int(user), Param::Int(product), Param::Int(quantity)],
                    ),
                    Statement::new(DECREMENT_STOCK, vec![Param::Int(quantity), Param::Int(product)]),
                    Statement::new(
                        AUDIT_STOCK,
                        vec![
                            Param::Int(product),
                            Param::Int(-quantity),
                            Param::from("order"),
                        ],
                    ),
                ],
                atomic: true,
            },
        }
    }

    fn single(kind: OperationKind, variant: &'static str, statement: Statement) -> OperationPlan {
        OperationPlan {
            kind,
            variant,
            statements: vec![statement],
            atomic: false,
        }
    }
}
