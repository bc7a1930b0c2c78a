use serde::{Deserialize, Serialize};

/// Traversal order of a multi-dimensional index space.
///
/// `RowMajor` (C order) advances the last dimension fastest, `ColMajor`
/// (Fortran order) advances the first dimension fastest. `Storage` is only
/// meaningful for pointer iteration: dimensions are visited in ascending
/// stride order, which follows the physical storage as closely as possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    RowMajor,
    ColMajor,
    Storage,
}

impl Order {
    /// The order used when a caller does not care.
    pub const fn default_order() -> Order {
        Order::RowMajor
    }

    /// Replace `Storage` with the default logical order.
    pub const fn auto_fc(order: Order) -> Order {
        match order {
            Order::Storage => Order::default_order(),
            other => other,
        }
    }

    pub const fn is_logical(self) -> bool {
        matches!(self, Order::RowMajor | Order::ColMajor)
    }
}

impl Default for Order {
    fn default() -> Self {
        Order::default_order()
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Order::RowMajor => "C",
            Order::ColMajor => "F",
            Order::Storage => "S",
        };
        write!(f, "{}", name)
    }
}
