//! DEX order model.
//!
//! Quantities are kept in two denominations: the traded token and ether,
//! both in their smallest units.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Buy,
    Sell,
    Auction,
}

impl OrderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Auction => "auction",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub kind: OrderKind,
    pub owner: String,
    pub token_amount: u64,
    pub eth_amount: u64,
}

impl Order {
    /// Compares ether-per-token prices without floating point.
    ///
    /// Orders with a zero token amount sort after every priced order.
    pub fn cmp_price(&self, other: &Order) -> Ordering {
        match (self.token_amount, other.token_amount) {
            (0, 0) => Ordering::Equal,
            (0, _) => Ordering::Greater,
            (_, 0) => Ordering::Less,
            (own_tokens, other_tokens) => {
                let left = u128::from(self.eth_amount) * u128::from(other_tokens);
                let right = u128::from(other.eth_amount) * u128::from(own_tokens);
                left.cmp(&right)
            }
        }
    }

    pub fn is_owned_by(&self, address: &str) -> bool {
        self.owner.eq_ignore_ascii_case(address.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::{Order, OrderKind};
    use std::cmp::Ordering;

    fn order(id: u64, token_amount: u64, eth_amount: u64) -> Order {
        Order {
            id,
            kind: OrderKind::Sell,
            owner: "0xabc".to_string(),
            token_amount,
            eth_amount,
        }
    }

    #[test]
    fn price_comparison_uses_cross_multiplication() {
        // 3/2 = 1.5 vs 4/3 = 1.33
        assert_eq!(order(1, 2, 3).cmp_price(&order(2, 3, 4)), Ordering::Greater);
        assert_eq!(order(1, 2, 4).cmp_price(&order(2, 1, 2)), Ordering::Equal);
        assert_eq!(order(1, 0, 4).cmp_price(&order(2, 1, 2)), Ordering::Greater);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&OrderKind::Auction).expect("kind json");
        assert_eq!(json, "\"auction\"");
        assert_eq!(OrderKind::Buy.as_str(), "buy");
    }
}
