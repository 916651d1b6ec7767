//! Sliding-window order-flow imbalance.
//!
//! Keeps the last N trade sides in a FIFO and maintains buy/sell counts
//! incrementally, so each observation is O(1):
//!
//! `ofi = (buys - sells) / max(1, buys + sells)`

use std::collections::VecDeque;

use super::trade::TradeSide;

/// Default number of trades in the window.
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Fixed-capacity window of recent trade sides.
///
/// Owned by exactly one consumption context (the feature processor or a
/// single forecast session); never shared.
#[derive(Debug, Clone)]
pub struct OfiWindow {
    sides: VecDeque<TradeSide>,
    capacity: usize,
    buys: usize,
    sells: usize,
}

impl OfiWindow {
    /// Create a window holding at most `capacity` sides (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sides: VecDeque::with_capacity(capacity),
            capacity,
            buys: 0,
            sells: 0,
        }
    }

    /// Record a trade side and return the OFI over the updated window.
    pub fn observe(&mut self, side: TradeSide) -> f64 {
        if self.sides.len() == self.capacity {
            match self.sides.pop_front() {
                Some(TradeSide::Buy) => self.buys -= 1,
                Some(TradeSide::Sell) => self.sells -= 1,
                None => {}
            }
        }
        self.sides.push_back(side);
        match side {
            TradeSide::Buy => self.buys += 1,
            TradeSide::Sell => self.sells += 1,
        }
        self.ofi()
    }

    /// OFI over the current contents; 0.0 for an empty window.
    #[allow(clippy::cast_precision_loss)]
    pub fn ofi(&self) -> f64 {
        let total = (self.buys + self.sells).max(1);
        (self.buys as f64 - self.sells as f64) / total as f64
    }

    pub fn len(&self) -> usize {
        self.sides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sides.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// (buys, sells) currently in the window.
    pub const fn counts(&self) -> (usize, usize) {
        (self.buys, self.sells)
    }
}

impl Default for OfiWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window_is_zero() {
        let window = OfiWindow::new(10);
        assert_eq!(window.ofi(), 0.0);
        assert!(window.is_empty());
    }

    #[test]
    fn test_all_buys_is_one() {
        let mut window = OfiWindow::new(5);
        for _ in 0..3 {
            assert_eq!(window.observe(TradeSide::Buy), 1.0);
        }
    }

    #[test]
    fn test_all_sells_is_minus_one() {
        let mut window = OfiWindow::new(5);
        assert_eq!(window.observe(TradeSide::Sell), -1.0);
        assert_eq!(window.observe(TradeSide::Sell), -1.0);
    }

    #[test]
    fn test_mixed_window() {
        let mut window = OfiWindow::new(10);
        window.observe(TradeSide::Buy);
        window.observe(TradeSide::Buy);
        window.observe(TradeSide::Buy);
        let ofi = window.observe(TradeSide::Sell);
        assert!((ofi - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_oldest_side_is_evicted() {
        let mut window = OfiWindow::new(2);
        window.observe(TradeSide::Sell);
        window.observe(TradeSide::Buy);
        // Sell falls out, window is [buy, buy]
        let ofi = window.observe(TradeSide::Buy);
        assert_eq!(ofi, 1.0);
        assert_eq!(window.len(), 2);
        assert_eq!(window.counts(), (2, 0));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut window = OfiWindow::new(0);
        assert_eq!(window.capacity(), 1);
        window.observe(TradeSide::Buy);
        assert_eq!(window.observe(TradeSide::Sell), -1.0);
        assert_eq!(window.len(), 1);
    }
}
