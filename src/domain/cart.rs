use uuid::Uuid;

use crate::{
    domain::pricing::{self, Pricing},
    error::{AppError, AppResult},
};

/// What a cart line remembers about a product at the time it was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub product_id: Uuid,
    pub name: String,
    pub price: i64,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub price: i64,
    pub image: Option<String>,
    pub quantity: i32,
}

impl CartLine {
    pub fn line_total(&self) -> AppResult<i64> {
        pricing::line_total(self.price, self.quantity)
    }
}

/// A user's cart. At most one line per product; line order is insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    lines: Vec<CartLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSummary {
    pub pricing: Pricing,
    pub item_count: i64,
}

impl Cart {
    pub fn new(id: Uuid, user_id: Uuid, lines: Vec<CartLine>) -> Self {
        Self { id, user_id, lines }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, product_id: Uuid) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    /// Adds `quantity` of a product. An existing line keeps its snapshot and
    /// only grows; a new line is appended. A change that leaves the cart
    /// unpriceable is undone.
    pub fn add_item(&mut self, product: ProductSnapshot, quantity: i32) -> AppResult<()> {
        if quantity < 1 {
            return Err(AppError::invalid("Quantity must be at least 1"));
        }
        let previous = self.lines.clone();
        let merged = self
            .merge_item(product, quantity)
            .and_then(|()| self.summary().map(|_| ()));
        if merged.is_err() {
            self.lines = previous;
        }
        merged
    }

    fn merge_item(&mut self, product: ProductSnapshot, quantity: i32) -> AppResult<()> {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product.product_id)
        {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| AppError::invalid("Quantity is too large"))?;
            return Ok(());
        }

        self.lines.push(CartLine {
            product_id: product.product_id,
            name: product.name,
            price: product.price,
            image: product.image,
            quantity,
        });
        Ok(())
    }

    /// Sets a line's quantity. Zero or less removes the line.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: i32) -> AppResult<()> {
        if quantity <= 0 {
            self.remove_item(product_id);
            return Ok(());
        }

        let index = self
            .lines
            .iter()
            .position(|line| line.product_id == product_id)
            .ok_or_else(|| AppError::not_found("Cart item"))?;
        let previous = std::mem::replace(&mut self.lines[index].quantity, quantity);
        if let Err(err) = self.summary() {
            self.lines[index].quantity = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Returns whether a line was removed.
    pub fn remove_item(&mut self, product_id: Uuid) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn total_items(&self) -> i64 {
        self.lines.iter().map(|line| i64::from(line.quantity)).sum()
    }

    pub fn total_price(&self) -> AppResult<i64> {
        Ok(self.summary()?.pricing.subtotal)
    }

    pub fn summary(&self) -> AppResult<CartSummary> {
        Ok(CartSummary {
            pricing: Pricing::for_lines(self.lines.iter().map(|line| (line.price, line.quantity)))?,
            item_count: self.total_items(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str, price: i64) -> ProductSnapshot {
        ProductSnapshot {
            product_id: Uuid::new_v4(),
            name: name.to_string(),
            price,
            image: None,
        }
    }

    fn empty_cart() -> Cart {
        Cart::new(Uuid::new_v4(), Uuid::new_v4(), Vec::new())
    }

    #[test]
    fn adding_same_product_merges_lines() {
        let mut cart = empty_cart();
        let mug = snapshot("Mug", 12_00);
        cart.add_item(mug.clone(), 1).unwrap();
        cart.add_item(mug.clone(), 2).unwrap();

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.line(mug.product_id).unwrap().quantity, 3);
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.total_price().unwrap(), 36_00);
    }

    #[test]
    fn merged_line_keeps_original_snapshot() {
        let mut cart = empty_cart();
        let mug = snapshot("Mug", 12_00);
        cart.add_item(mug.clone(), 1).unwrap();
        cart.add_item(
            ProductSnapshot {
                price: 99_00,
                ..mug.clone()
            },
            1,
        )
        .unwrap();

        assert_eq!(cart.line(mug.product_id).unwrap().price, 12_00);
    }

    #[test]
    fn add_rejects_non_positive_quantity() {
        let mut cart = empty_cart();
        let err = cart.add_item(snapshot("Mug", 1_00), 0).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert!(cart.is_empty());
    }

    #[test]
    fn update_to_zero_removes_line() {
        let mut cart = empty_cart();
        let mug = snapshot("Mug", 12_00);
        cart.add_item(mug.clone(), 4).unwrap();
        cart.update_quantity(mug.product_id, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn update_missing_line_is_not_found() {
        let mut cart = empty_cart();
        let err = cart.update_quantity(Uuid::new_v4(), 2).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn remove_missing_line_is_noop() {
        let mut cart = empty_cart();
        cart.add_item(snapshot("Mug", 12_00), 1).unwrap();
        assert!(!cart.remove_item(Uuid::new_v4()));
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn lines_keep_insertion_order() {
        let mut cart = empty_cart();
        let first = snapshot("First", 1_00);
        let second = snapshot("Second", 2_00);
        cart.add_item(first.clone(), 1).unwrap();
        cart.add_item(second.clone(), 1).unwrap();
        cart.add_item(first.clone(), 1).unwrap();

        let ids: Vec<_> = cart.lines().iter().map(|line| line.product_id).collect();
        assert_eq!(ids, vec![first.product_id, second.product_id]);
    }

    #[test]
    fn empty_cart_summary_is_zero() {
        let mut cart = empty_cart();
        cart.add_item(snapshot("Mug", 12_00), 1).unwrap();
        cart.clear();

        let summary = cart.summary().unwrap();
        assert_eq!(summary.pricing, Pricing::zero());
        assert_eq!(summary.item_count, 0);
    }

    #[test]
    fn summary_applies_pricing_policy() {
        let mut cart = empty_cart();
        cart.add_item(snapshot("Lamp", 50_00), 2).unwrap();

        let summary = cart.summary().unwrap();
        assert_eq!(summary.pricing.subtotal, 100_00);
        assert_eq!(summary.pricing.shipping, 10_00);
        assert_eq!(summary.pricing.tax, 10_00);
        assert_eq!(summary.pricing.total, 120_00);
        assert_eq!(summary.item_count, 2);
    }

    #[test]
    fn unpriceable_changes_are_undone() {
        let mut cart = empty_cart();
        let costly = snapshot("Yacht", 1_000_000_000_000_000_000);
        let err = cart.add_item(costly.clone(), 1).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert!(cart.is_empty());

        let mug = snapshot("Mug", 1_000_000_000_000);
        cart.add_item(mug.clone(), 1).unwrap();
        assert!(cart.update_quantity(mug.product_id, i32::MAX).is_err());
        assert_eq!(cart.line(mug.product_id).unwrap().quantity, 1);
        assert!(cart.add_item(mug.clone(), i32::MAX - 1).is_err());
        assert_eq!(cart.line(mug.product_id).unwrap().quantity, 1);
        assert!(cart.summary().is_ok());
    }
}
