//! Storage-free business rules. Everything here is a pure function over plain
//! values; services load an aggregate, apply one of these, then persist the result.

pub mod cart;
pub mod order;
pub mod pricing;
