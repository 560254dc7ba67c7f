pub mod audit_logs;
pub mod cart_items;
pub mod carts;
pub mod order_items;
pub mod order_notes;
pub mod orders;
pub mod products;
pub mod sea_orm_active_enums;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use order_items::Entity as OrderItems;
pub use order_notes::Entity as OrderNotes;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
