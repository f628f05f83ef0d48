pub mod conversions;
pub mod customers;
pub mod idempotency_keys;
pub mod interactions;
pub mod products;
pub mod refresh_tokens;
pub mod sea_orm_active_enums;
pub mod teams;
pub mod users;
