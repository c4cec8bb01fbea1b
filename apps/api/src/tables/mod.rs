// Per-job candidate tables: identifier hygiene, storage and read endpoints.

pub mod handlers;
pub mod ident;
pub mod store;
