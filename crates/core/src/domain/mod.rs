pub mod customer;
pub mod trigger;
