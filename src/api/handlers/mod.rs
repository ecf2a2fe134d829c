pub mod auth;
pub mod carriers;
pub mod customers;
pub mod dashboard;
pub mod health;
pub mod operations;
pub mod users;
