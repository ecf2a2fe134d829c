pub mod prelude;

pub mod carriers;
pub mod customers;
pub mod operations;
pub mod users;
pub mod vehicles;
