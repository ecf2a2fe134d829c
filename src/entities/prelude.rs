pub use super::carriers::Entity as Carriers;
pub use super::customers::Entity as Customers;
pub use super::operations::Entity as Operations;
pub use super::users::Entity as Users;
pub use super::vehicles::Entity as Vehicles;
