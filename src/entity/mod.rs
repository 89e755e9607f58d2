pub mod activity_logs;
pub mod admins;
pub mod categories;
pub mod inventory_logs;
pub mod order_items;
pub mod orders;
pub mod product_images;
pub mod products;
pub mod users;

pub use activity_logs::Entity as ActivityLogs;
pub use admins::Entity as Admins;
pub use categories::Entity as Categories;
pub use inventory_logs::Entity as InventoryLogs;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_images::Entity as ProductImages;
pub use products::Entity as Products;
pub use users::Entity as Users;
