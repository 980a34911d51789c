// Order lifecycle
pub mod order_numbers;
pub mod order_projection;
pub mod order_status;
pub mod orders;
pub mod pricing;

// Catalog referenced by orders
pub mod attributes;
pub mod brands;
pub mod catalog;
pub mod sales;

// Storefront content
pub mod contact;
pub mod news;
pub mod reviews;

// Reporting
pub mod reports;

// External collaborators
pub mod notifications;
pub mod payments;
