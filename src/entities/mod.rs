pub mod attribute_option;
pub mod brand;
pub mod category;
pub mod contact_submission;
pub mod news_post;
pub mod order;
pub mod order_item;
pub mod order_sequence;
pub mod order_status_history;
pub mod product;
pub mod product_attribute;
pub mod review;
pub mod sale;
