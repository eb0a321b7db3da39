pub mod conversation;
pub mod faq;
pub mod intent;
pub mod order;
pub mod product;
pub mod retrieval;
pub mod review;
pub mod tenant;
