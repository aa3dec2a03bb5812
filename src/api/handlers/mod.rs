pub mod health;
pub mod image;
pub mod short_url;
pub mod staging;
pub mod upload;
