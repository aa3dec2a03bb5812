pub mod cropper;
pub mod session_registry;
pub mod short_url;
pub mod staging_service;
pub mod storage;
pub mod temp_store;
pub mod upload_service;
pub mod worker;
