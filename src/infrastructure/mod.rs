pub mod short_url;
pub mod storage;
