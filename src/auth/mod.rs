pub mod extractors;
pub mod password;
pub mod session;
