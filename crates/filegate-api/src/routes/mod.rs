pub mod policy;
pub mod upload;
