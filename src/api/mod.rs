pub mod client;
pub mod response;
pub mod types;

pub use client::AuthApi;
pub use response::ApiError;
