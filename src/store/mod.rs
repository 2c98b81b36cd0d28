pub mod db;
pub mod tables;

pub use db::{StoreError, TokenStore};
