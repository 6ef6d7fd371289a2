pub mod asset;
pub mod intent;
pub mod outbound;
pub mod price;
pub mod webhook;
