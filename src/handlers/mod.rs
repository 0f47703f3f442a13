mod extract;
mod health;
mod keys;
mod network;

pub use extract::ApiJson;
pub use health::ping;
pub use keys::service_key;
pub use network::{client_ip, wan_update};
