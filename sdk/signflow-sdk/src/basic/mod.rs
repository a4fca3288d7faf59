pub mod executor;
pub mod keypair_wallet;
pub mod session_store;
pub mod transport;
