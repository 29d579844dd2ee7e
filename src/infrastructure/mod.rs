pub mod binance;
pub mod signer;
pub mod transport;
