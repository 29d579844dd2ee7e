pub mod alert;
pub mod dca;
pub mod order;
pub mod price;
