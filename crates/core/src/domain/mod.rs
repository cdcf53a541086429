pub mod deal;
pub mod order;
pub mod period;
pub mod redemption;
