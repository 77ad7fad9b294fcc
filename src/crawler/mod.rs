/// 盤中借券費率(上市+上櫃)
pub mod lending;
/// 台灣證券櫃檯買賣中心
pub mod tpex;
/// 台灣證券交易所
pub mod twse;

pub use lending::{fetch_lending_info, LendingFee};
