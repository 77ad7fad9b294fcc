/// 盤中借券費率-上市
pub mod lending;

pub(crate) const HOST: &str = "twse.com.tw";
