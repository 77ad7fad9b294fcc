/// 盤中借券費率-上櫃
pub mod lending;

pub(crate) const HOST: &str = "tpex.org.tw";
