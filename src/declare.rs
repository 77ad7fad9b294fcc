/// 交易所
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockExchange {
    /// 臺灣證券交易所
    TWSE,
    /// 證券櫃檯買賣市場
    TPEx,
}

impl StockExchange {
    pub fn name(&self) -> &'static str {
        match self {
            StockExchange::TWSE => "上市",
            StockExchange::TPEx => "上櫃",
        }
    }

    pub fn iterator() -> impl Iterator<Item = Self> {
        [Self::TWSE, Self::TPEx].iter().copied()
    }
}

/// 委託簿檔案類別
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OrderBookCategory {
    /// 整股
    RegularLots,
    /// 盤中零股
    OddLots,
    /// 權證
    Warrants,
}

impl OrderBookCategory {
    /// 檔名前綴，例︰twseudp_20260211_0825_all.parquet
    pub fn file_prefix(&self, exchange: StockExchange) -> &'static str {
        match (self, exchange) {
            (OrderBookCategory::RegularLots, StockExchange::TWSE) => "twseudp",
            (OrderBookCategory::RegularLots, StockExchange::TPEx) => "otcudp",
            (OrderBookCategory::OddLots, StockExchange::TWSE) => "twse_ip5",
            (OrderBookCategory::OddLots, StockExchange::TPEx) => "otc_ip5",
            (OrderBookCategory::Warrants, StockExchange::TWSE) => "twse_warranty",
            (OrderBookCategory::Warrants, StockExchange::TPEx) => "otc_warranty",
        }
    }

    pub fn iterator() -> impl Iterator<Item = Self> {
        [Self::RegularLots, Self::OddLots, Self::Warrants]
            .iter()
            .copied()
    }
}
