//! 五檔委託簿 parquet 讀取
//!
//! 檔案由其他程式預先產生，這裡只讀不寫。檔名︰`{prefix}_{YYYYMMDD}_0825_all.parquet`

use std::path::PathBuf;

use polars::prelude::*;

use crate::{
    config,
    declare::{OrderBookCategory, StockExchange},
    error::{Error, Result},
    store,
    util::datetime,
};

const MATCH_TIME: &str = "match_time";
const STOCK_CODE: &str = "stock_code";
const MATCH_TIME_MAX: i64 = 999_999_999_999;
/// 轉換失敗時 polars 錯誤訊息的前綴，後接原始數值
const MATCH_TIME_ERROR: &str = "match_time out of range: ";

/// 讀取結果，依呼叫端要求回傳已計算或尚未計算的查詢
pub enum Frame {
    Eager(DataFrame),
    Lazy(LazyFrame),
}

impl Frame {
    pub fn is_lazy(&self) -> bool {
        matches!(self, Frame::Lazy(_))
    }

    pub fn collect(self) -> Result<DataFrame> {
        match self {
            Frame::Eager(df) => Ok(df),
            Frame::Lazy(lf) => lf.collect().map_err(from_polars),
        }
    }
}

pub struct OrderBookReader {
    base: PathBuf,
}

impl OrderBookReader {
    pub fn new(base: PathBuf) -> Self {
        OrderBookReader { base }
    }

    pub fn from_settings(settings: &config::OrderBook) -> Self {
        Self::new(settings.parquet_dir())
    }

    /// day 可為 2026-02-11 或 20260211
    pub fn path(&self, category: OrderBookCategory, day: &str, exchange: StockExchange) -> PathBuf {
        self.base.join(format!(
            "{}_{}_0825_all.parquet",
            category.file_prefix(exchange),
            datetime::digits_only(day)
        ))
    }

    /// 整股委託簿，security_id 為 None 時回傳當日全部股票
    pub fn read_regular_lots(
        &self,
        day: &str,
        exchange: StockExchange,
        security_id: Option<&str>,
        lazy: bool,
    ) -> Result<Frame> {
        self.read(OrderBookCategory::RegularLots, day, exchange, security_id, lazy)
    }

    /// 盤中零股委託簿
    pub fn read_odd_lots(
        &self,
        day: &str,
        exchange: StockExchange,
        security_id: Option<&str>,
        lazy: bool,
    ) -> Result<Frame> {
        self.read(OrderBookCategory::OddLots, day, exchange, security_id, lazy)
    }

    /// 權證委託簿，不提供個股過濾
    pub fn read_warrants(&self, day: &str, exchange: StockExchange, lazy: bool) -> Result<Frame> {
        self.read(OrderBookCategory::Warrants, day, exchange, None, lazy)
    }

    fn read(
        &self,
        category: OrderBookCategory,
        day: &str,
        exchange: StockExchange,
        security_id: Option<&str>,
        lazy: bool,
    ) -> Result<Frame> {
        let path = self.path(category, day, exchange);
        if !path.is_file() {
            return Err(Error::FileNotFound(path));
        }

        let mut lf = store::scan_parquet(&path)?;
        if let Some(security_id) = security_id {
            lf = lf.filter(col(STOCK_CODE).eq(lit(security_id)));
        }
        let lf = lf.with_column(match_time_expr());

        if lazy {
            Ok(Frame::Lazy(lf))
        } else {
            Ok(Frame::Eager(lf.collect().map_err(from_polars)?))
        }
    }
}

fn match_time_expr() -> Expr {
    col(MATCH_TIME)
        .map(format_match_time_column, GetOutput::from_type(DataType::String))
        .alias(MATCH_TIME)
}

fn format_match_time_column(column: Column) -> PolarsResult<Option<Column>> {
    let ints = column.strict_cast(&DataType::Int64)?;
    let values = ints
        .i64()?
        .into_iter()
        .map(|v| v.map(format_match_time).transpose())
        .collect::<Result<Vec<Option<String>>>>()
        .map_err(|why| match why {
            Error::MatchTime(value) => {
                PolarsError::ComputeError(format!("{}{}", MATCH_TIME_ERROR, value).into())
            }
            other => PolarsError::ComputeError(other.to_string().into()),
        })?;

    let ca: StringChunked = values.into_iter().collect();
    Ok(Some(ca.with_name(column.name().clone()).into_series().into()))
}

/// match_time 轉換失敗時還原成 [`Error::MatchTime`]，其餘維持 polars 錯誤
fn from_polars(err: PolarsError) -> Error {
    let text = err.to_string();
    let value = text
        .find(MATCH_TIME_ERROR)
        .map(|at| &text[at + MATCH_TIME_ERROR.len()..])
        .and_then(|rest| {
            let end = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '-'))
                .unwrap_or(rest.len());
            rest[..end].parse::<i64>().ok()
        });

    match value {
        Some(value) => Error::MatchTime(value),
        None => Error::Polars(err),
    }
}

/// 12 位數的成交時間轉成 `HH:MM:SS.ffffff`，例︰82500000123 => 08:25:00.000123
pub fn format_match_time(value: i64) -> Result<String> {
    if !(0..=MATCH_TIME_MAX).contains(&value) {
        return Err(Error::MatchTime(value));
    }

    let s = format!("{:012}", value);
    Ok(format!("{}:{}:{}.{}", &s[0..2], &s[2..4], &s[4..6], &s[6..]))
}
