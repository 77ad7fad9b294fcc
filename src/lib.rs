//! 台股資料存取︰盤中借券費率、FinMind 券商分點、Shioaji 逐筆成交與五檔委託簿 parquet。

pub mod config;
pub mod crawler;
pub mod declare;
pub mod error;
pub mod logging;
pub mod session;
pub mod store;
pub mod util;
pub mod wrapper;

pub use error::{Error, Result};
