//! FinMind 券商分點進出
//!
//! 每個交易日的全市場資料只下載一次並存成 `{day}.parquet`，之後的查詢都從快取檔讀取。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use polars::{df, prelude::*};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::{
    config,
    error::{Error, Result},
    logging,
    session::{Connector, SessionHandle},
    store, util,
};

const FINMIND_API: &str = "https://api.finmindtrade.com/api/v4";
const DATASET: &str = "taiwan_stock_trading_daily_report";

/// 券商分點資料來源
#[async_trait]
pub trait BrokerReportSource: Send + Sync {
    /// 下載指定交易日全市場的券商分點資料，查無資料時回傳 `None`
    async fn trading_daily_report(&self, day: &str) -> Result<Option<DataFrame>>;
}

/// 建立 FinMind 連線，有 token 時以 token 登入
pub struct FinMindConnector {
    token: Option<String>,
}

impl FinMindConnector {
    pub fn new(settings: &config::FinMind) -> Self {
        FinMindConnector {
            token: settings.token(),
        }
    }
}

#[async_trait]
impl Connector for FinMindConnector {
    type Session = FinMind;

    fn name(&self) -> &'static str {
        "FinMind"
    }

    async fn connect(&self) -> Result<FinMind> {
        let finmind = FinMind {
            token: self.token.clone(),
        };
        if !finmind.is_authenticated() {
            logging::warn_file_async("FINMIND_API_TOKEN not set. Download may fail.".to_string());
        }

        Ok(finmind)
    }
}

/// FinMind REST API v4
pub struct FinMind {
    token: Option<String>,
}

#[derive(Deserialize, Debug)]
struct FinMindResponse<T> {
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub status: i64,
    pub data: Option<Vec<T>>,
}

#[derive(Deserialize, Debug)]
struct TradingDailyReport {
    #[serde(default)]
    pub securities_trader: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub buy: i64,
    #[serde(default)]
    pub sell: i64,
    #[serde(default)]
    pub securities_trader_id: String,
    #[serde(default)]
    pub stock_id: String,
    #[serde(default)]
    pub date: String,
}

impl FinMind {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn headers(&self) -> Result<Option<HeaderMap>> {
        let Some(token) = &self.token else {
            return Ok(None);
        };

        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|why| Error::Config(format!("invalid FinMind token: {}", why)))?;
        headers.insert(header::AUTHORIZATION, value);

        Ok(Some(headers))
    }
}

#[async_trait]
impl BrokerReportSource for FinMind {
    async fn trading_daily_report(&self, day: &str) -> Result<Option<DataFrame>> {
        let url = format!("{}/{}?date={}", FINMIND_API, DATASET, day);
        let response = util::http::get_json_with_headers::<FinMindResponse<TradingDailyReport>>(
            &url,
            self.headers()?,
        )
        .await
        .map_err(|why| Error::download(day, format!("{:#}", why)))?;

        if response.status != 200 {
            return Err(Error::download(
                day,
                format!("FinMind status {}: {}", response.status, response.msg),
            ));
        }

        match response.data {
            Some(rows) if !rows.is_empty() => Ok(Some(reports_to_frame(&rows)?)),
            _ => Ok(None),
        }
    }
}

fn reports_to_frame(rows: &[TradingDailyReport]) -> PolarsResult<DataFrame> {
    df!(
        "securities_trader" => rows.iter().map(|r| r.securities_trader.as_str()).collect::<Vec<&str>>(),
        "price" => rows.iter().map(|r| r.price).collect::<Vec<f64>>(),
        "buy" => rows.iter().map(|r| r.buy).collect::<Vec<i64>>(),
        "sell" => rows.iter().map(|r| r.sell).collect::<Vec<i64>>(),
        "securities_trader_id" => rows.iter().map(|r| r.securities_trader_id.as_str()).collect::<Vec<&str>>(),
        "stock_id" => rows.iter().map(|r| r.stock_id.as_str()).collect::<Vec<&str>>(),
        "date" => rows.iter().map(|r| r.date.as_str()).collect::<Vec<&str>>(),
    )
}

/// 券商分點快取 client
pub struct BrokerReportClient<C: Connector>
where
    C::Session: BrokerReportSource,
{
    handle: Option<SessionHandle<C>>,
    cache_dir: PathBuf,
}

impl<C: Connector> BrokerReportClient<C>
where
    C::Session: BrokerReportSource,
{
    pub fn new(handle: SessionHandle<C>, cache_dir: PathBuf) -> Self {
        BrokerReportClient {
            handle: Some(handle),
            cache_dir,
        }
    }

    pub fn from_settings(handle: SessionHandle<C>, settings: &config::FinMind) -> Self {
        Self::new(handle, settings.broker_dir())
    }

    pub fn cache_path(&self, day: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.parquet", day))
    }

    /// 讀取指定交易日與股票的券商分點資料，快取不存在時先下載整日資料
    pub async fn get_broker_report(&self, day: &str, security_id: &str) -> Result<DataFrame> {
        let path = self.cache_path(day);
        if !path.is_file() {
            self.download(day, &path)
                .await
                .map_err(|why| Error::CacheMiss {
                    path: path.clone(),
                    source: Box::new(why),
                })?;
        }

        let df = store::scan_parquet(&path)?
            .filter(col("stock_id").eq(lit(security_id)))
            .collect()?;

        Ok(df)
    }

    async fn download(&self, day: &str, path: &Path) -> Result<()> {
        let source = self
            .handle
            .as_ref()
            .and_then(|h| h.session())
            .ok_or(Error::NotInitialized("FinMind"))?;

        logging::info_file_async(format!("[{}] Downloading broker data...", day));
        let mut df = match source.trading_daily_report(day).await? {
            Some(df) if df.height() > 0 => df,
            _ => return Err(Error::download(day, format!("Empty result for {}", day))),
        };

        store::write_parquet(path, &mut df)?;
        logging::info_file_async(format!("[{}] saved {}", day, path.display()));

        Ok(())
    }

    /// 釋放共用連線的參考
    pub async fn close(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle.close().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use crate::session::SessionPool;

    use super::*;

    struct MockSource {
        fetches: Arc<AtomicUsize>,
        empty: bool,
    }

    #[async_trait]
    impl BrokerReportSource for MockSource {
        async fn trading_daily_report(&self, day: &str) -> Result<Option<DataFrame>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                return Ok(None);
            }

            Ok(Some(df!(
                "securities_trader" => ["凱基", "元大", "富邦"],
                "price" => [1050.0, 1055.0, 98.5],
                "buy" => [1000i64, 0, 3000],
                "sell" => [0i64, 2000, 0],
                "securities_trader_id" => ["9200", "9800", "9600"],
                "stock_id" => ["2330", "2330", "2317"],
                "date" => [day, day, day],
            )?))
        }
    }

    struct MockConnector {
        fetches: Arc<AtomicUsize>,
        empty: bool,
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Session = MockSource;

        fn name(&self) -> &'static str {
            "mock-finmind"
        }

        async fn connect(&self) -> Result<MockSource> {
            Ok(MockSource {
                fetches: Arc::clone(&self.fetches),
                empty: self.empty,
            })
        }
    }

    async fn client(
        dir: &Path,
        empty: bool,
    ) -> (BrokerReportClient<MockConnector>, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let pool = SessionPool::new(MockConnector {
            fetches: Arc::clone(&fetches),
            empty,
        });
        let handle = pool.acquire().await.unwrap();
        (BrokerReportClient::new(handle, dir.to_path_buf()), fetches)
    }

    #[tokio::test]
    async fn test_cache_miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, fetches) = client(dir.path(), false).await;

        let first = client.get_broker_report("2026-01-02", "2330").await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first.height(), 2);
        assert!(client.cache_path("2026-01-02").is_file());

        let second = client.get_broker_report("2026-01-02", "2317").await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(second.height(), 1);

        // 快取檔保存的是未過濾的整日資料
        let full = store::read_parquet(&client.cache_path("2026-01-02")).unwrap();
        assert_eq!(full.height(), 3);

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_result_is_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let (client, fetches) = client(dir.path(), true).await;

        let err = client
            .get_broker_report("2026-01-03", "2330")
            .await
            .unwrap_err();

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        match err {
            Error::CacheMiss { path, source } => {
                assert_eq!(path, client.cache_path("2026-01-03"));
                assert!(matches!(*source, Error::Download { .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_closed_client_reads_cache_only() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, _) = client(dir.path(), false).await;
        client.get_broker_report("2026-01-02", "2330").await.unwrap();
        client.close().await.unwrap();

        assert_eq!(
            client.get_broker_report("2026-01-02", "2330").await.unwrap().height(),
            2
        );
        let err = client.get_broker_report("2026-01-05", "2330").await.unwrap_err();
        match err {
            Error::CacheMiss { source, .. } => {
                assert!(matches!(*source, Error::NotInitialized(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_finmind_connect() {
        let anonymous = FinMindConnector::new(&config::FinMind::default());
        let session = anonymous.connect().await.unwrap();
        assert!(!session.is_authenticated());
        assert!(session.headers().unwrap().is_none());

        let connector = FinMindConnector::new(&config::FinMind {
            token: "abc".to_string(),
            ..Default::default()
        });
        let session = connector.connect().await.unwrap();
        assert!(session.is_authenticated());
        let headers = session.headers().unwrap().unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn test_parse_finmind_response() {
        let body = r#"{
            "msg": "success",
            "status": 200,
            "data": [
                {"securities_trader": "凱基", "price": 1050.0, "buy": 1000, "sell": 0,
                 "securities_trader_id": "9200", "stock_id": "2330", "date": "2026-01-02"}
            ]
        }"#;
        let response: FinMindResponse<TradingDailyReport> = serde_json::from_str(body).unwrap();
        let rows = response.data.unwrap();
        let df = reports_to_frame(&rows).unwrap();

        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), 7);
        assert!(df.column("stock_id").is_ok());
    }

    #[tokio::test]
    #[ignore]
    async fn test_finmind_download() {
        dotenv::dotenv().ok();
        let settings = config::App::from_env();
        let pool = SessionPool::new(FinMindConnector::new(&settings.finmind));
        let handle = pool.acquire().await.unwrap();
        let mut client = BrokerReportClient::from_settings(handle, &settings.finmind);

        match client.get_broker_report("2026-01-02", "2330").await {
            Ok(df) => logging::debug_file_async(format!("broker: {:?}", df.shape())),
            Err(why) => logging::debug_file_async(format!("Failed to get broker because {:?}", why)),
        }

        client.close().await.unwrap();
    }
}
