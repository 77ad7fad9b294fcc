//! 永豐 Shioaji 逐筆成交
//!
//! 快取以 (股票, 交易日) 為單位存成 `{security_id}_{day}.parquet`。
//! 快取檔存在時直接讀取，不檢查內容，也不會重新下載。
//! Shioaji 只提供原生 SDK，實際的 API 綁定由呼叫端以 [`TickVendor`] 提供。

use std::path::PathBuf;

use async_trait::async_trait;
use polars::{df, prelude::*};

use crate::{
    config::{self, Credentials},
    error::{Error, Result},
    logging,
    session::{Connector, SessionHandle},
    store,
};

/// 商品合約
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    pub code: String,
    pub name: String,
    pub exchange: String,
}

/// 流量使用狀況
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub connections: i64,
    pub bytes: i64,
    pub limit_bytes: i64,
    pub remaining_bytes: i64,
}

/// 某一合約單日的逐筆成交，欄位以欄為單位存放
#[derive(Debug, Clone, Default)]
pub struct Ticks {
    /// 成交時間 (奈秒)
    pub ts: Vec<i64>,
    pub close: Vec<f64>,
    pub volume: Vec<i64>,
    pub bid_price: Vec<f64>,
    pub bid_volume: Vec<i64>,
    pub ask_price: Vec<f64>,
    pub ask_volume: Vec<i64>,
    /// 1: 外盤 2: 內盤 0: 無法判定
    pub tick_type: Vec<i32>,
}

impl Ticks {
    pub fn len(&self) -> usize {
        self.ts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ts.is_empty()
    }

    /// 欄位長度不一致時回傳錯誤
    pub fn into_data_frame(self) -> Result<DataFrame> {
        Ok(df!(
            "ts" => self.ts,
            "close" => self.close,
            "volume" => self.volume,
            "bid_price" => self.bid_price,
            "bid_volume" => self.bid_volume,
            "ask_price" => self.ask_price,
            "ask_volume" => self.ask_volume,
            "tick_type" => self.tick_type,
        )?)
    }
}

/// 已登入的交易 API
#[async_trait]
pub trait TickSource: Send + Sync {
    async fn contract(&self, security_id: &str) -> Result<Contract>;

    async fn ticks(&self, contract: &Contract, day: &str) -> Result<Ticks>;

    async fn usage(&self) -> Result<Usage>;

    async fn logout(&self) -> Result<()>;
}

/// 以 key/secret 登入交易 API
#[async_trait]
pub trait TickVendor: Send + Sync + 'static {
    type Api: TickSource + 'static;

    async fn login(&self, credentials: &Credentials) -> Result<Self::Api>;
}

/// 沒有 API 綁定時使用，只能讀取既有快取
pub enum Offline {}

#[async_trait]
impl TickSource for Offline {
    async fn contract(&self, _security_id: &str) -> Result<Contract> {
        match *self {}
    }

    async fn ticks(&self, _contract: &Contract, _day: &str) -> Result<Ticks> {
        match *self {}
    }

    async fn usage(&self) -> Result<Usage> {
        match *self {}
    }

    async fn logout(&self) -> Result<()> {
        match *self {}
    }
}

#[async_trait]
impl TickVendor for Offline {
    type Api = Offline;

    async fn login(&self, _credentials: &Credentials) -> Result<Offline> {
        match *self {}
    }
}

pub struct ShioajiConnector<V: TickVendor> {
    vendor: V,
    credentials: Credentials,
}

impl<V: TickVendor> ShioajiConnector<V> {
    /// key 與 secret 必須在建立時就齊全
    pub fn new(vendor: V, settings: &config::Shioaji) -> Result<Self> {
        Ok(ShioajiConnector {
            vendor,
            credentials: settings.credentials()?,
        })
    }
}

#[async_trait]
impl<V: TickVendor> Connector for ShioajiConnector<V> {
    type Session = V::Api;

    fn name(&self) -> &'static str {
        "Shioaji"
    }

    async fn connect(&self) -> Result<V::Api> {
        self.vendor.login(&self.credentials).await
    }

    async fn disconnect(&self, session: &V::Api) -> Result<()> {
        session.logout().await
    }
}

/// 逐筆成交快取 client
pub struct TickDataClient<V: TickVendor> {
    handle: Option<SessionHandle<ShioajiConnector<V>>>,
    cache_dir: PathBuf,
}

impl<V: TickVendor> TickDataClient<V> {
    pub fn new(handle: SessionHandle<ShioajiConnector<V>>, cache_dir: PathBuf) -> Self {
        TickDataClient {
            handle: Some(handle),
            cache_dir,
        }
    }

    pub fn from_settings(
        handle: SessionHandle<ShioajiConnector<V>>,
        settings: &config::Shioaji,
    ) -> Self {
        Self::new(handle, settings.ticks_dir())
    }

    /// 沒有連線，只能讀取既有快取
    pub fn offline(cache_dir: PathBuf) -> Self {
        TickDataClient {
            handle: None,
            cache_dir,
        }
    }

    pub fn cache_path(&self, day: &str, security_id: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}_{}.parquet", security_id, day))
    }

    /// 讀取指定交易日與股票的逐筆成交，快取不存在時向供應商下載並存檔
    pub async fn get_ticks(&self, day: &str, security_id: &str) -> Result<DataFrame> {
        let path = self.cache_path(day, security_id);
        if path.exists() {
            return store::read_parquet(&path);
        }

        let api = self
            .handle
            .as_ref()
            .and_then(|h| h.session())
            .ok_or(Error::NotInitialized("Shioaji"))?;

        let contract = api.contract(security_id).await?;
        let ticks = api.ticks(&contract, day).await?;
        if ticks.is_empty() {
            logging::warn_file_async(format!("No ticks for {} {}", security_id, day));
        } else {
            logging::info_file_async(format!(
                "Downloading {} {}: {} ticks",
                security_id,
                day,
                ticks.len()
            ));
        }

        match api.usage().await {
            Ok(usage) => logging::info_file_async(format!("Shioaji usage: {:?}", usage)),
            Err(why) => {
                logging::warn_file_async(format!("Failed to get Shioaji usage because {:?}", why))
            }
        }

        let mut df = ticks.into_data_frame()?;
        store::write_parquet(&path, &mut df)?;

        Ok(df)
    }

    /// 釋放共用連線的參考，最後一個參考會登出
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

    #[derive(Default)]
    struct Counters {
        logins: AtomicUsize,
        logouts: AtomicUsize,
        downloads: AtomicUsize,
    }

    struct MockApi {
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl TickSource for MockApi {
        async fn contract(&self, security_id: &str) -> Result<Contract> {
            Ok(Contract {
                code: security_id.to_string(),
                name: "台積電".to_string(),
                exchange: "TSE".to_string(),
            })
        }

        async fn ticks(&self, _contract: &Contract, _day: &str) -> Result<Ticks> {
            self.counters.downloads.fetch_add(1, Ordering::SeqCst);
            Ok(Ticks {
                ts: vec![1_767_315_600_000_000_000, 1_767_315_601_000_000_000],
                close: vec![1050.0, 1055.0],
                volume: vec![3, 1],
                bid_price: vec![1045.0, 1050.0],
                bid_volume: vec![10, 5],
                ask_price: vec![1050.0, 1055.0],
                ask_volume: vec![7, 2],
                tick_type: vec![1, 2],
            })
        }

        async fn usage(&self) -> Result<Usage> {
            Ok(Usage::default())
        }

        async fn logout(&self) -> Result<()> {
            self.counters.logouts.fetch_add(1, Ordering::SeqCst);
            // 模擬連線已中斷
            Err(Error::NotInitialized("Shioaji"))
        }
    }

    struct MockVendor {
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl TickVendor for MockVendor {
        type Api = MockApi;

        async fn login(&self, credentials: &Credentials) -> Result<MockApi> {
            assert_eq!(credentials.api_key, "key");
            self.counters.logins.fetch_add(1, Ordering::SeqCst);
            Ok(MockApi {
                counters: Arc::clone(&self.counters),
            })
        }
    }

    fn settings() -> config::Shioaji {
        config::Shioaji {
            api_key: "key".to_string(),
            secret_key: "secret".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_download_then_cache() {
        let dir = tempfile::tempdir().unwrap();
        let counters = Arc::new(Counters::default());
        let connector = ShioajiConnector::new(
            MockVendor {
                counters: Arc::clone(&counters),
            },
            &settings(),
        )
        .unwrap();
        let pool = SessionPool::new(connector);
        let mut client = TickDataClient::new(
            pool.acquire().await.unwrap(),
            dir.path().join("ticks"),
        );

        let first = client.get_ticks("2026-01-02", "2330").await.unwrap();
        assert_eq!(first.height(), 2);
        assert!(dir.path().join("ticks").join("2330_2026-01-02.parquet").is_file());

        let second = client.get_ticks("2026-01-02", "2330").await.unwrap();
        assert!(second.equals(&first));
        assert_eq!(counters.downloads.load(Ordering::SeqCst), 1);

        // 登出失敗不會向外傳遞
        client.close().await.unwrap();
        assert_eq!(counters.logins.load(Ordering::SeqCst), 1);
        assert_eq!(counters.logouts.load(Ordering::SeqCst), 1);
        assert!(!pool.is_active().await);
    }

    #[tokio::test]
    async fn test_logout_after_last_client() {
        let counters = Arc::new(Counters::default());
        let connector = ShioajiConnector::new(
            MockVendor {
                counters: Arc::clone(&counters),
            },
            &settings(),
        )
        .unwrap();
        let pool = SessionPool::new(connector);
        let dir = tempfile::tempdir().unwrap();

        let mut first = TickDataClient::new(pool.acquire().await.unwrap(), dir.path().into());
        let mut second = TickDataClient::new(pool.acquire().await.unwrap(), dir.path().into());

        first.close().await.unwrap();
        assert_eq!(counters.logouts.load(Ordering::SeqCst), 0);
        second.close().await.unwrap();
        assert_eq!(counters.logouts.load(Ordering::SeqCst), 1);
        assert_eq!(counters.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_offline_requires_session_on_miss() {
        let dir = tempfile::tempdir().unwrap();
        let client = TickDataClient::<Offline>::offline(dir.path().to_path_buf());

        let err = client.get_ticks("2026-01-02", "2330").await.unwrap_err();
        assert!(matches!(err, Error::NotInitialized("Shioaji")));
    }

    #[tokio::test]
    async fn test_offline_reads_existing_cache() {
        let dir = tempfile::tempdir().unwrap();
        let client = TickDataClient::<MockVendor>::offline(dir.path().to_path_buf());
        let mut df = df!("ts" => [1i64], "close" => [10.5]).unwrap();
        store::write_parquet(&client.cache_path("2026-01-02", "6488"), &mut df).unwrap();

        let read = client.get_ticks("2026-01-02", "6488").await.unwrap();
        assert!(read.equals(&df));
    }

    #[test]
    fn test_missing_credentials() {
        let counters = Arc::new(Counters::default());
        let result = ShioajiConnector::new(MockVendor { counters }, &config::Shioaji::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_ticks_frame() {
        let ticks = Ticks::default();
        assert!(ticks.is_empty());
        let df = ticks.into_data_frame().unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 8);
    }

    #[test]
    fn test_ticks_length_mismatch() {
        let ticks = Ticks {
            ts: vec![1, 2],
            close: vec![1.0],
            ..Default::default()
        };
        assert!(ticks.into_data_frame().is_err());
    }
}
