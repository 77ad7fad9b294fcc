use std::{env, path::PathBuf};

use config::{Config as config_config, File as config_file};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    logging,
};

const CONFIG_PATH: &str = "app.json";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct App {
    #[serde(default)]
    pub finmind: FinMind,
    #[serde(default)]
    pub shioaji: Shioaji,
    #[serde(default)]
    pub order_book: OrderBook,
}

const FINMIND_API_TOKEN: &str = "FINMIND_API_TOKEN";
const DATA_SDK_FINMIND_BROKER_PATH: &str = "DATA_SDK_FINMIND_BROKER_PATH";

/// FinMind 券商分點
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct FinMind {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub broker_path: String,
}

impl FinMind {
    /// 未設定 token 時回傳 None，連線以未登入狀態進行
    pub fn token(&self) -> Option<String> {
        if self.token.is_empty() {
            None
        } else {
            Some(self.token.clone())
        }
    }

    pub fn broker_dir(&self) -> PathBuf {
        resolve_dir(&self.broker_path, DATA_SDK_FINMIND_BROKER_PATH)
    }
}

const SHIOAJI_API_KEY: &str = "SHIOAJI_API_KEY";
const SHIOAJI_SECRET_KEY: &str = "SHIOAJI_SECRET_KEY";
const SHIOAJI_SIMULATION: &str = "SHIOAJI_SIMULATION";
const DATA_SDK_SHIOAJI_TICKS_PATH: &str = "DATA_SDK_SHIOAJI_TICKS_PATH";

/// 永豐 Shioaji 逐筆成交
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct Shioaji {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub simulation: bool,
    #[serde(default)]
    pub ticks_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub simulation: bool,
}

impl Shioaji {
    /// 登入需要 key 與 secret，缺一即回傳錯誤
    pub fn credentials(&self) -> Result<Credentials> {
        if self.api_key.is_empty() {
            return Err(Error::Config(format!("{} is not set", SHIOAJI_API_KEY)));
        }

        if self.secret_key.is_empty() {
            return Err(Error::Config(format!("{} is not set", SHIOAJI_SECRET_KEY)));
        }

        Ok(Credentials {
            api_key: self.api_key.clone(),
            secret_key: self.secret_key.clone(),
            simulation: self.simulation,
        })
    }

    pub fn ticks_dir(&self) -> PathBuf {
        resolve_dir(&self.ticks_path, DATA_SDK_SHIOAJI_TICKS_PATH)
    }
}

const DATA_SDK_ORDER_BOOK_PARQUET_PATH: &str = "DATA_SDK_ORDER_BOOK_PARQUET_PATH";

/// 五檔委託簿 parquet
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct OrderBook {
    #[serde(default)]
    pub parquet_path: String,
}

impl OrderBook {
    pub fn parquet_dir(&self) -> PathBuf {
        resolve_dir(&self.parquet_path, DATA_SDK_ORDER_BOOK_PARQUET_PATH)
    }
}

pub static SETTINGS: Lazy<App> = Lazy::new(|| {
    App::get().unwrap_or_else(|why| {
        logging::error_file_async(format!("I can't read the config context because {:?}", why));
        App::from_env()
    })
});

impl App {
    /// 有設定檔時讀取設定檔，再以 env 覆蓋；否則全部取自 env
    pub fn get() -> Result<Self> {
        let config_path = config_path();
        if config_path.exists() {
            let config: App = config_config::builder()
                .add_source(config_file::from(config_path))
                .build()?
                .try_deserialize()?;
            return Ok(config.override_with_env());
        }

        Ok(App::from_env())
    }

    /// 從 env 中讀取設定值
    pub fn from_env() -> Self {
        App::default().override_with_env()
    }

    /// 將來至於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with_env(mut self) -> Self {
        if let Ok(token) = env::var(FINMIND_API_TOKEN) {
            self.finmind.token = token;
        }

        if let Ok(path) = env::var(DATA_SDK_FINMIND_BROKER_PATH) {
            self.finmind.broker_path = path;
        }

        if let Ok(key) = env::var(SHIOAJI_API_KEY) {
            self.shioaji.api_key = key;
        }

        if let Ok(secret) = env::var(SHIOAJI_SECRET_KEY) {
            self.shioaji.secret_key = secret;
        }

        if let Ok(simulation) = env::var(SHIOAJI_SIMULATION) {
            self.shioaji.simulation = matches!(simulation.to_lowercase().as_str(), "1" | "true");
        }

        if let Ok(path) = env::var(DATA_SDK_SHIOAJI_TICKS_PATH) {
            self.shioaji.ticks_path = path;
        }

        if let Ok(path) = env::var(DATA_SDK_ORDER_BOOK_PARQUET_PATH) {
            self.order_book.parquet_path = path;
        }

        self
    }
}

/// 路徑未設定時記錄警告並使用目前目錄
pub(crate) fn resolve_dir(path: &str, name: &str) -> PathBuf {
    if path.is_empty() {
        logging::warn_file_async(format!("{} not set. Using current directory.", name));
        return PathBuf::from(".");
    }

    PathBuf::from(path)
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}
