use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    crawler::{lending, lending::LendingFee, twse},
    error::{Error, Result},
    util,
};

/// 當日無資料時不會有 data 欄位
#[derive(Deserialize, Debug)]
struct LendingResponse {
    pub stat: Option<String>,
    pub data: Option<Vec<Vec<Value>>>,
}

/// 抓取上市股票盤中借券成交資訊
pub async fn visit(date: NaiveDate) -> Result<Vec<LendingFee>> {
    visit_from(&format!("https://www.{}", twse::HOST), date).await
}

/// `base` 為站台位址，例︰https://www.twse.com.tw
pub(crate) async fn visit_from(base: &str, date: NaiveDate) -> Result<Vec<LendingFee>> {
    let url = format!(
        "{base}/rwd/zh/dayTrading/BFIF8U?date={date}&response=json",
        date = date.format("%Y%m%d")
    );

    let response = util::http::get_json::<LendingResponse>(&url)
        .await
        .map_err(|why| Error::remote(&url, format!("{:#}", why)))?;

    rows(&url, response)
}

fn rows(url: &str, response: LendingResponse) -> Result<Vec<LendingFee>> {
    let data = response.data.ok_or_else(|| {
        Error::remote(
            url,
            format!("missing data, stat: {}", response.stat.unwrap_or_default()),
        )
    })?;

    data.iter()
        .map(|row| lending::parse_row(url, row, true, true))
        .collect()
}
