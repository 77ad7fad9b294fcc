use std::collections::HashMap;

use chrono::NaiveDate;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    crawler::{lending, lending::LendingFee, tpex},
    error::{Error, Result},
    util,
};

#[derive(Deserialize, Debug)]
struct LendingResponse {
    #[serde(default)]
    pub tables: Vec<Table>,
}

#[derive(Deserialize, Debug)]
struct Table {
    pub data: Option<Vec<Vec<Value>>>,
}

/// 抓取上櫃股票盤中借券成交資訊
pub async fn visit(date: NaiveDate) -> Result<Vec<LendingFee>> {
    visit_from(&format!("https://www.{}", tpex::HOST), date).await
}

/// `base` 為站台位址，例︰https://www.tpex.org.tw
pub(crate) async fn visit_from(base: &str, date: NaiveDate) -> Result<Vec<LendingFee>> {
    let url = format!("{}/www/zh-tw/intraday/fee", base);
    let date_param = date.format("%Y/%m/%d").to_string();

    let mut params = HashMap::with_capacity(3);
    params.insert("date", date_param.as_str());
    params.insert("id", "");
    params.insert("response", "json");

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded; charset=UTF-8"),
    );

    let response = util::http::post_form_json::<LendingResponse>(&url, Some(headers), params)
        .await
        .map_err(|why| Error::remote(&url, format!("{:#}", why)))?;

    rows(&url, response)
}

fn rows(url: &str, response: LendingResponse) -> Result<Vec<LendingFee>> {
    let data = response
        .tables
        .into_iter()
        .next()
        .and_then(|table| table.data)
        .ok_or_else(|| Error::remote(url, "missing tables[0].data"))?;

    data.iter()
        .map(|row| lending::parse_row(url, row, false, false))
        .collect()
}
