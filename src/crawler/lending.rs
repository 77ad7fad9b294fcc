//! 盤中借券費率
//!
//! 證交所與櫃買中心各自提供當日盤中借券成交資訊，欄位順序相同︰
//! 日期(民國)、證券代號、證券名稱、成交數量、費率。

use chrono::NaiveDate;
use polars::{df, prelude::*};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::{
    crawler::{tpex, twse},
    declare::StockExchange,
    error::{Error, Result},
    logging,
    util::{datetime, text},
};

/// 每列固定五個欄位
pub(crate) const COLUMNS: [&str; 5] = [
    "date",
    "symbol",
    "stock_name",
    "lending_quantity",
    "lending_fee",
];

#[derive(Debug, Clone, PartialEq)]
pub struct LendingFee {
    pub date: NaiveDate,
    /// 證券代號
    pub symbol: String,
    pub stock_name: String,
    /// 成交數量(股)
    pub lending_quantity: i64,
    /// 費率，以小數表示 (1.5% => 0.015)
    pub lending_fee: Decimal,
}

/// 取得指定日期上市與上櫃的盤中借券費率，上市在前、上櫃在後
///
/// 任一市場失敗即整體失敗，不回傳部分結果。
pub async fn fetch_lending_info(date: NaiveDate) -> Result<Vec<LendingFee>> {
    fetch_lending_info_from(
        &format!("https://www.{}", twse::HOST),
        &format!("https://www.{}", tpex::HOST),
        date,
    )
    .await
}

pub(crate) async fn fetch_lending_info_from(
    twse_base: &str,
    tpex_base: &str,
    date: NaiveDate,
) -> Result<Vec<LendingFee>> {
    let otc = tpex::lending::visit_from(tpex_base, date).await?;
    let listed = twse::lending::visit_from(twse_base, date).await?;

    logging::info_file_async(format!(
        "lending info {}: {} {} rows, {} {} rows",
        date,
        StockExchange::TWSE.name(),
        listed.len(),
        StockExchange::TPEx.name(),
        otc.len()
    ));

    Ok(merge(listed, otc))
}

pub(crate) fn merge(mut listed: Vec<LendingFee>, otc: Vec<LendingFee>) -> Vec<LendingFee> {
    listed.reserve(otc.len());
    listed.extend(otc);
    listed
}

/// 轉成 polars DataFrame，費率欄位為 f64
pub fn into_data_frame(rows: &[LendingFee]) -> PolarsResult<DataFrame> {
    df!(
        COLUMNS[0] => rows.iter().map(|r| r.date).collect::<Vec<NaiveDate>>(),
        COLUMNS[1] => rows.iter().map(|r| r.symbol.as_str()).collect::<Vec<&str>>(),
        COLUMNS[2] => rows.iter().map(|r| r.stock_name.as_str()).collect::<Vec<&str>>(),
        COLUMNS[3] => rows.iter().map(|r| r.lending_quantity).collect::<Vec<i64>>(),
        COLUMNS[4] => rows
            .iter()
            .map(|r| r.lending_fee.to_f64().unwrap_or_default())
            .collect::<Vec<f64>>(),
    )
}

/// JSON 欄位可能是字串也可能是數字
pub(crate) fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 依欄位位置解析一列資料
///
/// * `trim_symbol`: 證券代號去除前後空白
/// * `percent_suffix`: 費率可能帶有 `%` 後綴
pub(crate) fn parse_row(
    url: &str,
    row: &[Value],
    trim_symbol: bool,
    percent_suffix: bool,
) -> Result<LendingFee> {
    if row.len() != COLUMNS.len() {
        return Err(Error::remote(
            url,
            format!("expected {} columns but got {}: {:?}", COLUMNS.len(), row.len(), row),
        ));
    }

    let cells = row
        .iter()
        .map(cell_text)
        .collect::<Option<Vec<String>>>()
        .ok_or_else(|| Error::remote(url, format!("unexpected cell type in {:?}", row)))?;

    let date = datetime::parse_taiwan_date(&cells[0])
        .ok_or_else(|| Error::remote(url, format!("invalid ROC date '{}'", cells[0])))?;

    let symbol = if trim_symbol {
        cells[1].trim().to_string()
    } else {
        cells[1].clone()
    };

    let lending_quantity =
        text::parse_i64(&cells[3], None).map_err(|why| Error::remote(url, why))?;

    let escape = if percent_suffix { Some(vec!['%']) } else { None };
    let lending_fee = text::parse_decimal(&cells[4], escape)
        .map_err(|why| Error::remote(url, why))?
        / dec!(100);

    Ok(LendingFee {
        date,
        symbol,
        stock_name: cells[2].clone(),
        lending_quantity,
        lending_fee,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::util::http::tests::{serve_response, serve_status};

    use super::*;

    fn fee(symbol: &str) -> LendingFee {
        LendingFee {
            date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            symbol: symbol.to_string(),
            stock_name: "名稱".to_string(),
            lending_quantity: 1000,
            lending_fee: dec!(0.015),
        }
    }

    #[test]
    fn test_merge_keeps_listed_first() {
        let listed = vec![fee("2330"), fee("2317")];
        let otc = vec![fee("6488"), fee("5347"), fee("3105")];

        let merged = merge(listed, otc);

        assert_eq!(merged.len(), 5);
        let symbols: Vec<&str> = merged.iter().map(|f| f.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["2330", "2317", "6488", "5347", "3105"]);
    }

    #[test]
    fn test_parse_row() {
        let row = vec![
            json!("114/07/01"),
            json!(" 2330 "),
            json!("台積電"),
            json!("1,234,000"),
            json!("1.50%"),
        ];

        let parsed = parse_row("twse", &row, true, true).unwrap();

        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(parsed.symbol, "2330");
        assert_eq!(parsed.stock_name, "台積電");
        assert_eq!(parsed.lending_quantity, 1_234_000);
        assert_eq!(parsed.lending_fee, dec!(0.015));
    }

    #[test]
    fn test_parse_row_accepts_numbers() {
        let row = vec![
            json!("113/01/02"),
            json!("6488"),
            json!("環球晶"),
            json!(5000),
            json!(3.5),
        ];

        let parsed = parse_row("tpex", &row, false, false).unwrap();

        assert_eq!(parsed.lending_quantity, 5000);
        assert_eq!(parsed.lending_fee, dec!(0.035));
    }

    #[test]
    fn test_parse_row_rejects_malformed() {
        let short = vec![json!("114/07/01"), json!("2330")];
        assert!(matches!(
            parse_row("twse", &short, true, true),
            Err(Error::Remote { .. })
        ));

        let bad_date = vec![
            json!("2025-07-01"),
            json!("2330"),
            json!("台積電"),
            json!("1,000"),
            json!("1.5"),
        ];
        assert!(matches!(
            parse_row("twse", &bad_date, true, true),
            Err(Error::Remote { .. })
        ));

        let percent_not_allowed = vec![
            json!("114/07/01"),
            json!("6488"),
            json!("環球晶"),
            json!("1,000"),
            json!("1.5%"),
        ];
        assert!(parse_row("tpex", &percent_not_allowed, false, false).is_err());
    }

    #[test]
    fn test_fee_is_fraction() {
        for raw in ["0", "0.01", "12.5", "50%", "99.99%"] {
            let row = vec![
                json!("114/07/01"),
                json!("2330"),
                json!("台積電"),
                json!("1"),
                json!(raw),
            ];
            let parsed = parse_row("twse", &row, true, true).unwrap();
            assert!(parsed.lending_fee >= Decimal::ZERO && parsed.lending_fee < Decimal::ONE);
        }
    }

    #[test]
    fn test_into_data_frame() {
        let df = into_data_frame(&[fee("2330"), fee("6488")]).unwrap();

        assert_eq!(df.height(), 2);
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, COLUMNS.to_vec());
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
        assert_eq!(df.column("lending_fee").unwrap().dtype(), &DataType::Float64);
    }

    #[tokio::test]
    async fn test_fetch_fails_when_one_exchange_fails() {
        let failing = serve_status("503 Service Unavailable").await;
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();

        // 上櫃失敗時整體失敗，不回傳上市部分
        let result = fetch_lending_info_from("http://127.0.0.1:9", &failing, date).await;
        match result {
            Err(Error::Remote { url, .. }) => assert!(url.starts_with(&failing)),
            other => panic!("expected Remote error, got {:?}", other),
        }

        // 上櫃成功但上市失敗亦同
        let otc = serve_response(
            "200 OK",
            r#"{"tables":[{"data":[["114/07/01","6488","環球晶","3,000","2.5"]]}]}"#,
        )
        .await;
        assert_eq!(tpex::lending::visit_from(&otc, date).await.unwrap().len(), 1);
        let result = fetch_lending_info_from(&failing, &otc, date).await;
        match result {
            Err(Error::Remote { url, .. }) => assert!(url.starts_with(&failing)),
            other => panic!("expected Remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch_lending_info() {
        dotenv::dotenv().ok();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        match fetch_lending_info(date).await {
            Ok(list) => {
                logging::debug_file_async(format!("total {} rows", list.len()));
            }
            Err(why) => {
                logging::debug_file_async(format!("Failed to fetch_lending_info because {:?}", why));
            }
        }
    }
}
