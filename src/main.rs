#[cfg(all(target_os = "linux", target_env = "musl"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::env;

use chrono::NaiveDate;
use tw_data_sdk::{
    config::SETTINGS,
    crawler,
    declare::StockExchange,
    logging,
    session::SessionPool,
    wrapper::{
        broker::{BrokerReportClient, FinMindConnector},
        order_book::OrderBookReader,
        ticks::{Offline, TickDataClient},
    },
    Error, Result,
};

const USAGE: &str = "usage: tw_data_sdk <lending YYYY-MM-DD | broker DAY SID | order-book DAY SID | ticks DAY SID>";

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let result = match args.iter().map(String::as_str).collect::<Vec<&str>>().as_slice() {
        ["lending", date] => lending(date).await,
        ["broker", day, sid] => broker(day, sid).await,
        ["order-book", day, sid] => order_book(day, sid),
        ["ticks", day, sid] => ticks(day, sid).await,
        _ => {
            logging::info_console(USAGE.to_string());
            Ok(())
        }
    };

    if let Err(why) = result {
        logging::error_console(format!("{}", why));
        logging::error_file_async(format!("{:?}", why));
        std::process::exit(1);
    }
}

async fn lending(date: &str) -> Result<()> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|why| Error::Config(format!("invalid date '{}': {}", date, why)))?;
    let rows = crawler::fetch_lending_info(date).await?;
    let df = crawler::lending::into_data_frame(&rows)?;
    logging::info_console(format!("lending {}: {:?}\n{}", date, df.shape(), df.head(Some(10))));

    Ok(())
}

async fn broker(day: &str, sid: &str) -> Result<()> {
    let pool = SessionPool::new(FinMindConnector::new(&SETTINGS.finmind));
    let mut client = BrokerReportClient::from_settings(pool.acquire().await?, &SETTINGS.finmind);
    let result = client.get_broker_report(day, sid).await;
    client.close().await?;

    let df = result?;
    logging::info_console(format!("broker {} {}: {:?}\n{}", day, sid, df.shape(), df.head(Some(10))));

    Ok(())
}

fn order_book(day: &str, sid: &str) -> Result<()> {
    let reader = OrderBookReader::from_settings(&SETTINGS.order_book);

    let stocks = reader
        .read_regular_lots(day, StockExchange::TWSE, Some(sid), false)?
        .collect()?;
    logging::info_console(format!("order book stocks: {:?}\n{}", stocks.shape(), stocks.head(Some(5))));

    let odd_lots = reader
        .read_odd_lots(day, StockExchange::TWSE, Some(sid), false)?
        .collect()?;
    logging::info_console(format!("order book odd lots: {:?}\n{}", odd_lots.shape(), odd_lots.head(Some(5))));

    let warrants = reader.read_warrants(day, StockExchange::TWSE, false)?.collect()?;
    logging::info_console(format!("order book warrants: {:?}\n{}", warrants.shape(), warrants.head(Some(5))));

    Ok(())
}

/// 執行檔沒有 Shioaji 原生綁定，只能讀取已存在的快取
async fn ticks(day: &str, sid: &str) -> Result<()> {
    let client = TickDataClient::<Offline>::offline(SETTINGS.shioaji.ticks_dir());
    let df = client.get_ticks(day, sid).await?;
    logging::info_console(format!("ticks {} {}: {:?}\n{}", day, sid, df.shape(), df.head(Some(10))));

    Ok(())
}
