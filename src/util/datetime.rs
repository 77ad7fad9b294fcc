use chrono::NaiveDate;

/// Convert ROC year to Gregorian year.
pub fn to_gregorian_year(year: i32) -> i32 {
    year + 1911
}

/// 民國日期字串轉成西元日期字串，例︰114/07/01 => 2025/07/01
///
/// 只替換年份，月與日原樣保留。
pub fn roc_to_gregorian(roc_date: &str) -> Option<String> {
    let mut parts = roc_date.trim().split('/');
    let year = parse_date_part::<i32>(parts.next()?)?;
    let month = parts.next()?;
    let day = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    Some(format!("{}/{}/{}", to_gregorian_year(year), month, day))
}

/// Parse a date string in the format of ROC calendar
/// and return it as a NaiveDate in the Gregorian calendar.
pub fn parse_taiwan_date(date_str: &str) -> Option<NaiveDate> {
    let gregorian = roc_to_gregorian(date_str)?;
    NaiveDate::parse_from_str(&gregorian, "%Y/%m/%d").ok()
}

/// 交易日只保留數字，例︰2026-02-11 => 20260211
pub fn digits_only(day: &str) -> String {
    day.chars().filter(char::is_ascii_digit).collect()
}

/// Try to parse a string as a date part and return it as an Option.
fn parse_date_part<T: std::str::FromStr>(date_part_str: &str) -> Option<T> {
    date_part_str.trim().parse::<T>().ok()
}
