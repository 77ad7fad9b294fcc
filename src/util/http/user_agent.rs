use rand::Rng;

const CHROME_VERSIONS: [&str; 12] = [
    "133.0.6943.60", "133.0.6943.88", "132.0.6834.83", "132.0.6834.110", "131.0.6778.85",
    "131.0.6778.108", "130.0.6723.92", "130.0.6723.117", "129.0.6668.70", "129.0.6668.89",
    "128.0.6613.120", "128.0.6613.138",
];

const FIREFOX_VERSIONS: [&str; 8] = [
    "133.0", "132.0", "131.0", "130.0", "129.0", "128.0", "127.0", "126.0",
];

const EDGE_VERSIONS: [&str; 6] = [
    "133.0.3048.56", "133.0.3048.46", "132.0.2957.55", "132.0.2957.63", "131.0.2903.86",
    "131.0.2903.112",
];

/// 只使用桌面作業系統，證交所對行動版 UA 會回傳不同版型
const DESKTOP_OS: [&str; 8] = [
    "Windows NT 10.0; Win64; x64",
    "Windows NT 10.0; Win64; x64",
    "Windows NT 10.0; WOW64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "Macintosh; Intel Mac OS X 14_2_1",
    "X11; Linux x86_64",
    "X11; Ubuntu; Linux x86_64",
    "X11; Fedora; Linux x86_64",
];

fn gen_chrome_ua(rng: &mut impl Rng) -> String {
    let version = CHROME_VERSIONS[rng.random_range(0..CHROME_VERSIONS.len())];
    let os = DESKTOP_OS[rng.random_range(0..DESKTOP_OS.len())];
    format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
        os, version
    )
}

fn gen_firefox_ua(rng: &mut impl Rng) -> String {
    let version = FIREFOX_VERSIONS[rng.random_range(0..FIREFOX_VERSIONS.len())];
    let os = DESKTOP_OS[rng.random_range(0..DESKTOP_OS.len())];
    format!(
        "Mozilla/5.0 ({}; rv:{}) Gecko/20100101 Firefox/{}",
        os, version, version
    )
}

fn gen_edge_ua(rng: &mut impl Rng) -> String {
    let version = EDGE_VERSIONS[rng.random_range(0..EDGE_VERSIONS.len())];
    let chrome = version.split('.').next().unwrap_or("133");
    let os = DESKTOP_OS[rng.random_range(0..3)];
    format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36 Edg/{}",
        os, chrome, version
    )
}

pub fn gen_random_ua() -> String {
    let mut rng = rand::rng();
    match rng.random_range(0..10) {
        0..=5 => gen_chrome_ua(&mut rng),
        6..=7 => gen_firefox_ua(&mut rng),
        _ => gen_edge_ua(&mut rng),
    }
}
