//! 檔案日誌。
//!
//! 日誌訊息經由 channel 交給背景線程，由 [`rotate::Rotate`] 依日期與大小輪轉寫入 `log/` 目錄，
//! 呼叫端不會因為磁碟 I/O 而阻塞。

use std::{fmt::Write as _, thread};

use chrono::{format::DelayedFormat, DateTime, Local};
use concat_string::concat_string;
use once_cell::sync::Lazy;
use tokio::sync::mpsc::{self, UnboundedSender};

pub mod rotate;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("data_sdk"));

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "Debug",
            Level::Info => "Info",
            Level::Warn => "Warn",
            Level::Error => "Error",
        }
    }
}

pub struct LogMessage {
    pub level: Level,
    pub msg: String,
    pub created_at: DateTime<Local>,
}

impl LogMessage {
    pub fn new(level: Level, msg: String) -> Self {
        LogMessage {
            level,
            msg,
            created_at: Local::now(),
        }
    }
}

pub struct Logger {
    writer: UnboundedSender<LogMessage>,
}

impl Logger {
    pub fn new(log_name: &str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogMessage>();
        let pattern = concat_string!("log/%Y-%m-%d-", log_name, ".log");

        // 寫入檔案的操作使用另一個線程處理
        thread::spawn(move || {
            let mut rotate = rotate::Rotate::new(pattern);
            let mut line = String::with_capacity(4096);

            while let Some(received) = rx.blocking_recv() {
                if writeln!(
                    &mut line,
                    "{} {} {}",
                    received.created_at.format("%F %X%.6f"),
                    received.level.as_str(),
                    received.msg
                )
                .is_err()
                {
                    continue;
                }

                if rx.is_empty() || line.len() >= 4096 {
                    if let Err(why) = rotate.write_msg(received.created_at, line.as_bytes()) {
                        error_console(format!("Failed to write log file. because:{:?}", why));
                        info_console(line.clone());
                    }
                    rotate.flush();
                    line.clear();
                }
            }
        });

        Logger { writer: tx }
    }

    pub fn debug(&self, log: String) {
        self.send(Level::Debug, log);
    }

    pub fn info(&self, log: String) {
        self.send(Level::Info, log);
    }

    pub fn warn(&self, log: String) {
        self.send(Level::Warn, log);
    }

    pub fn error(&self, log: String) {
        self.send(Level::Error, log);
    }

    fn send(&self, level: Level, msg: String) {
        if let Err(why) = self.writer.send(LogMessage::new(level, msg)) {
            error_console(why.to_string());
        }
    }
}

pub fn debug_file_async(log: String) {
    LOGGER.debug(log);
}

pub fn info_file_async(log: String) {
    LOGGER.info(log);
}

/// 警告同時輸出到 console，設定缺漏時使用者能立即看到。
pub fn warn_file_async(log: String) {
    warn_console(log.clone());
    LOGGER.warn(log);
}

pub fn error_file_async(log: String) {
    LOGGER.error(log);
}

pub fn info_console(log: String) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn warn_console(log: String) {
    eprintln!(
        "{} Warn {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    eprintln!(
        "{} Error {}",
        DelayedFormat::to_string(&Local::now().format("%Y-%m-%d %H:%M:%S.%3f")),
        log
    );
}
