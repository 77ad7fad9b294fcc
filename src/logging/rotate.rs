use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, TimeDelta};
use rayon::prelude::*;

use crate::logging;

/// 預設單檔最大大小：10 MB
const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;
/// 預設保留天數：7 天
const DEFAULT_MAX_AGE_DAYS: i64 = 7;

/// 依日期與檔案大小輪轉的日誌寫入器，只由日誌背景線程持有。
pub struct Rotate {
    /// 檔名模式，例如 "log/%Y-%m-%d-name.log"
    pattern: String,
    /// 當前基礎檔名（不含 generation，由日期決定）
    base_fn: String,
    /// 當前完整檔名
    current_fn: PathBuf,
    out: Option<BufWriter<File>>,
    /// 同一天內的世代編號，只增不減
    generation: u32,
    max_size: u64,
    current_size: u64,
    max_age: TimeDelta,
}

impl Rotate {
    pub fn new(pattern: String) -> Self {
        Self::with_options(pattern, DEFAULT_MAX_SIZE, DEFAULT_MAX_AGE_DAYS)
    }

    pub fn with_options(pattern: String, max_size: u64, max_age_days: i64) -> Self {
        Rotate {
            pattern,
            base_fn: String::new(),
            current_fn: PathBuf::new(),
            out: None,
            generation: 0,
            max_size,
            current_size: 0,
            max_age: TimeDelta::try_days(max_age_days).unwrap_or(TimeDelta::days(7)),
        }
    }

    /// 寫入日誌內容，必要時先依日期或大小輪轉
    pub fn write_msg(&mut self, now: DateTime<Local>, msg: &[u8]) -> Result<()> {
        let base_fn = now.format(&self.pattern).to_string();
        if base_fn != self.base_fn {
            // 日期變更：重設 generation
            self.base_fn = base_fn;
            self.generation = 0;
            self.open()?;
            self.cleanup(now);
        } else if self.current_size + msg.len() as u64 > self.max_size {
            self.generation += 1;
            self.open()?;
        }

        let out = self
            .out
            .as_mut()
            .ok_or_else(|| anyhow!("log file {} is not open", self.current_fn.display()))?;
        out.write_all(msg)?;
        self.current_size += msg.len() as u64;

        Ok(())
    }

    pub fn flush(&mut self) {
        if let Some(out) = self.out.as_mut() {
            let _ = out.flush();
        }
    }

    pub fn current_file(&self) -> &Path {
        &self.current_fn
    }

    /// generation = 0: "log/2025-02-03-app.log"
    /// generation = 2: "log/2025-02-03-app.2.log"
    fn file_name(base_fn: &str, generation: u32) -> PathBuf {
        if generation == 0 {
            return PathBuf::from(base_fn);
        }

        let path = Path::new(base_fn);
        let parent = path.parent().unwrap_or(Path::new(""));
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("log");
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("log");

        parent.join(format!("{}.{}.{}", stem, generation, ext))
    }

    fn open(&mut self) -> Result<()> {
        self.flush();

        let filename = Self::file_name(&self.base_fn, self.generation);
        if let Some(parent) = filename.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)?;

        self.current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.out = Some(BufWriter::with_capacity(4096, file));
        self.current_fn = filename;

        Ok(())
    }

    /// 刪除修改時間超過保留天數的檔案
    fn cleanup(&self, now: DateTime<Local>) {
        let files = match Self::files_beside(&self.current_fn) {
            Ok(files) => files,
            Err(why) => {
                logging::error_console(format!("Failed to list log directory because {:?}", why));
                return;
            }
        };

        let cut_off = (now - self.max_age).timestamp().max(0) as u64;
        let expired: Vec<PathBuf> = files
            .into_iter()
            .filter(|file| {
                fs::metadata(file)
                    .and_then(|metadata| metadata.modified())
                    .ok()
                    .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
                    .is_some_and(|elapsed| elapsed.as_secs() <= cut_off)
            })
            .collect();

        expired
            .par_iter()
            .with_min_len(num_cpus::get())
            .for_each(|file| {
                if let Err(why) = fs::remove_file(file) {
                    logging::error_console(format!(
                        "couldn't remove the file({}). because {:?}",
                        file.display(),
                        why
                    ));
                }
            });
    }

    fn files_beside(file_path: &Path) -> Result<Vec<PathBuf>, io::Error> {
        let parent_dir = match file_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(parent_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }

        Ok(files)
    }
}

impl Drop for Rotate {
    fn drop(&mut self) {
        self.flush();
    }
}
