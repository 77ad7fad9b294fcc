//! parquet 檔案讀寫

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use polars::prelude::*;

use crate::error::Result;

/// 寫入 parquet，先寫暫存檔再改名，失敗時不留下不完整的檔案
pub fn write_parquet(path: &Path, df: &mut DataFrame) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    let guard = scopeguard::guard(tmp, |tmp| {
        let _ = fs::remove_file(tmp);
    });

    {
        let mut file = File::create(&*guard)?;
        ParquetWriter::new(&mut file).finish(df)?;
    }
    fs::rename(&*guard, path)?;

    // 已改名，不需要再刪除暫存檔
    scopeguard::ScopeGuard::into_inner(guard);
    Ok(())
}

pub fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)?;
    Ok(ParquetReader::new(file).finish()?)
}

pub fn scan_parquet(path: &Path) -> Result<LazyFrame> {
    Ok(LazyFrame::scan_parquet(path, ScanArgsParquet::default())?)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
