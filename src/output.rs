use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::types::ProxyRecord;

/// `http://{ip}:{port}#{countryCode}#google={bool}#cloudflare={bool}`
pub fn log_line(record: &ProxyRecord) -> String {
    format!(
        "{}#{}#google={}#cloudflare={}",
        record.proxy_url(),
        record.country_code,
        record.google,
        record.cloudflare
    )
}

/// Write all records as one pretty JSON array, replacing `path`.
pub fn write_json(path: &Path, records: &[ProxyRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, records)?;
    w.flush()?;
    Ok(())
}

/// Append one line per record to `path`, creating it if needed.
pub fn append_log(path: &Path, records: &[ProxyRecord]) -> Result<()> {
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut w = BufWriter::new(file);
    for r in records {
        writeln!(w, "{}", log_line(r))?;
    }
    w.flush()?;
    Ok(())
}
