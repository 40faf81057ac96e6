use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::types::{PortCandidate, PortSource, ScanMode};

pub const MAX_PORT: u16 = 65535;

/// Ports public HTTP proxies are most often found on, most common first.
const WELL_KNOWN: &[u16] = &[
    8080, 80, 3128, 8081, 808, 8000, 8090, 33630, 1975, 53040, 7532, 1081, 1981, 53281, 55443,
    1337, 9091, 7890, 443, 40657, 8088, 10000, 8889, 3129, 8118, 7001, 9300, 45977, 8089, 59175,
    8083, 999, 10001, 4015, 10012, 10005, 10009, 10002, 6969, 9090, 49920, 8111, 1976, 3333, 9000,
    52151, 9812, 9741, 6666, 24000, 12345, 4555, 8989, 5555, 57322, 8888, 23456, 41258, 54651,
    9898, 46752, 5002, 35081, 9229, 38080, 31409, 49717,
];

pub fn well_known_ports() -> Vec<u16> {
    WELL_KNOWN.to_vec()
}

/// Lazy, ordered port sequence for one host.
///
/// Yields the well-known list in order, then (exhaustive mode only) every
/// other port from 1 to 65535 ascending. Callers stop pulling on the first
/// validated proxy, so the sweep only runs when the list came up empty.
#[derive(Debug, Clone)]
pub struct CandidatePorts<'a> {
    well_known: &'a [u16],
    skip: HashSet<u16>,
    mode: ScanMode,
    next_list: usize,
    next_sweep: u32,
}

impl<'a> CandidatePorts<'a> {
    pub fn new(well_known: &'a [u16], mode: ScanMode) -> Self {
        Self {
            well_known,
            skip: well_known.iter().copied().collect(),
            mode,
            next_list: 0,
            next_sweep: 1,
        }
    }
}

impl Iterator for CandidatePorts<'_> {
    type Item = PortCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(&port) = self.well_known.get(self.next_list) {
            self.next_list += 1;
            return Some(PortCandidate {
                port,
                source: PortSource::WellKnown,
            });
        }
        if self.mode != ScanMode::Exhaustive {
            return None;
        }
        while self.next_sweep <= MAX_PORT as u32 {
            let port = self.next_sweep as u16;
            self.next_sweep += 1;
            if !self.skip.contains(&port) {
                return Some(PortCandidate {
                    port,
                    source: PortSource::FullSweep,
                });
            }
        }
        None
    }
}

pub fn candidate_ports(well_known: &[u16], mode: ScanMode) -> CandidatePorts<'_> {
    CandidatePorts::new(well_known, mode)
}

/// Parse a ports file content into a deduplicated list of TCP ports (1..=65535).
///
/// Supported formats per line:
/// - single port number: `8080`
/// - inclusive range: `8000-8010`
/// - comments: everything after `#` is ignored
/// - whitespace and blank lines are ignored
///
/// Order of first appearance is kept, since it is the probing order.
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }

        if let Some((a, b)) = line.split_once('-') {
            let start = parse_port_str(a.trim())
                .with_context(|| format!("line {line_no}: invalid start in range: {a}"))?;
            let end = parse_port_str(b.trim())
                .with_context(|| format!("line {line_no}: invalid end in range: {b}"))?;
            if start > end {
                bail!("line {line_no}: invalid range {start}-{end} (start > end)");
            }
            for p in start..=end {
                if seen.insert(p) {
                    out.push(p);
                }
            }
            continue;
        }

        let p = parse_port_str(line)
            .with_context(|| format!("line {line_no}: invalid port value: {line}"))?;
        if seen.insert(p) {
            out.push(p);
        }
    }

    Ok(out)
}

/// Load a well-known port list from a file. An empty file is an error.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read ports file: {}", path.as_ref().display()))?;
    let ports = parse_ports_str(&content)?;
    if ports.is_empty() {
        bail!("ports file {} lists no ports", path.as_ref().display());
    }
    Ok(ports)
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > MAX_PORT as u32 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
