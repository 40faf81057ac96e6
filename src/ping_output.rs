//! Parser for the text the system `ping` binary prints.
//!
//! Accepts the iputils (Linux) and BSD (macOS) layouts:
//!
//! ```text
//! PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.
//! 64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=10.2 ms
//!
//! --- 8.8.8.8 ping statistics ---
//! 4 packets transmitted, 4 received, 0% packet loss, time 3004ms
//! rtt min/avg/max/mdev = 9.912/10.104/10.311/0.144 ms
//! ```

use crate::error::PingParseError;

#[derive(Debug, Clone, PartialEq)]
pub struct RoundTrip {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    /// Absent from BusyBox output, which prints only min/avg/max.
    pub dev_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PingStatistics {
    pub transmitted: u32,
    pub received: u32,
    pub errors: u32,
    pub packet_loss_percent: f64,
    pub round_trip: Option<RoundTrip>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PingOutput {
    pub replies: u32,
    pub stats: PingStatistics,
}

pub fn parse(target: &str, raw: &str) -> Result<PingOutput, PingParseError> {
    let mut lines = raw.lines().map(str::trim_end);

    let header = lines
        .by_ref()
        .find(|l| !l.trim().is_empty())
        .ok_or(PingParseError::Empty)?;
    check_header(target, header)?;

    let mut replies = 0u32;
    let mut saw_stats = false;
    for line in lines.by_ref() {
        let t = line.trim();
        if t.is_empty() {
            continue;
        }
        if t.starts_with("---") {
            if !(t.ends_with("---") && t.contains("ping statistics")) {
                return Err(PingParseError::MalformedStatsHeader(t.to_string()));
            }
            saw_stats = true;
            break;
        }
        if t.contains(" bytes from ") {
            replies += 1;
            continue;
        }
        if t.starts_with("From ")
            || t.starts_with("Request timeout")
            || t.starts_with("no answer yet")
            || t.starts_with("Warning:")
        {
            continue;
        }
        return Err(PingParseError::UnrecognizedLine(t.to_string()));
    }
    if !saw_stats {
        return Err(PingParseError::MalformedStatsHeader(
            "missing statistics block".into(),
        ));
    }

    let line1 = lines
        .by_ref()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| PingParseError::MalformedStatsLine1("missing".into()))?;
    let mut stats = parse_counts(line1)?;

    if let Some(line2) = lines.map(str::trim).find(|l| !l.is_empty()) {
        stats.round_trip = Some(parse_round_trip(line2)?);
    }

    Ok(PingOutput { replies, stats })
}

fn check_header(target: &str, header: &str) -> Result<(), PingParseError> {
    let mismatch = || PingParseError::HeaderMismatch(header.to_string());
    let rest = header.trim().strip_prefix("PING ").ok_or_else(mismatch)?;
    let host = rest
        .split_whitespace()
        .next()
        .map(|h| h.trim_end_matches(':'))
        .ok_or_else(mismatch)?;
    let resolved = format!("({target})");
    if host == target || rest.contains(&resolved) {
        Ok(())
    } else {
        Err(mismatch())
    }
}

/// `4 packets transmitted, 3 received, +1 errors, 25% packet loss, time 3004ms`
fn parse_counts(line: &str) -> Result<PingStatistics, PingParseError> {
    let bad = || PingParseError::MalformedStatsLine1(line.to_string());
    let mut transmitted = None;
    let mut received = None;
    let mut errors = 0u32;
    let mut loss = None;

    for field in line.split(',').map(str::trim) {
        let mut parts = field.split_whitespace();
        let (Some(value), rest) = (parts.next(), parts.collect::<Vec<_>>().join(" ")) else {
            continue;
        };
        if rest.starts_with("packets transmitted") {
            transmitted = Some(value.parse::<u32>().map_err(|_| bad())?);
        } else if rest == "received" || rest == "packets received" {
            received = Some(value.parse::<u32>().map_err(|_| bad())?);
        } else if rest.starts_with("errors") {
            errors = value
                .trim_start_matches('+')
                .parse::<u32>()
                .map_err(|_| bad())?;
        } else if rest == "packet loss" {
            let pct = value.strip_suffix('%').ok_or_else(bad)?;
            loss = Some(pct.parse::<f64>().map_err(|_| bad())?);
        }
    }

    match (transmitted, received, loss) {
        (Some(transmitted), Some(received), Some(packet_loss_percent)) => Ok(PingStatistics {
            transmitted,
            received,
            errors,
            packet_loss_percent,
            round_trip: None,
        }),
        _ => Err(bad()),
    }
}

/// `rtt min/avg/max/mdev = 9.912/10.104/10.311/0.144 ms[, pipe N]`
/// or BusyBox `round-trip min/avg/max = 12.1/12.1/12.1 ms`
fn parse_round_trip(line: &str) -> Result<RoundTrip, PingParseError> {
    let bad = || PingParseError::MalformedStatsLine2(line.to_string());
    if !(line.starts_with("rtt ") || line.starts_with("round-trip ")) {
        return Err(bad());
    }
    let (_, values) = line.split_once('=').ok_or_else(bad)?;
    let values = values.split(',').next().unwrap_or("").trim();
    let values = values.strip_suffix("ms").unwrap_or(values).trim();
    let nums = values
        .split('/')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| bad())?;
    match nums.as_slice() {
        [min_ms, avg_ms, max_ms] => Ok(RoundTrip {
            min_ms: *min_ms,
            avg_ms: *avg_ms,
            max_ms: *max_ms,
            dev_ms: None,
        }),
        [min_ms, avg_ms, max_ms, dev_ms] => Ok(RoundTrip {
            min_ms: *min_ms,
            avg_ms: *avg_ms,
            max_ms: *max_ms,
            dev_ms: Some(*dev_ms),
        }),
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_OK: &str = "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.
64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=10.2 ms
64 bytes from 8.8.8.8: icmp_seq=2 ttl=117 time=9.91 ms
64 bytes from 8.8.8.8: icmp_seq=3 ttl=117 time=10.3 ms
64 bytes from 8.8.8.8: icmp_seq=4 ttl=117 time=10.0 ms

--- 8.8.8.8 ping statistics ---
4 packets transmitted, 4 received, 0% packet loss, time 3004ms
rtt min/avg/max/mdev = 9.912/10.104/10.311/0.144 ms
";

    const LINUX_LOST: &str = "PING 45.12.3.4 (45.12.3.4) 56(84) bytes of data.
From 10.0.0.1 icmp_seq=1 Destination Host Unreachable

--- 45.12.3.4 ping statistics ---
4 packets transmitted, 0 received, +1 errors, 100% packet loss, time 3060ms

";

    const MACOS_PARTIAL: &str = "PING 1.1.1.1 (1.1.1.1): 56 data bytes
64 bytes from 1.1.1.1: icmp_seq=0 ttl=57 time=12.500 ms
Request timeout for icmp_seq 1

--- 1.1.1.1 ping statistics ---
2 packets transmitted, 1 packets received, 50.0% packet loss
round-trip min/avg/max/stddev = 12.500/12.500/12.500/0.000 ms
";

    #[test]
    fn parses_full_success() {
        let out = parse("8.8.8.8", LINUX_OK).unwrap();
        assert_eq!(out.replies, 4);
        assert_eq!(out.stats.transmitted, 4);
        assert_eq!(out.stats.received, 4);
        assert_eq!(out.stats.packet_loss_percent, 0.0);
        let rt = out.stats.round_trip.unwrap();
        assert_eq!(rt.avg_ms, 10.104);
    }

    #[test]
    fn parses_total_loss_without_rtt() {
        let out = parse("45.12.3.4", LINUX_LOST).unwrap();
        assert_eq!(out.replies, 0);
        assert_eq!(out.stats.errors, 1);
        assert_eq!(out.stats.packet_loss_percent, 100.0);
        assert!(out.stats.round_trip.is_none());
    }

    #[test]
    fn parses_bsd_layout() {
        let out = parse("1.1.1.1", MACOS_PARTIAL).unwrap();
        assert_eq!(out.replies, 1);
        assert_eq!(out.stats.received, 1);
        assert_eq!(out.stats.packet_loss_percent, 50.0);
    }

    #[test]
    fn slow_link_pipe_suffix_is_accepted() {
        let raw = "PING 41.2.3.4 (41.2.3.4) 56(84) bytes of data.
64 bytes from 41.2.3.4: icmp_seq=1 ttl=50 time=1500 ms
64 bytes from 41.2.3.4: icmp_seq=2 ttl=50 time=1350 ms
64 bytes from 41.2.3.4: icmp_seq=3 ttl=50 time=1200 ms

--- 41.2.3.4 ping statistics ---
3 packets transmitted, 3 received, 0% packet loss, time 2003ms
rtt min/avg/max/mdev = 1200.0/1350.0/1500.0/111.8 ms, pipe 2
";
        let out = parse("41.2.3.4", raw).unwrap();
        assert_eq!(out.stats.packet_loss_percent, 0.0);
        let rt = out.stats.round_trip.unwrap();
        assert_eq!(rt.max_ms, 1500.0);
        assert_eq!(rt.dev_ms, Some(111.8));
    }

    #[test]
    fn busybox_three_value_rtt_is_accepted() {
        let raw = "PING 8.8.4.4 (8.8.4.4): 56 data bytes
64 bytes from 8.8.4.4: seq=0 ttl=117 time=12.1 ms

--- 8.8.4.4 ping statistics ---
1 packets transmitted, 1 packets received, 0% packet loss
round-trip min/avg/max = 12.1/12.1/12.1 ms
";
        let out = parse("8.8.4.4", raw).unwrap();
        assert_eq!(out.stats.packet_loss_percent, 0.0);
        let rt = out.stats.round_trip.unwrap();
        assert_eq!(rt.avg_ms, 12.1);
        assert_eq!(rt.dev_ms, None);
    }

    #[test]
    fn header_for_other_host_is_rejected() {
        let err = parse("9.9.9.9", LINUX_OK).unwrap_err();
        assert!(matches!(err, PingParseError::HeaderMismatch(_)));
    }

    #[test]
    fn empty_output_is_rejected() {
        assert_eq!(parse("8.8.8.8", "\n\n").unwrap_err(), PingParseError::Empty);
    }

    #[test]
    fn garbage_line_is_rejected() {
        let raw = "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.\nwat\n";
        assert!(matches!(
            parse("8.8.8.8", raw).unwrap_err(),
            PingParseError::UnrecognizedLine(_)
        ));
    }

    #[test]
    fn broken_statistics_are_rejected() {
        let header = "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.\n\n";

        let raw = format!("{header}--- 8.8.8.8 stats ---\n");
        assert!(matches!(
            parse("8.8.8.8", &raw).unwrap_err(),
            PingParseError::MalformedStatsHeader(_)
        ));

        let raw = format!("{header}--- 8.8.8.8 ping statistics ---\n4 packets transmitted\n");
        assert!(matches!(
            parse("8.8.8.8", &raw).unwrap_err(),
            PingParseError::MalformedStatsLine1(_)
        ));

        let raw = format!(
            "{header}--- 8.8.8.8 ping statistics ---\n1 packets transmitted, 1 received, 0% packet loss\nrtt = a/b\n"
        );
        assert!(matches!(
            parse("8.8.8.8", &raw).unwrap_err(),
            PingParseError::MalformedStatsLine2(_)
        ));
    }
}
