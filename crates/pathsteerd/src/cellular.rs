//! Cellular monitor output parsing.
//!
//! The helper prints a modem report with quoted values, e.g.:
//!
//! ```text
//! SINR (8): '9.0 dB'
//! RSRP:
//!   Network 'lte': '-116.0 dBm'
//! ```
//!
//! SINR sits on its own line; RSRP is a header whose value follows on the
//! next `Network` line. Lines mentioning RSRQ are a different block and
//! must not satisfy the RSRP header match.

use pathsteer_common::models::CellularReading;

/// Parse a monitor report. `None` when neither metric is present.
pub fn parse(output: &str) -> Option<CellularReading> {
    let mut reading = CellularReading::default();
    let mut in_rsrp = false;

    for line in output.lines() {
        if line.contains("SINR") && line.contains(':') {
            if let Some(q) = line.find('\'') {
                reading.sinr = leading_f64(&line[q + 1..]);
            }
        }

        if line.contains("RSRP:") && !line.contains("RSRQ") {
            in_rsrp = true;
            continue;
        }
        if in_rsrp && line.contains("Network") {
            if let Some(pos) = line.find("': '") {
                reading.rsrp = leading_f64(&line[pos + 4..]);
            }
            in_rsrp = false;
        }
    }

    (reading.sinr.is_some() || reading.rsrp.is_some()).then_some(reading)
}

/// Parse the leading numeric portion of a string (`-116.0 dBm` -> -116.0).
fn leading_f64(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
Modem status:
  SINR (8): '9.0 dB'
  RSRQ:
    Network 'lte': '-11.5 dB'
  RSRP:
    Network 'lte': '-116.0 dBm'
";

    #[test]
    fn parses_sinr_and_rsrp() {
        let r = parse(REPORT).unwrap();
        assert_eq!(r.sinr, Some(9.0));
        assert_eq!(r.rsrp, Some(-116.0));
    }

    #[test]
    fn rsrq_block_does_not_leak_into_rsrp() {
        let report = "RSRQ:\n  Network 'lte': '-11.5 dB'\n";
        assert_eq!(parse(report), None);
    }

    #[test]
    fn sinr_alone_is_a_partial_reading() {
        let r = parse("SINR (8): '4.5 dB'\n").unwrap();
        assert_eq!(r.sinr, Some(4.5));
        assert_eq!(r.rsrp, None);
    }

    #[test]
    fn empty_or_garbage_output_is_none() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("modem not found\n"), None);
    }

    #[test]
    fn leading_number_extraction() {
        assert_eq!(leading_f64("-116.0 dBm"), Some(-116.0));
        assert_eq!(leading_f64("9.0 dB'"), Some(9.0));
        assert_eq!(leading_f64("dBm"), None);
    }
}
