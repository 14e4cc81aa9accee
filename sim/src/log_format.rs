//! Line-oriented text measurement logs.
//!
//! # Input format (whitespace separated, one packet per line)
//! ```text
//! L  px  py  timestamp  [gt_px gt_py gt_vx gt_vy ...]
//! R  rho phi rho_dot timestamp  [gt_px gt_py gt_vx gt_vy ...]
//! ```
//! Ground truth is optional; columns after the first four ground-truth values
//! (yaw, yaw rate in some logs) are ignored. Blank lines and `#` comments are
//! skipped.
//!
//! # Output format (tab separated, one line per processed packet)
//! `est_px est_py est_vx est_vy meas_px meas_py [gt_px gt_py gt_vx gt_vy]`

use fusion_core::types::{MeasurementPackage, MeasurementValue, SensorKind, StateVec, Timestamp};
use std::io::{self, BufRead, Write};

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn malformed(line: usize, reason: impl Into<String>) -> LogError {
    LogError::Malformed {
        line,
        reason: reason.into(),
    }
}

/// Parse one log line. `line_no` is 1-based and only used for errors.
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(text: &str, line_no: usize) -> Result<Option<MeasurementPackage>, LogError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let mut fields = trimmed.split_whitespace();
    let sensor = match fields.next() {
        Some("L") => SensorKind::Laser,
        Some("R") => SensorKind::Radar,
        Some(other) => return Err(malformed(line_no, format!("unknown sensor tag {other:?}"))),
        None => return Ok(None),
    };

    let rest: Vec<&str> = fields.collect();
    let n_meas = sensor.measurement_dim();
    if rest.len() < n_meas + 1 {
        return Err(malformed(
            line_no,
            format!(
                "{sensor} line needs {} measurement values and a timestamp, got {} fields",
                n_meas,
                rest.len()
            ),
        ));
    }

    let parse_f64 = |s: &str| {
        s.parse::<f64>()
            .map_err(|e| malformed(line_no, format!("bad number {s:?}: {e}")))
    };

    let raw = rest[..n_meas]
        .iter()
        .map(|s| parse_f64(*s))
        .collect::<Result<Vec<f64>, _>>()?;
    let ts_field = rest[n_meas];
    let timestamp: Timestamp = ts_field
        .parse()
        .map_err(|e| malformed(line_no, format!("bad timestamp {ts_field:?}: {e}")))?;

    let mut pack = MeasurementPackage::from_raw(sensor, timestamp, &raw)
        .map_err(|e| malformed(line_no, e.to_string()))?;

    let gt_fields = &rest[n_meas + 1..];
    match gt_fields.len() {
        0 => {}
        n if n >= 4 => {
            let gt = gt_fields[..4]
                .iter()
                .map(|s| parse_f64(*s))
                .collect::<Result<Vec<f64>, _>>()?;
            pack = pack.with_ground_truth([gt[0], gt[1], gt[2], gt[3]]);
        }
        n => {
            return Err(malformed(
                line_no,
                format!("ground truth needs 4 values, got {n}"),
            ))
        }
    }

    Ok(Some(pack))
}

/// Read a whole log, stopping at the first malformed line.
pub fn read_log<R: BufRead>(reader: R) -> Result<Vec<MeasurementPackage>, LogError> {
    let mut packets = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        if let Some(pack) = parse_line(&line?, i + 1)? {
            packets.push(pack);
        }
    }
    Ok(packets)
}

/// Write packets back in the input format.
pub fn write_log<W: Write>(mut writer: W, packets: &[MeasurementPackage]) -> io::Result<()> {
    for pack in packets {
        match pack.value {
            MeasurementValue::Laser { px, py } => {
                write!(writer, "L\t{px:e}\t{py:e}\t{}", pack.timestamp)?;
            }
            MeasurementValue::Radar { rho, phi, rho_dot } => {
                write!(writer, "R\t{rho:e}\t{phi:e}\t{rho_dot:e}\t{}", pack.timestamp)?;
            }
        }
        if let Some(gt) = pack.ground_truth {
            write!(writer, "\t{:e}\t{:e}\t{:e}\t{:e}", gt[0], gt[1], gt[2], gt[3])?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write one estimate line for a processed packet.
pub fn write_estimate<W: Write + ?Sized>(
    writer: &mut W,
    estimate: &StateVec,
    pack: &MeasurementPackage,
) -> io::Result<()> {
    let (mx, my) = pack.to_cartesian_2d();
    write!(
        writer,
        "{}\t{}\t{}\t{}\t{mx}\t{my}",
        estimate[0], estimate[1], estimate[2], estimate[3]
    )?;
    if let Some(gt) = pack.ground_truth {
        write!(writer, "\t{}\t{}\t{}\t{}", gt[0], gt[1], gt[2], gt[3])?;
    }
    writeln!(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_laser_and_radar_lines() {
        let text = "\
# sample
L\t3.122427e-01\t5.803398e-01\t1477010443000000\t6.000000e-01\t6.000000e-01\t5.199937e+00\t0\t0\t6.911322e-03

R 1.014892e+00 5.543292e-01 4.892807e+00 1477010443050000 8.599968e-01 6.000449e-01 5.199747e+00 1.796856e-03
L 1.0 2.0 1477010443100000
";
        let packets = read_log(text.as_bytes()).unwrap();
        assert_eq!(packets.len(), 3);

        assert_eq!(packets[0].sensor(), SensorKind::Laser);
        assert_eq!(packets[0].timestamp, 1_477_010_443_000_000);
        assert_eq!(packets[0].ground_truth, Some([0.6, 0.6, 5.199937, 0.0]));

        match packets[1].value {
            MeasurementValue::Radar { rho, phi, rho_dot } => {
                assert_eq!(rho, 1.014892);
                assert_eq!(phi, 0.5543292);
                assert_eq!(rho_dot, 4.892807);
            }
            _ => panic!("expected radar"),
        }
        assert!(packets[2].ground_truth.is_none());
    }

    #[test]
    fn malformed_lines_report_line_number() {
        let err = read_log("L 1 2 100\nR 1 2 100\n".as_bytes()).unwrap_err();
        match err {
            LogError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_line("X 1 2 3", 5).is_err());
        assert!(parse_line("L 1 abc 3", 1).is_err());
        assert!(parse_line("L 1 2 3.5", 1).is_err());
        assert!(parse_line("L 1 2 3 0.1 0.2", 1).is_err());
        assert!(parse_line("L inf 1 0", 1).is_err());
        assert!(parse_line("R 1.0 NaN 0.5 0", 1).is_err());
    }

    #[test]
    fn written_log_reads_back() {
        let packets = vec![
            MeasurementPackage::laser(0, 1.5, -2.25).with_ground_truth([1.0, 2.0, 3.0, 4.0]),
            MeasurementPackage::radar(50_000, 2.0, -0.5, 0.125),
        ];
        let mut buf = Vec::new();
        write_log(&mut buf, &packets).unwrap();
        let back = read_log(buf.as_slice()).unwrap();
        assert_eq!(back, packets);
    }

    #[test]
    fn estimate_line_has_measurement_and_truth_columns() {
        let pack = MeasurementPackage::laser(0, 1.0, 2.0).with_ground_truth([1.0, 2.0, 0.5, 0.0]);
        let mut buf = Vec::new();
        write_estimate(&mut buf, &StateVec::new(1.1, 2.1, 0.4, 0.1), &pack).unwrap();
        let line = String::from_utf8(buf).unwrap();
        assert_eq!(line.trim_end().split('\t').count(), 10);
        assert!(line.starts_with("1.1\t2.1\t0.4\t0.1\t1\t2"));
    }
}
