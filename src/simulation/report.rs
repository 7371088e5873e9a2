//! Metric extraction from simulator output.
//!
//! The text report is a de facto wire format:
//!
//! ```text
//! ... Emittance: <x> / <y> Energy: <energy> sigx: <sigx> <unit> ... sigy: <sigy>
//! ```
//!
//! The markers must appear in that order and `sigy` ends the report: the
//! whole remainder after the last `sigy: ` must be one number. Anything else
//! is a hard failure, since a malformed report means the simulator crashed
//! or changed its format.

use indexmap::IndexMap;

use super::transport::RawResult;
use crate::error::{Error, Result};

pub const EMITTANCE_MARKER: &str = "Emittance: ";
pub const ENERGY_MARKER: &str = " Energy: ";
pub const SIGX_MARKER: &str = "sigx: ";
pub const SIGY_MARKER: &str = "sigy: ";

/// Named scalars parsed from one simulator run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractedMetrics(IndexMap<String, f64>);

impl ExtractedMetrics {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn into_map(self) -> IndexMap<String, f64> {
        self.0
    }
}

pub fn extract(raw: &RawResult) -> Result<ExtractedMetrics> {
    match raw {
        RawResult::Report { text, .. } => parse_report(text),
        RawResult::Structured(fields) => unwrap_fields(fields),
    }
}

/// Parse the fixed-format text report.
pub fn parse_report(content: &str) -> Result<ExtractedMetrics> {
    let (_, after_emittance) = split_marker(content, EMITTANCE_MARKER, "emittance")?;
    let (emittance_part, energy_sigx_part) =
        split_marker(after_emittance, ENERGY_MARKER, "energy")?;

    let (emittance_x, emittance_y) = match emittance_part.split(" / ").collect::<Vec<_>>()[..] {
        [x, y] => (parse_float("emittance_x", x)?, parse_float("emittance_y", y)?),
        _ => {
            return Err(Error::parse(
                "emittance",
                format!("expected '<x> / <y>', found {:?}", emittance_part),
            ))
        }
    };

    let (energy_part, sigx_part) = split_marker(energy_sigx_part, SIGX_MARKER, "sigx")?;
    let energy = parse_float("energy", energy_part.trim())?;
    let sigx = parse_float("sigx", first_token(sigx_part, "sigx")?)?;

    let (_, sigy_part) = content
        .rsplit_once(SIGY_MARKER)
        .ok_or_else(|| missing(SIGY_MARKER, "sigy"))?;
    let sigy = parse_float("sigy", sigy_part)?;

    let mut metrics = IndexMap::with_capacity(5);
    metrics.insert("emittance_x".to_string(), emittance_x);
    metrics.insert("emittance_y".to_string(), emittance_y);
    metrics.insert("energy".to_string(), energy);
    metrics.insert("sigx".to_string(), sigx);
    metrics.insert("sigy".to_string(), sigy);
    Ok(ExtractedMetrics(metrics))
}

/// Engine results wrap every scalar in a one-element container.
fn unwrap_fields(fields: &IndexMap<String, Vec<f64>>) -> Result<ExtractedMetrics> {
    let mut metrics = IndexMap::with_capacity(fields.len());
    for (name, values) in fields {
        let value = values
            .first()
            .copied()
            .ok_or_else(|| Error::parse(name.as_str(), "engine returned an empty value"))?;
        metrics.insert(name.clone(), value);
    }
    Ok(ExtractedMetrics(metrics))
}

fn split_marker<'a>(text: &'a str, marker: &str, field: &str) -> Result<(&'a str, &'a str)> {
    text.split_once(marker).ok_or_else(|| missing(marker, field))
}

fn missing(marker: &str, field: &str) -> Error {
    Error::parse(field, format!("marker {:?} not found", marker))
}

fn first_token<'a>(text: &'a str, field: &str) -> Result<&'a str> {
    text.split_whitespace()
        .next()
        .ok_or_else(|| Error::parse(field, "no value after marker"))
}

fn parse_float(field: &str, text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|e| Error::parse(field, format!("{:?}: {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const REPORT: &str =
        "Tracking done. Emittance: 1.5 / 2.5 Energy: 10.0 sigx: 0.001 um at screen sigy: 0.002";

    #[test]
    fn parses_all_five_values() {
        let m = parse_report(REPORT).unwrap();
        assert_eq!(m.get("emittance_x"), Some(1.5));
        assert_eq!(m.get("emittance_y"), Some(2.5));
        assert_eq!(m.get("energy"), Some(10.0));
        assert_eq!(m.get("sigx"), Some(0.001));
        assert_eq!(m.get("sigy"), Some(0.002));
        assert_eq!(m.len(), 5);
    }

    #[test]
    fn sigy_accepts_trailing_newline() {
        let m = parse_report(&format!("{}\n", REPORT)).unwrap();
        assert_eq!(m.get("sigy"), Some(0.002));
    }

    #[test]
    fn trailing_text_after_sigy_fails() {
        for tail in [" mm", " 0.003", "\nexit"] {
            let err = parse_report(&format!("{}{}", REPORT, tail)).unwrap_err();
            match err {
                Error::Parse { field, .. } => assert_eq!(field, "sigy"),
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn missing_energy_marker_fails() {
        let err = parse_report("Emittance: 1.5 / 2.5 sigx: 0.001 sigy: 0.002").unwrap_err();
        match err {
            Error::Parse { field, .. } => assert_eq!(field, "energy"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn each_missing_marker_fails() {
        for marker in [EMITTANCE_MARKER, ENERGY_MARKER, SIGX_MARKER, SIGY_MARKER] {
            let broken = REPORT.replace(marker, " ");
            assert!(
                matches!(parse_report(&broken), Err(Error::Parse { .. })),
                "report without {:?} parsed",
                marker
            );
        }
    }

    #[test]
    fn non_numeric_value_fails() {
        let err = parse_report("Emittance: NaNx / 2.5 Energy: 10 sigx: 1 sigy: 2").unwrap_err();
        assert!(matches!(err, Error::Parse { ref field, .. } if field == "emittance_x"));
    }

    #[test]
    fn single_emittance_component_fails() {
        assert!(parse_report("Emittance: 1.5 Energy: 10 sigx: 1 sigy: 2").is_err());
    }

    #[test]
    fn structured_fields_are_unwrapped() {
        let mut fields = IndexMap::new();
        fields.insert("emit_mean".to_string(), vec![3.2e-6]);
        fields.insert("energy".to_string(), vec![135.0]);
        let m = extract(&RawResult::Structured(fields)).unwrap();
        assert_eq!(m.get("emit_mean"), Some(3.2e-6));
        assert_eq!(m.get("energy"), Some(135.0));
    }

    #[test]
    fn empty_structured_field_fails() {
        let mut fields = IndexMap::new();
        fields.insert("sigx".to_string(), vec![]);
        assert!(matches!(
            extract(&RawResult::Structured(fields)),
            Err(Error::Parse { .. })
        ));
    }

    proptest! {
        #[test]
        fn well_formed_reports_round_trip(
            ex in -1.0e3f64..1.0e3,
            ey in -1.0e3f64..1.0e3,
            energy in 0.0f64..1.0e4,
            sigx in 0.0f64..1.0,
            sigy in 0.0f64..1.0,
        ) {
            let text = format!(
                "header Emittance: {} / {} Energy: {} sigx: {} um tail sigy: {}",
                ex, ey, energy, sigx, sigy
            );
            let m = parse_report(&text).unwrap();
            prop_assert_eq!(m.get("emittance_x"), Some(ex));
            prop_assert_eq!(m.get("emittance_y"), Some(ey));
            prop_assert_eq!(m.get("energy"), Some(energy));
            prop_assert_eq!(m.get("sigx"), Some(sigx));
            prop_assert_eq!(m.get("sigy"), Some(sigy));
        }
    }
}
