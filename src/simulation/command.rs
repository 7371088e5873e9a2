use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::core::ParameterVector;
use crate::error::{Error, Result};

/// Placeholder that expands to all quadrupole currents as one vector.
pub const QUADS_PLACEHOLDER: &str = "quads";

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_:]+)\}").expect("static pattern"))
}

/// Shortest representation that parses back to the same value, e.g. `2e-9`.
pub fn format_value(value: f64) -> String {
    format!("{:?}", value)
}

/// MATLAB row-vector literal, e.g. `[0.1, -0.2]`.
pub fn format_vector(values: &[f64]) -> String {
    let items: Vec<String> = values.iter().map(|&v| format_value(v)).collect();
    format!("[{}]", items.join(", "))
}

/// Substitute `{name}` placeholders in `template` from `parameters`.
///
/// `{quads}` becomes the vector of every parameter whose name contains
/// `quad_marker`, in declaration order. Unknown names are an error.
pub fn render_template(
    template: &str,
    parameters: &ParameterVector,
    quad_marker: &str,
) -> Result<String> {
    let mut missing = Vec::new();

    let rendered = placeholder_pattern().replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        if name == QUADS_PLACEHOLDER {
            return format_vector(&parameters.values_matching(quad_marker));
        }
        match parameters.get(name) {
            Some(value) => format_value(value),
            None => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(Error::Config(format!(
            "command template references unknown parameters: {}",
            missing.join(", ")
        )));
    }

    Ok(rendered.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> ParameterVector {
        [
            ("sol_var", 0.2),
            ("gun_phase", 290.0),
            ("laser_pulse_length", 4.4999e-12),
            ("bunch_charge", 2.0e-9),
            ("QUAD:IN10:361:BCTRL", 0.1),
            ("QUAD:IN10:371:BCTRL", -0.25),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn renders_matlab_call() {
        let script = render_template(
            "run({sol_var},{gun_phase},{laser_pulse_length},{quads},{bunch_charge}); exit;",
            &point(),
            "QUAD",
        )
        .unwrap();
        assert_eq!(
            script,
            "run(0.2,290.0,4.4999e-12,[0.1, -0.25],2e-9); exit;"
        );
    }

    #[test]
    fn colon_names_are_placeholders() {
        let script = render_template("{QUAD:IN10:371:BCTRL}", &point(), "QUAD").unwrap();
        assert_eq!(script, "-0.25");
    }

    #[test]
    fn unknown_placeholder_fails() {
        let err = render_template("run({sol_var},{typo})", &point(), "QUAD").unwrap_err();
        assert!(err.to_string().contains("typo"));
    }

    #[test]
    fn values_round_trip() {
        for v in [4.4999e-12, 1.9e-9, 0.1, 290.0, -0.3] {
            assert_eq!(format_value(v).parse::<f64>().unwrap(), v);
        }
    }
}
