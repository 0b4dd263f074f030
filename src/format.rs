//! Value formatting and filename policy.
//!
//! Every text field of every form type passes through [`format_value`]
//! before it is drawn. This is the single normalization point for form
//! values; per-form renderers must not reimplement any part of it.

use crate::model::{FormType, FormValue};

/// Split a camelCase identifier into space-separated, capitalized words.
///
/// Underscores, hyphens and existing whitespace also act as word breaks,
/// and duplicate whitespace is collapsed: `"workEmail"` → `"Work Email"`,
/// `"errors  omissions"` → `"Errors Omissions"`.
pub fn humanize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev: Option<char> = None;
    for ch in raw.chars() {
        if ch == '_' || ch == '-' || ch.is_whitespace() {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            prev = None;
            continue;
        }
        let word_break = matches!(prev, Some(p) if ch.is_uppercase() && (p.is_lowercase() || p.is_ascii_digit()));
        if word_break && !out.ends_with(' ') {
            out.push(' ');
        }
        if out.is_empty() || out.ends_with(' ') {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        prev = Some(ch);
    }
    out.trim_end().to_string()
}

/// Normalize a form value for display.
///
/// Booleans become "Yes"/"No"; missing, empty, and the literal strings
/// "null"/"undefined" become "--"; numbers drop a trailing `.0`; other
/// strings are humanized via [`humanize`].
pub fn format_value(value: Option<&FormValue>) -> String {
    match value {
        None => "--".to_string(),
        Some(FormValue::Bool(true)) => "Yes".to_string(),
        Some(FormValue::Bool(false)) => "No".to_string(),
        Some(FormValue::Number(n)) => {
            if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            }
        }
        Some(FormValue::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "null" || trimmed == "undefined" {
                "--".to_string()
            } else {
                humanize(trimmed)
            }
        }
        // An asset reference in a text placement has nothing printable.
        Some(FormValue::Asset(_)) => "--".to_string(),
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Download filename for a single form's document:
/// humanized form type and signer names, hyphen-joined, `.pdf`.
pub fn document_filename(form_type: FormType, first_name: &str, last_name: &str) -> String {
    format!(
        "{}-{}-{}.pdf",
        collapse_whitespace(&humanize(form_type.key())),
        collapse_whitespace(first_name),
        collapse_whitespace(last_name),
    )
}

/// Download filename for the concatenated whole-package document.
pub fn package_filename(first_name: &str, last_name: &str) -> String {
    format!(
        "Onboarding Package-{}-{}.pdf",
        collapse_whitespace(first_name),
        collapse_whitespace(last_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_become_yes_no() {
        assert_eq!(format_value(Some(&FormValue::Bool(true))), "Yes");
        assert_eq!(format_value(Some(&FormValue::Bool(false))), "No");
    }

    #[test]
    fn missing_and_sentinel_values_become_dashes() {
        assert_eq!(format_value(None), "--");
        assert_eq!(format_value(Some(&FormValue::Text(String::new()))), "--");
        assert_eq!(format_value(Some(&FormValue::Text("null".into()))), "--");
        assert_eq!(
            format_value(Some(&FormValue::Text("undefined".into()))),
            "--"
        );
    }

    #[test]
    fn camel_case_is_humanized() {
        assert_eq!(humanize("workEmail"), "Work Email");
        assert_eq!(humanize("errorsOmissionsProvider"), "Errors Omissions Provider");
        assert_eq!(humanize("name"), "Name");
        assert_eq!(
            format_value(Some(&FormValue::Text("fullTime".into()))),
            "Full Time"
        );
    }

    #[test]
    fn numbers_drop_trailing_zero() {
        assert_eq!(format_value(Some(&FormValue::Number(7.0))), "7");
        assert_eq!(format_value(Some(&FormValue::Number(2.5))), "2.5");
    }

    #[test]
    fn filenames_are_hyphen_joined_and_collapsed() {
        assert_eq!(
            document_filename(FormType::BrokerInformation, "Dana", "Reyes"),
            "Broker Information-Dana-Reyes.pdf"
        );
        assert_eq!(
            document_filename(FormType::BusinessCard, "Mary  Anne", "van  Dyk"),
            "Business Card-Mary Anne-van Dyk.pdf"
        );
        assert_eq!(package_filename("Dana", "Reyes"), "Onboarding Package-Dana-Reyes.pdf");
    }
}
