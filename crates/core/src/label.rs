//! Calibration label parsing
//!
//! Recovers the true distance written on an existing calibration line so
//! the calibration can be rebuilt without asking the user again.
//! Recognized forms:
//! - `10.5 ft`, `3 m`, `250mm` (decimal with optional unit)
//! - `12"`, `8'` (inch or foot mark)
//! - `10' 6"`, `10'6" ft`, `10'-6"` (feet-inches compound)
//!
//! Leading text such as `Calibration:` is skipped.

use crate::error::{MeasureError, MeasureResult};
use crate::units::{format_feet_inches, Unit};

/// A distance recovered from a calibration label
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLabel {
    /// Distance expressed in `unit`
    pub distance: f64,
    pub unit: Unit,
    /// Whether the feet-inches compound form was used
    pub compound: bool,
    /// The slice of the input that matched
    pub source_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Feet,
    Inches,
}

/// Parse a calibration label.
///
/// Returns `Ok(None)` when the text holds no number or the distance is not
/// positive: the text is simply not a calibration label. Returns
/// [`MeasureError::UnparsableAnnotation`] when the text starts a
/// feet-inches label but does not finish it properly.
pub fn parse_calibration_label(text: &str, default_unit: Unit) -> MeasureResult<Option<ParsedLabel>> {
    let Some(start) = find_number_start(text) else {
        return Ok(None);
    };
    let mut cursor = Cursor { text, pos: start };

    let first = cursor.number()?.ok_or_else(|| unparsable(text, "expected a number"))?;
    let mark = cursor.mark();

    let mut compound = false;
    let mut value = first;
    let mut implied_unit = match mark {
        Some(Mark::Feet) => Some(Unit::Ft),
        Some(Mark::Inches) => Some(Unit::In),
        None => None,
    };

    if mark == Some(Mark::Feet) {
        let checkpoint = cursor.pos;
        cursor.skip_whitespace();
        cursor.eat('-');
        cursor.skip_whitespace();
        match cursor.number()? {
            Some(inches) => {
                if cursor.mark() != Some(Mark::Inches) {
                    return Err(unparsable(text, "inches value is missing its closing mark"));
                }
                if !(0.0..12.0).contains(&inches) {
                    return Err(unparsable(text, "inches part must be below 12"));
                }
                compound = true;
                value = first.abs() + inches / 12.0;
                if first < 0.0 {
                    value = -value;
                }
            }
            None => cursor.pos = checkpoint,
        }
    }

    let end_of_value = cursor.pos;
    cursor.skip_whitespace();
    let explicit_unit = cursor.word().and_then(|word| word.parse::<Unit>().ok());
    let source_end = if explicit_unit.is_some() { cursor.pos } else { end_of_value };

    let unit = explicit_unit.or(implied_unit).unwrap_or(default_unit);
    if let Some(from) = implied_unit.take() {
        value = from.convert(value, unit);
    }

    if !value.is_finite() {
        return Err(unparsable(text, "distance is out of range"));
    }
    if value <= 0.0 {
        return Ok(None);
    }

    Ok(Some(ParsedLabel {
        distance: value,
        unit,
        compound,
        source_text: text[start..source_end].to_string(),
    }))
}

/// Render a distance the way calibration labels are written.
///
/// Feet use the feet-inches form; other units use `precision` decimals.
/// The output parses back with [`parse_calibration_label`].
pub fn format_calibration_label(distance: f64, unit: Unit, precision: usize) -> String {
    match unit {
        Unit::Ft => format!("{} ft", format_feet_inches(distance)),
        _ => format!("{:.*} {}", precision, distance, unit),
    }
}

fn unparsable(text: &str, reason: &str) -> MeasureError {
    MeasureError::UnparsableAnnotation(format!("{reason}: {text:?}"))
}

/// Byte offset of the first number that is not glued to a preceding word
fn find_number_start(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    for (idx, &b) in bytes.iter().enumerate() {
        let prev_is_word = idx > 0 && (bytes[idx - 1].is_ascii_alphanumeric() || bytes[idx - 1] == b'.');
        if prev_is_word {
            continue;
        }
        let next = bytes.get(idx + 1).copied();
        let next2 = bytes.get(idx + 2).copied();
        let starts = match b {
            b'0'..=b'9' => true,
            b'.' => next.is_some_and(|c| c.is_ascii_digit()),
            b'-' => {
                next.is_some_and(|c| c.is_ascii_digit())
                    || (next == Some(b'.') && next2.is_some_and(|c| c.is_ascii_digit()))
            }
            _ => false,
        };
        if starts {
            return Some(idx);
        }
    }
    None
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    /// `-?digits(.digits)?`, or `None` (cursor unmoved) when no number starts here
    fn number(&mut self) -> MeasureResult<Option<f64>> {
        let start = self.pos;
        self.eat('-');
        let mut digits = 0;
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            self.pos += c.len_utf8();
            digits += 1;
        }
        if self.eat('.') {
            while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                self.pos += c.len_utf8();
                digits += 1;
            }
        }
        if digits == 0 {
            self.pos = start;
            return Ok(None);
        }
        self.text[start..self.pos]
            .parse::<f64>()
            .map(Some)
            .map_err(|_| unparsable(self.text, "malformed number"))
    }

    fn mark(&mut self) -> Option<Mark> {
        let mark = match self.peek()? {
            '\'' | '’' | '′' => Mark::Feet,
            '"' | '”' | '″' => Mark::Inches,
            _ => return None,
        };
        self.pos += self.peek().map_or(0, char::len_utf8);
        Some(mark)
    }

    fn word(&mut self) -> Option<&str> {
        let start = self.pos;
        while let Some(c) = self.peek().filter(|c| c.is_ascii_alphabetic()) {
            self.pos += c.len_utf8();
        }
        if self.pos == start {
            None
        } else {
            Some(&self.text[start..self.pos])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Option<ParsedLabel> {
        parse_calibration_label(text, Unit::Ft).unwrap()
    }

    #[test]
    fn test_decimal_with_unit() {
        let label = parse("10.5 ft").unwrap();
        assert_eq!(label.distance, 10.5);
        assert_eq!(label.unit, Unit::Ft);
        assert!(!label.compound);
        assert_eq!(label.source_text, "10.5 ft");

        let label = parse("250mm").unwrap();
        assert_eq!(label.distance, 250.0);
        assert_eq!(label.unit, Unit::Mm);
    }

    #[test]
    fn test_feet_inches_compound() {
        let label = parse("Calibration: 10' 6\" ft").unwrap();
        assert!((label.distance - 10.5).abs() < 1e-12);
        assert_eq!(label.unit, Unit::Ft);
        assert!(label.compound);
        assert_eq!(label.source_text, "10' 6\" ft");
    }

    #[test]
    fn test_compound_variants() {
        for text in ["10'6\"", "10' 6\"", "10'-6\"", "10’ 6”"] {
            let label = parse(text).unwrap_or_else(|| panic!("no label in {text}"));
            assert!((label.distance - 10.5).abs() < 1e-12, "{text}");
            assert_eq!(label.unit, Unit::Ft, "{text}");
        }
    }

    #[test]
    fn test_compound_converted_to_explicit_unit() {
        let label = parse("10' 6\" in").unwrap();
        assert_eq!(label.unit, Unit::In);
        assert!((label.distance - 126.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_marks() {
        let label = parse("12\"").unwrap();
        assert_eq!(label.distance, 12.0);
        assert_eq!(label.unit, Unit::In);

        let label = parse("8'").unwrap();
        assert_eq!(label.distance, 8.0);
        assert_eq!(label.unit, Unit::Ft);
    }

    #[test]
    fn test_default_unit_when_bare() {
        let label = parse_calibration_label("42", Unit::M).unwrap().unwrap();
        assert_eq!(label.distance, 42.0);
        assert_eq!(label.unit, Unit::M);

        // An unrecognized trailing word is not a unit
        let label = parse_calibration_label("42 paces", Unit::Cm).unwrap().unwrap();
        assert_eq!(label.unit, Unit::Cm);
        assert_eq!(label.source_text, "42");
    }

    #[test]
    fn test_not_a_calibration_label() {
        assert!(parse("Kitchen").is_none());
        assert!(parse("").is_none());
        assert!(parse("0 ft").is_none());
        assert!(parse("-3 m").is_none());
        // Digits glued to a word are not a distance
        assert!(parse("Room2B").is_none());
    }

    #[test]
    fn test_malformed_compound() {
        assert!(matches!(
            parse_calibration_label("10' 6 ft", Unit::Ft),
            Err(MeasureError::UnparsableAnnotation(_))
        ));
        assert!(matches!(
            parse_calibration_label("10' 14\"", Unit::Ft),
            Err(MeasureError::UnparsableAnnotation(_))
        ));
    }

    #[test]
    fn test_out_of_range_number() {
        let huge = format!("{} ft", "9".repeat(400));
        assert!(matches!(
            parse_calibration_label(&huge, Unit::Ft),
            Err(MeasureError::UnparsableAnnotation(_))
        ));
    }

    #[test]
    fn test_format_round_trip() {
        let text = format_calibration_label(10.5, Unit::Ft, 2);
        assert_eq!(text, "10' 6\" ft");
        let label = parse(&text).unwrap();
        assert!((label.distance - 10.5).abs() < 1e-12);

        let text = format_calibration_label(3.25, Unit::M, 2);
        assert_eq!(text, "3.25 m");
        assert_eq!(parse(&text).unwrap().unit, Unit::M);
    }
}
