use std::fmt;

use sizesplit_core::TargetSize;

/// Parse human-friendly size strings such as `29`, `29MB`, `1.5 MiB` or
/// `700k` into a [`TargetSize`].
///
/// # Grammar
///
/// ```text
/// size   = number [ whitespace ] [ unit ] ;
/// number = digits [ "." digits ] ;
/// digits = digit , { digit | "_" } ;
/// unit   = "b" | "k" | "kb" | "kib" | "m" | "mb" | "mib" | "g" | "gb" | "gib" ;
/// ```
///
/// Units are case-insensitive and binary: `1k` is 1024 bytes. A number
/// without a unit is read as megabytes. Fractional values are truncated to
/// whole bytes; the result must be at least one byte.
pub fn parse_size(value: &str) -> Result<TargetSize, SizeParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SizeParseError::Empty);
    }

    if let Some((offset, ch)) = trimmed.char_indices().find(|(_, c)| !c.is_ascii()) {
        return Err(SizeParseError::UnexpectedChar {
            index: offset,
            found: ch,
        });
    }

    let bytes = trimmed.as_bytes();
    let len = bytes.len();
    let mut index = 0usize;

    if bytes[index] == b'-' {
        return Err(SizeParseError::Negative);
    }

    let (mantissa, scale, number_len) = parse_number(bytes, index)?;
    index += number_len;
    skip_whitespace(bytes, &mut index);

    let unit = if index < len {
        let (unit, unit_len) = parse_unit(trimmed, bytes, index)?;
        index += unit_len;
        unit
    } else {
        Unit::Megabyte
    };

    if index < len {
        return Err(SizeParseError::UnexpectedChar {
            index,
            found: bytes[index] as char,
        });
    }

    let product = mantissa
        .checked_mul(unit.bytes())
        .ok_or(SizeParseError::TooLarge)?;
    let total = product / POW10[scale as usize];

    if total == 0 {
        return Err(SizeParseError::Zero);
    }

    let total = u64::try_from(total).map_err(|_| SizeParseError::TooLarge)?;
    TargetSize::from_bytes(total).map_err(|_| SizeParseError::Zero)
}

fn parse_number(bytes: &[u8], mut index: usize) -> Result<(u128, u32, usize), SizeParseError> {
    if index >= bytes.len() {
        return Err(SizeParseError::ExpectedNumber { index, found: None });
    }

    if !bytes[index].is_ascii_digit() {
        return Err(SizeParseError::ExpectedNumber {
            index,
            found: Some(bytes[index] as char),
        });
    }

    let mut mantissa: u128 = 0;
    let mut scale: u32 = 0;
    let mut seen_decimal = false;
    let mut decimal_index = None;
    let mut consumed = 0usize;

    while index < bytes.len() {
        let byte = bytes[index];
        match byte {
            b'0'..=b'9' => {
                mantissa = mantissa
                    .checked_mul(10)
                    .and_then(|m| m.checked_add((byte - b'0') as u128))
                    .ok_or(SizeParseError::TooLarge)?;
                if seen_decimal {
                    scale += 1;
                    if scale as usize >= POW10.len() {
                        return Err(SizeParseError::TooPrecise { index });
                    }
                }
                index += 1;
                consumed += 1;
            }
            b'_' => {
                index += 1;
                consumed += 1;
            }
            b'.' if !seen_decimal => {
                seen_decimal = true;
                decimal_index = Some(index);
                index += 1;
                consumed += 1;
            }
            b'.' => {
                return Err(SizeParseError::UnexpectedChar { index, found: '.' });
            }
            _ => break,
        }
    }

    if seen_decimal && scale == 0 {
        let dot_index = decimal_index.unwrap_or(index);
        return Err(SizeParseError::MissingFractionDigits { index: dot_index });
    }

    Ok((mantissa, scale, consumed))
}

fn parse_unit(
    original: &str,
    bytes: &[u8],
    index: usize,
) -> Result<(Unit, usize), SizeParseError> {
    let mut end = index;
    while end < bytes.len() && bytes[end].is_ascii_alphabetic() {
        end += 1;
    }

    if end == index {
        return Err(SizeParseError::UnexpectedChar {
            index,
            found: bytes[index] as char,
        });
    }

    let word = &original[index..end];
    let unit = match word.to_ascii_lowercase().as_str() {
        "b" => Unit::Byte,
        "k" | "kb" | "kib" => Unit::Kilobyte,
        "m" | "mb" | "mib" => Unit::Megabyte,
        "g" | "gb" | "gib" => Unit::Gigabyte,
        _ => {
            return Err(SizeParseError::UnknownUnit {
                index,
                found: word.to_string(),
            })
        }
    };

    Ok((unit, end - index))
}

fn skip_whitespace(bytes: &[u8], index: &mut usize) {
    while *index < bytes.len() && bytes[*index].is_ascii_whitespace() {
        *index += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeParseError {
    Empty,
    Negative,
    ExpectedNumber { index: usize, found: Option<char> },
    UnknownUnit { index: usize, found: String },
    MissingFractionDigits { index: usize },
    TooPrecise { index: usize },
    UnexpectedChar { index: usize, found: char },
    Zero,
    TooLarge,
}

impl std::error::Error for SizeParseError {}

impl fmt::Display for SizeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeParseError::Empty => write!(f, "size cannot be empty"),
            SizeParseError::Negative => write!(f, "size cannot be negative"),
            SizeParseError::ExpectedNumber { index, found } => match found {
                Some(ch) => write!(
                    f,
                    "expected a number at position {} but found '{}'",
                    index + 1,
                    ch
                ),
                None => write!(f, "expected a number at position {}", index + 1),
            },
            SizeParseError::UnknownUnit { index, found } => {
                write!(f, "unknown unit '{}' at position {}", found, index + 1)
            }
            SizeParseError::MissingFractionDigits { index } => write!(
                f,
                "expected digits after decimal point at position {}",
                index + 1
            ),
            SizeParseError::TooPrecise { index } => {
                write!(f, "too many fractional digits at position {}", index + 1)
            }
            SizeParseError::UnexpectedChar { index, found } => write!(
                f,
                "unexpected character '{}' at position {}",
                found,
                index + 1
            ),
            SizeParseError::Zero => write!(f, "size must be at least one byte"),
            SizeParseError::TooLarge => write!(f, "size exceeds {} bytes", u64::MAX),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Unit {
    Byte,
    Kilobyte,
    Megabyte,
    Gigabyte,
}

impl Unit {
    fn bytes(self) -> u128 {
        match self {
            Unit::Byte => 1,
            Unit::Kilobyte => 1 << 10,
            Unit::Megabyte => 1 << 20,
            Unit::Gigabyte => 1 << 30,
        }
    }
}

const POW10: [u128; 13] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_bytes(input: &str, expected: u64) {
        let actual = parse_size(input).unwrap();
        assert_eq!(actual.bytes(), expected, "input: {input}");
    }

    #[test]
    fn bare_numbers_are_megabytes() {
        assert_bytes("29", 29 * 1024 * 1024);
        assert_bytes(" 5 ", 5 * 1024 * 1024);
    }

    #[test]
    fn parses_units_case_insensitively() {
        assert_bytes("512b", 512);
        assert_bytes("700k", 700 * 1024);
        assert_bytes("700KiB", 700 * 1024);
        assert_bytes("25 MB", 25 * 1024 * 1024);
        assert_bytes("2Gb", 2 * 1024 * 1024 * 1024);
        assert_bytes("1_000 kb", 1_000 * 1024);
    }

    #[test]
    fn parses_fractions_truncating_to_bytes() {
        assert_bytes("1.5MiB", 1_572_864);
        assert_bytes("0.5k", 512);
        assert_bytes("1.9b", 1);
    }

    #[test]
    fn rejects_zero_and_negative_sizes() {
        assert_eq!(parse_size("0"), Err(SizeParseError::Zero));
        assert_eq!(parse_size("0.1b"), Err(SizeParseError::Zero));
        assert_eq!(parse_size("-5"), Err(SizeParseError::Negative));
    }

    #[test]
    fn rejects_invalid_formats() {
        assert_eq!(parse_size(""), Err(SizeParseError::Empty));
        assert!(matches!(
            parse_size("5tb"),
            Err(SizeParseError::UnknownUnit { .. })
        ));
        assert!(matches!(
            parse_size("mb5"),
            Err(SizeParseError::ExpectedNumber { .. })
        ));
        assert!(matches!(
            parse_size("5mb 3"),
            Err(SizeParseError::UnexpectedChar { .. })
        ));
        assert!(matches!(
            parse_size("1."),
            Err(SizeParseError::MissingFractionDigits { .. })
        ));
    }

    #[test]
    fn detects_overflow() {
        assert_eq!(
            parse_size("99999999999999999999g"),
            Err(SizeParseError::TooLarge)
        );
    }
}
