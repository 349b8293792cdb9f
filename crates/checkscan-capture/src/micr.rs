// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// MICR line parsing.
//
// The transport reports the check line as one string using `c` (transit) and
// `d` (on-us) for the MICR symbols; the serial reader locates each element
// itself. Both end up as `MicrFields`, with missing fields held as `"??"`.

use checkscan_core::MicrFields;
use checkscan_device::MicrElements;

/// Characters dropped before tokenising.
const STRIPPED: [char; 2] = ['-', '!'];

/// Field separators on the transport's MICR line.
const SEPARATORS: [char; 3] = ['c', 'd', ' '];

/// Parse a transport MICR line into routing, account and check number, in
/// that positional order. At most three tokens are used.
pub fn parse_micr_line(line: &str) -> MicrFields {
    let cleaned: String = line.chars().filter(|c| !STRIPPED.contains(c)).collect();
    let tokens: Vec<&str> = cleaned
        .trim()
        .split(SEPARATORS)
        .filter(|t| !t.is_empty())
        .take(3)
        .collect();

    let field = |i: usize| tokens.get(i).map_or(MicrFields::MISSING, |t| *t).to_string();
    MicrFields {
        routing_number: field(0),
        account_number: field(1),
        check_number: field(2),
        recovered: tokens.len(),
    }
}

/// Normalise elements located by the serial reader. Blank elements count as
/// missing.
pub fn from_elements(elements: &MicrElements) -> MicrFields {
    let mut recovered = 0;
    let mut field = |value: &str| {
        let value = value.trim();
        if value.is_empty() {
            MicrFields::MISSING.to_string()
        } else {
            recovered += 1;
            value.to_string()
        }
    };
    let routing_number = field(&elements.routing_number);
    let account_number = field(&elements.account_number);
    let check_number = field(&elements.check_number);
    MicrFields {
        routing_number,
        account_number,
        check_number,
        recovered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_digit_routing_is_parsed_but_invalid() {
        let fields = parse_micr_line("1234567890 c 987654321 d 42 !");
        assert_eq!(fields.routing_number, "1234567890");
        assert_eq!(fields.account_number, "987654321");
        assert_eq!(fields.check_number, "42");
        assert_eq!(fields.recovered, 3);
        assert!(!fields.is_valid());
    }

    #[test]
    fn well_formed_line_is_valid() {
        let fields = parse_micr_line("123456789c55501d101");
        assert_eq!(
            (fields.routing_number.as_str(), fields.account_number.as_str(), fields.check_number.as_str()),
            ("123456789", "55501", "101")
        );
        assert!(fields.is_valid());
        assert!(fields.validate().is_ok());
    }

    #[test]
    fn dashes_inside_fields_are_removed() {
        let fields = parse_micr_line("-123-456-789- c 555-01 d 101");
        assert_eq!(fields.routing_number, "123456789");
        assert_eq!(fields.account_number, "55501");
    }

    #[test]
    fn missing_fields_default_to_placeholder() {
        let fields = parse_micr_line("123456789 c");
        assert_eq!(fields.recovered, 1);
        assert_eq!(fields.account_number, MicrFields::MISSING);
        assert_eq!(fields.check_number, MicrFields::MISSING);
        assert!(!fields.is_valid());
    }

    #[test]
    fn extra_tokens_are_ignored() {
        let fields = parse_micr_line("123456789 c 55501 d 101 d 9999");
        assert_eq!(fields.check_number, "101");
        assert!(fields.is_valid());
    }

    #[test]
    fn blank_serial_elements_are_missing() {
        let fields = from_elements(&MicrElements {
            routing_number: "123456789".into(),
            account_number: "  ".into(),
            check_number: "101".into(),
        });
        assert_eq!(fields.recovered, 2);
        assert_eq!(fields.account_number, MicrFields::MISSING);
        assert!(!fields.is_valid());
    }
}
