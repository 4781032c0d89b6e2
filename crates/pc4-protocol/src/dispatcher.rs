//! Frame classification and print-command parsing.
//!
//! Shaped after `core-actions`'s command parser: a pure, synchronous
//! classify-then-parse split with an explicit fallthrough variant, one
//! `#[test]` per case. No side effects live here; the engine decides what
//! to do with a classified frame.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintCommand {
    pub template_id: u8,
    pub copies: u16,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    StatusRequest,
    ExtendedStatusRequest,
    ClearErrorFlags,
    PrintTemplate(PrintCommand),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("frame not recognized")]
    Unrecognized,
    #[error("print command is missing the template id or copies field")]
    MissingFields,
    #[error("template id must be exactly one character")]
    BadTemplateId,
    #[error("copies must be a decimal integer in [1, 9999]")]
    BadCopies,
    #[error("print command is not valid UTF-8")]
    NotUtf8,
}

/// Classify one complete frame (opening and closing `^` guaranteed by the
/// framer) and, for a print command, parse its payload.
pub fn classify(frame: &[u8]) -> Result<Frame, ParseError> {
    if frame == b"^S|^" {
        return Ok(Frame::StatusRequest);
    }
    if frame == b"^Se|^" {
        return Ok(Frame::ExtendedStatusRequest);
    }
    if frame == b"^C|^" {
        return Ok(Frame::ClearErrorFlags);
    }
    if is_print_template(frame) {
        return parse_print(frame).map(Frame::PrintTemplate);
    }
    Err(ParseError::Unrecognized)
}

fn is_print_template(frame: &[u8]) -> bool {
    frame.len() >= 5
        && frame[0] == b'^'
        && frame[1] == b'P'
        && frame[2] == b'|'
        && frame[frame.len() - 2] == b'|'
        && frame[frame.len() - 1] == b'^'
}

fn parse_print(frame: &[u8]) -> Result<PrintCommand, ParseError> {
    let content = &frame[3..frame.len() - 2];
    let content = std::str::from_utf8(content).map_err(|_| ParseError::NotUtf8)?;
    let parts: Vec<&str> = content.split('|').collect();
    if parts.len() < 2 {
        return Err(ParseError::MissingFields);
    }

    let template_id_str = parts[0];
    if template_id_str.len() != 1 || !template_id_str.is_ascii() {
        return Err(ParseError::BadTemplateId);
    }
    let template_id = template_id_str.as_bytes()[0];

    let copies: u16 = parts[1].parse().map_err(|_| ParseError::BadCopies)?;
    if !(1..=9999).contains(&copies) {
        return Err(ParseError::BadCopies);
    }

    let fields = parts[2..].iter().map(|s| s.to_string()).collect();
    Ok(PrintCommand {
        template_id,
        copies,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_request() {
        assert_eq!(classify(b"^S|^"), Ok(Frame::StatusRequest));
    }

    #[test]
    fn classifies_extended_status_request() {
        assert_eq!(classify(b"^Se|^"), Ok(Frame::ExtendedStatusRequest));
    }

    #[test]
    fn classifies_clear_error_flags() {
        assert_eq!(classify(b"^C|^"), Ok(Frame::ClearErrorFlags));
    }

    #[test]
    fn parses_print_with_zero_fields() {
        assert_eq!(
            classify(b"^P|A|1|^"),
            Ok(Frame::PrintTemplate(PrintCommand {
                template_id: b'A',
                copies: 1,
                fields: vec![],
            }))
        );
    }

    #[test]
    fn parses_print_with_multiple_fields() {
        assert_eq!(
            classify(b"^P|0|1|A|B|C|^"),
            Ok(Frame::PrintTemplate(PrintCommand {
                template_id: b'0',
                copies: 1,
                fields: vec!["A".into(), "B".into(), "C".into()],
            }))
        );
    }

    #[test]
    fn copies_boundary_accepted() {
        assert_eq!(
            classify(b"^P|X|9999|^"),
            Ok(Frame::PrintTemplate(PrintCommand {
                template_id: b'X',
                copies: 9999,
                fields: vec![],
            }))
        );
    }

    #[test]
    fn copies_zero_rejected() {
        assert_eq!(classify(b"^P|X|0|^"), Err(ParseError::BadCopies));
    }

    #[test]
    fn copies_over_max_rejected() {
        assert_eq!(classify(b"^P|X|10000|^"), Err(ParseError::BadCopies));
    }

    #[test]
    fn multi_character_template_id_rejected() {
        assert_eq!(classify(b"^P|XY|1|^"), Err(ParseError::BadTemplateId));
    }

    #[test]
    fn non_ascii_template_id_rejected() {
        // One Unicode scalar value (`e`-acute), two UTF-8 bytes: must not
        // slip past a char-count check and get truncated to a raw byte.
        assert_eq!(classify("^P|\u{e9}|1|^".as_bytes()), Err(ParseError::BadTemplateId));
    }

    #[test]
    fn unrecognized_frame_falls_through() {
        assert_eq!(classify(b"^Q|1|^"), Err(ParseError::Unrecognized));
    }

    #[test]
    fn paper_jam_clear_variant_is_not_dispatched() {
        // `^C|j|^` appears in historical constants but is never recognized.
        assert_eq!(classify(b"^C|j|^"), Err(ParseError::Unrecognized));
    }
}
