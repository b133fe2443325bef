//! Trace input: one `op address_hex` record per line, `op` being `r`
//! or `w`.

use nom::{
    bytes::complete::tag,
    character::complete::{hex_digit1, one_of, space1},
    combinator::{map_res, opt},
    IResult,
};
use thiserror::Error;

use crate::common::{AccessKind, Addr};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceRecord {
    pub kind: AccessKind,
    pub addr: Addr,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TraceError {
    #[error("line {line}: malformed trace record `{content}`")]
    Malformed { line: usize, content: String },
}

fn record(input: &str) -> IResult<&str, TraceRecord> {
    let (input, op) = one_of("rw")(input)?;
    let (input, _) = space1(input)?;
    let (input, _) = opt(tag("0x"))(input)?;
    let (input, value) = map_res(hex_digit1, |s: &str| u32::from_str_radix(s, 16))(input)?;
    let kind = match op {
        'r' => AccessKind::Read,
        _ => AccessKind::Write,
    };
    Ok((
        input,
        TraceRecord {
            kind,
            addr: Addr::new(value),
        },
    ))
}

/// Parse a whole trace. Blank lines and surrounding whitespace are
/// tolerated; anything else fails with the 1-based line number.
pub fn parse_trace(input: &str) -> Result<Vec<TraceRecord>, TraceError> {
    let mut records = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match record(trimmed) {
            Ok(("", rec)) => records.push(rec),
            _ => {
                return Err(TraceError::Malformed {
                    line: i + 1,
                    content: line.to_string(),
                })
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_records() {
        let recs = parse_trace("r deadbeef\nw 400\n").unwrap();
        assert_eq!(
            recs,
            vec![
                TraceRecord {
                    kind: AccessKind::Read,
                    addr: Addr::new(0xdeadbeef),
                },
                TraceRecord {
                    kind: AccessKind::Write,
                    addr: Addr::new(0x400),
                },
            ]
        );
    }

    #[test]
    fn test_blank_lines_and_whitespace_tolerated() {
        let recs = parse_trace("\nr 10  \n\n  w 0x20\n\n").unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1].addr, Addr::new(0x20));
    }

    #[test]
    fn test_malformed_line_is_located() {
        let err = parse_trace("r 10\nx 20\n").unwrap_err();
        assert_eq!(
            err,
            TraceError::Malformed {
                line: 2,
                content: "x 20".to_string(),
            }
        );
    }

    #[test]
    fn test_address_overflow_rejected() {
        let err = parse_trace("r 100000000\n").unwrap_err();
        assert!(matches!(err, TraceError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(parse_trace("r 10 20\n").is_err());
        assert!(parse_trace("read 10\n").is_err());
    }
}
