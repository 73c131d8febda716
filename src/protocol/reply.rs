//! # Reply Framing
//!
//! The server answers either with bare JSON or with a *framed* reply:
//!
//! ```text
//! DXTL <field>:<field>;<sequence>[...]\n{"result": {...}}
//! ```
//!
//! A framed reply starts with the literal `DXTL`. Its header line runs up to
//! the first newline and is split on `:` or `;` (empty fields dropped); the
//! third field is the integer sequence tag to acknowledge. The body is
//! everything from the newline onward.

use crate::error::ReplyError;

/// Literal prefix of a framed reply.
pub const FRAME_TAG: &[u8; 4] = b"DXTL";

/// Position of the sequence tag among the header fields.
const SEQUENCE_FIELD: usize = 2;

/// A reply split into its optional sequence tag and its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<'a> {
    /// Sequence tag from the header; `None` for unframed replies
    pub sequence: Option<i64>,

    /// Bytes to parse as the result JSON
    pub body: &'a [u8],
}

impl<'a> Reply<'a> {
    /// Split a raw reply. Unframed replies never fail here; framed replies
    /// fail when their header is malformed.
    pub fn parse(raw: &'a [u8]) -> Result<Self, ReplyError> {
        if !is_framed(raw) {
            return Ok(Self {
                sequence: None,
                body: raw,
            });
        }

        let newline = raw
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(ReplyError::MissingHeaderTerminator)?;
        let (header, body) = raw.split_at(newline);

        Ok(Self {
            sequence: Some(parse_sequence(header)?),
            body,
        })
    }

    pub fn is_framed(&self) -> bool {
        self.sequence.is_some()
    }
}

/// Whether `raw` starts with the frame tag.
pub fn is_framed(raw: &[u8]) -> bool {
    raw.starts_with(FRAME_TAG)
}

/// Split a header line into its non-empty fields.
pub fn header_fields(header: &str) -> Vec<&str> {
    header
        .split(|c: char| c == ':' || c == ';')
        .filter(|field| !field.is_empty())
        .collect()
}

/// Extract the sequence tag from a header line.
pub fn parse_sequence(header: &[u8]) -> Result<i64, ReplyError> {
    let header = String::from_utf8_lossy(header);
    let fields = header_fields(&header);

    let field = fields
        .get(SEQUENCE_FIELD)
        .ok_or(ReplyError::TooFewHeaderFields(fields.len()))?;

    field
        .trim()
        .parse()
        .map_err(|_| ReplyError::InvalidSequence(field.to_string()))
}
