//! Action Codec
//!
//! Wire format for [`GameMessage`]: one JSON object per line, tagged with an
//! `action_type` discriminant.
//!
//! # Record Format
//!
//! ```text
//! {"action_type":"FillCell","row":2,"col":3,"number":7}\n
//! {"action_type":"SelectCell","row":0,"col":0}\n
//! {"action_type":"StartGame","board":[5,3,0,...]}\n      (81 cells)
//! ```
//!
//! The codec itself never emits the terminator; [`Transport`] appends it on
//! write and strips it on read.
//!
//! # Decoding
//!
//! The discriminant is read first and selects the field schema. Unknown or
//! missing discriminants, missing fields and out-of-range values are all
//! [`DecodeError`]s; a partially populated message is never produced.
//! Extra keys are ignored.
//!
//! [`Transport`]: super::Transport

use serde_json::{Map, Value};
use thiserror::Error;

use crate::board::{Grid, CELL_COUNT, MAX_DIGIT};
use crate::messages::{check_range, FieldError, GameMessage, MessageKind, MAX_INDEX};

/// Key carrying the message discriminant
pub const DISCRIMINANT: &str = "action_type";

/// Errors decoding a wire record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not valid JSON
    #[error("malformed record: {0}")]
    Malformed(String),

    /// Valid JSON, but not an object
    #[error("record is not a JSON object")]
    NotAnObject,

    /// No `action_type` key (or `null`)
    #[error("record has no `action_type`")]
    MissingDiscriminant,

    /// `action_type` names no known variant
    #[error("unknown `action_type`: {0}")]
    UnknownDiscriminant(String),

    /// Required field absent (or `null`)
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// Field present with the wrong JSON type
    #[error("field `{field}` {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// What was wrong
        reason: &'static str,
    },

    /// Field value outside its range
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Errors encoding a message
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Message carries an out-of-range field
    #[error("refusing to encode invalid message: {0}")]
    Field(#[from] FieldError),

    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Encode a message as a single record (without terminator)
///
/// # Errors
///
/// Returns [`EncodeError::Field`] if the message fails validation.
pub fn encode(msg: &GameMessage) -> Result<String, EncodeError> {
    msg.validate()?;
    // Compact serde_json output escapes control characters, so the record
    // cannot contain a raw line terminator.
    Ok(serde_json::to_string(msg)?)
}

/// Decode one record
///
/// A trailing `\n` or `\r\n` is tolerated.
///
/// # Errors
///
/// See [`DecodeError`].
pub fn decode(line: &str) -> Result<GameMessage, DecodeError> {
    let line = line.trim_end_matches(['\n', '\r']);
    let value: Value =
        serde_json::from_str(line).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let Value::Object(record) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let kind = match record.get(DISCRIMINANT) {
        None | Some(Value::Null) => return Err(DecodeError::MissingDiscriminant),
        Some(Value::String(name)) => MessageKind::from_wire(name)
            .ok_or_else(|| DecodeError::UnknownDiscriminant(name.clone()))?,
        Some(other) => return Err(DecodeError::UnknownDiscriminant(other.to_string())),
    };

    match kind {
        MessageKind::FillCell => Ok(GameMessage::FillCell {
            row: ranged(&record, "row", MAX_INDEX)?,
            col: ranged(&record, "col", MAX_INDEX)?,
            number: ranged(&record, "number", MAX_DIGIT)?,
        }),
        MessageKind::SelectCell => Ok(GameMessage::SelectCell {
            row: ranged(&record, "row", MAX_INDEX)?,
            col: ranged(&record, "col", MAX_INDEX)?,
        }),
        MessageKind::StartGame => Ok(GameMessage::StartGame {
            board: board(&record)?,
        }),
    }
}

fn field<'a>(record: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, DecodeError> {
    match record.get(name) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(name)),
        Some(value) => Ok(value),
    }
}

fn ranged(record: &Map<String, Value>, name: &'static str, max: u8) -> Result<u8, DecodeError> {
    let value = field(record, name)?
        .as_i64()
        .ok_or(DecodeError::InvalidField {
            field: name,
            reason: "must be an integer",
        })?;
    Ok(check_range(name, value, max)?)
}

fn board(record: &Map<String, Value>) -> Result<Grid, DecodeError> {
    let cells = field(record, "board")?
        .as_array()
        .ok_or(DecodeError::InvalidField {
            field: "board",
            reason: "must be an array",
        })?;

    if cells.len() != CELL_COUNT {
        return Err(FieldError::BoardLength(cells.len()).into());
    }

    let mut digits = Vec::with_capacity(CELL_COUNT);
    for (index, cell) in cells.iter().enumerate() {
        let value = cell.as_i64().ok_or(DecodeError::InvalidField {
            field: "board",
            reason: "cells must be integers",
        })?;
        let digit = u8::try_from(value)
            .ok()
            .filter(|d| *d <= MAX_DIGIT)
            .ok_or(FieldError::BoardCell { index, value })?;
        digits.push(digit);
    }

    Ok(Grid::from_cells(digits)?)
}

/// Stateless codec handle
///
/// Thin wrapper over [`encode`] / [`decode`] for call sites that prefer to
/// hold a codec value.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActionCodec;

impl ActionCodec {
    /// Create a codec
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// See [`encode`]
    pub fn encode(&self, msg: &GameMessage) -> Result<String, EncodeError> {
        encode(msg)
    }

    /// See [`decode`]
    pub fn decode(&self, line: &str) -> Result<GameMessage, DecodeError> {
        decode(line)
    }
}
