//! Well coordinates and channel orientation
//!
//! Rows are letters in bijective base-26 (`A`..`Z`, `AA`, ...), columns
//! are 1-based numbers, so row 0 / column 0 formats as `A1`. The parser
//! also accepts the colon-separated `A:1` form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Layout of a multi-channel head relative to the plate grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Channels span rows within one column.
    Vertical,
    /// Channels span columns within one row.
    Horizontal,
}

/// Zero-based (row, column) position within a plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WellCoords {
    pub row: usize,
    pub col: usize,
}

impl WellCoords {
    pub fn new(row: usize, col: usize) -> Self {
        WellCoords { row, col }
    }

    /// The coordinate shared by every member of a parallel set: the
    /// column for vertical channels, the row for horizontal ones.
    pub fn lane(self, orientation: Orientation) -> usize {
        match orientation {
            Orientation::Vertical => self.col,
            Orientation::Horizontal => self.row,
        }
    }

    fn row_letters(row: usize) -> String {
        let mut letters = Vec::new();
        let mut n = row + 1;
        while n > 0 {
            n -= 1;
            letters.push(b'A' + (n % 26) as u8);
            n /= 26;
        }
        letters.reverse();
        letters.into_iter().map(char::from).collect()
    }
}

impl fmt::Display for WellCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::row_letters(self.row), self.col + 1)
    }
}

impl FromStr for WellCoords {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let body = s.replacen(':', "", 1);
        let letters: String = body.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
        let digits = &body[letters.len()..];
        if letters.is_empty() || digits.is_empty() || digits.chars().any(|c| !c.is_ascii_digit()) {
            return Err(Error::InvalidCoords(s.to_string()));
        }

        let mut row: usize = 0;
        for c in letters.chars() {
            let v = (c.to_ascii_uppercase() as usize) - ('A' as usize) + 1;
            row = row * 26 + v;
        }
        let col: usize = digits
            .parse()
            .map_err(|_| Error::InvalidCoords(s.to_string()))?;
        if col == 0 {
            return Err(Error::InvalidCoords(s.to_string()));
        }
        Ok(WellCoords::new(row - 1, col - 1))
    }
}

impl Serialize for WellCoords {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for WellCoords {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
