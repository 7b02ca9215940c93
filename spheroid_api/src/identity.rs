use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Tracking key of a detected shape.
///
/// Spheroids carry only a `group`, their 1-based detection order.  Sensors that
/// were found inside spheroid `k` carry `group == k` and a letter counting the
/// sensors of that spheroid (`"3a"`, `"3b"`, ...).  A sensor that lies in no
/// spheroid keeps its own detection index as `group` and no letter; such a
/// sensor is treated as noise by correspondence and export.
///
/// Serialises as its display form so it can key JSON maps.
#[derive(Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub group: u32,
    pub letter: Option<char>,
}

pub const LETTERS: usize = 26;

impl Identity {
    pub fn numbered(group: u32) -> Identity {
        Identity {
            group,
            letter: None,
        }
    }

    pub fn sensor(group: u32, letter: char) -> Identity {
        Identity {
            group,
            letter: Some(letter),
        }
    }

    /// Identity of the `index`th (0-based) sensor matched to spheroid `group`.
    /// Returns `None` once the alphabet is exhausted.
    pub fn nth_sensor(group: u32, index: usize) -> Option<Identity> {
        if index >= LETTERS {
            return None;
        }
        Some(Identity::sensor(group, char::from(b'a' + index as u8)))
    }

    /// True for sensors that were assigned to a spheroid.
    pub fn is_lettered(&self) -> bool {
        self.letter.is_some()
    }

    /// The spheroid identity a lettered sensor belongs to.
    pub fn parent(&self) -> Identity {
        Identity::numbered(self.group)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.letter {
            Some(letter) => write!(f, "{}{}", self.group, letter),
            None => write!(f, "{}", self.group),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ParseIdentityError {
    Empty,
    MissingGroup(String),
    InvalidLetter(String),
}

impl std::fmt::Display for ParseIdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseIdentityError::Empty => write!(f, "empty identity"),
            ParseIdentityError::MissingGroup(s) => write!(f, "identity {:?} has no number", s),
            ParseIdentityError::InvalidLetter(s) => {
                write!(f, "identity {:?} must end in at most one lowercase letter", s)
            }
        }
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Identity {
    type Error = ParseIdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Identity {
    type Err = ParseIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseIdentityError::Empty);
        }
        let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
        let group: u32 = s[..digits]
            .parse()
            .map_err(|_| ParseIdentityError::MissingGroup(s.to_string()))?;

        let mut rest = s[digits..].chars();
        match (rest.next(), rest.next()) {
            (None, _) => Ok(Identity::numbered(group)),
            (Some(letter), None) if letter.is_ascii_lowercase() => {
                Ok(Identity::sensor(group, letter))
            }
            _ => Err(ParseIdentityError::InvalidLetter(s.to_string())),
        }
    }
}
