use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};

use crate::error::Error;

const LEVEL_SHIFT: u32 = 48;
const OBJECTID_MASK: u64 = (1 << LEVEL_SHIFT) - 1;

/// Level assumed when a qgroupid is given as a bare number.
pub const DEFAULT_LEVEL: u16 = 0;

/// A quota group identifier: hierarchy level in the top 16 bits, object id in the low 48.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QgroupId {
    level: u16,
    objectid: u64,
}

impl QgroupId {
    pub const MAX_OBJECTID: u64 = OBJECTID_MASK;

    pub fn new(level: u16, objectid: u64) -> Option<Self> {
        (objectid <= OBJECTID_MASK).then_some(Self { level, objectid })
    }

    /// Subvolume-level group for a subvolume id.
    pub fn subvolume(objectid: u64) -> Option<Self> {
        Self::new(DEFAULT_LEVEL, objectid)
    }

    pub const fn level(self) -> u16 {
        self.level
    }

    pub const fn objectid(self) -> u64 {
        self.objectid
    }

    pub const fn encode(self) -> u64 {
        (self.level as u64) << LEVEL_SHIFT | self.objectid
    }

    pub const fn decode(raw: u64) -> Self {
        Self {
            level: (raw >> LEVEL_SHIFT) as u16,
            objectid: raw & OBJECTID_MASK,
        }
    }
}

pub const fn level_of(raw: u64) -> u16 {
    QgroupId::decode(raw).level
}

pub const fn objectid_of(raw: u64) -> u64 {
    QgroupId::decode(raw).objectid
}

fn parse_component(s: &str) -> Option<u64> {
    // u64::from_str takes a leading '+', which the id syntax doesn't allow
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for QgroupId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || Error::MalformedId(s.to_string());
        let (level, objectid) = match s.split_once('/') {
            Some((level, objectid)) => {
                let level = parse_component(level)
                    .and_then(|l| u16::try_from(l).ok())
                    .ok_or_else(malformed)?;
                (level, parse_component(objectid).ok_or_else(malformed)?)
            }
            None => (DEFAULT_LEVEL, parse_component(s).ok_or_else(malformed)?),
        };
        QgroupId::new(level, objectid).ok_or_else(malformed)
    }
}

pub fn parse(s: &str) -> Result<QgroupId, Error> {
    s.parse()
}

impl fmt::Display for QgroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.level, self.objectid)
    }
}

impl Serialize for QgroupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
