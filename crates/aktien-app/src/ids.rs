// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// International Securities Identification Number, the row key for a stock.
/// The server owns validation; the client only carries it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Isin(String);

impl Isin {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Favorite rank 0-9, where 0 means "not a favorite".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct FavoriteRank(u8);

impl FavoriteRank {
    pub const NONE: Self = Self(0);
    pub const MAX: u8 = 9;
    pub const RANKED: [u8; 9] = [1, 2, 3, 4, 5, 6, 7, 8, 9];

    pub fn new(raw: u8) -> Option<Self> {
        (raw <= Self::MAX).then_some(Self(raw))
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn is_ranked(self) -> bool {
        self.0 > 0
    }

    /// Next rank in the 0 -> 1 -> ... -> 9 -> 0 cycle.
    pub const fn cycled(self) -> Self {
        Self((self.0 + 1) % (Self::MAX + 1))
    }
}

impl TryFrom<u8> for FavoriteRank {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or_else(|| format!("favorite rank {raw} is out of range 0-9"))
    }
}

impl From<FavoriteRank> for u8 {
    fn from(rank: FavoriteRank) -> Self {
        rank.0
    }
}

impl fmt::Display for FavoriteRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ranked() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("-")
        }
    }
}
