// ==========================================
// Scrap Recycling - Domain Types
// ==========================================
// Enumerations shared by scrap records, batches and drobilka runs.
// DB/wire format: SCREAMING_SNAKE_CASE strings
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Scrap class
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrapClass {
    Hard, // hard scrap (sprues, rejected parts)
    Soft, // soft scrap (film, trimmings)
}

impl ScrapClass {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "HARD" => Some(ScrapClass::Hard),
            "SOFT" => Some(ScrapClass::Soft),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ScrapClass::Hard => "HARD",
            ScrapClass::Soft => "SOFT",
        }
    }
}

impl fmt::Display for ScrapClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// Scrap record status
// ==========================================
// PENDING -> CONFIRMED -> CLAIMED -> RECYCLED
//        \-----------\-> WRITTEN_OFF
// CLAIMED: folded into an IN_PROGRESS batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrapStatus {
    Pending,
    Confirmed,
    Claimed,
    Recycled,
    WrittenOff,
}

impl ScrapStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(ScrapStatus::Pending),
            "CONFIRMED" => Some(ScrapStatus::Confirmed),
            "CLAIMED" => Some(ScrapStatus::Claimed),
            "RECYCLED" => Some(ScrapStatus::Recycled),
            "WRITTEN_OFF" => Some(ScrapStatus::WrittenOff),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ScrapStatus::Pending => "PENDING",
            ScrapStatus::Confirmed => "CONFIRMED",
            ScrapStatus::Claimed => "CLAIMED",
            ScrapStatus::Recycled => "RECYCLED",
            ScrapStatus::WrittenOff => "WRITTEN_OFF",
        }
    }

    /// Counted by the ledger's uncollected totals
    pub fn is_uncollected(&self) -> bool {
        matches!(self, ScrapStatus::Pending | ScrapStatus::Confirmed)
    }
}

impl fmt::Display for ScrapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// Recycling batch status
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    InProgress,
    Completed,
}

impl BatchStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "IN_PROGRESS" => Some(BatchStatus::InProgress),
            "COMPLETED" => Some(BatchStatus::Completed),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            BatchStatus::InProgress => "IN_PROGRESS",
            BatchStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// Drobilka (grinding line) type
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrobilkaType {
    Hard,
    Soft,
}

impl DrobilkaType {
    pub const ALL: [DrobilkaType; 2] = [DrobilkaType::Hard, DrobilkaType::Soft];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "HARD" => Some(DrobilkaType::Hard),
            "SOFT" => Some(DrobilkaType::Soft),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            DrobilkaType::Hard => "HARD",
            DrobilkaType::Soft => "SOFT",
        }
    }

    /// Human-readable line name used in error messages
    pub fn line_name(&self) -> &'static str {
        match self {
            DrobilkaType::Hard => "hard line",
            DrobilkaType::Soft => "soft line",
        }
    }
}

impl fmt::Display for DrobilkaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl From<ScrapClass> for DrobilkaType {
    fn from(class: ScrapClass) -> Self {
        match class {
            ScrapClass::Hard => DrobilkaType::Hard,
            ScrapClass::Soft => DrobilkaType::Soft,
        }
    }
}
