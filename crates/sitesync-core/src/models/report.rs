//! Field reports submitted from the dashboard: progress updates and issues

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::util::{iso_timestamp_now, normalize_text_option};

/// A progress percentage reported for a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub site_id: String,
    /// Completion percentage, 0 to 100
    pub percentage: u8,
    pub notes: String,
    /// ISO-8601 timestamp of the report
    pub timestamp: String,
    pub reported_by: String,
}

impl ProgressUpdate {
    /// Build a progress update, rejecting a missing site or a percentage
    /// outside `0..=100`.
    pub fn new(
        site_id: &str,
        percentage: i64,
        notes: Option<String>,
        reported_by: &str,
    ) -> Result<Self> {
        let site_id = require_site_id(site_id)?;
        let percentage = u8::try_from(percentage)
            .ok()
            .filter(|value| *value <= 100)
            .ok_or_else(|| {
                Error::Validation("Percentage must be a number between 0 and 100".to_string())
            })?;

        Ok(Self {
            site_id,
            percentage,
            notes: normalize_text_option(notes).unwrap_or_default(),
            timestamp: iso_timestamp_now(),
            reported_by: reported_by.to_string(),
        })
    }
}

/// Issue severity levels used by the issues sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::Medium => f.write_str("medium"),
            Self::High => f.write_str("high"),
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(Error::Validation(format!("Unknown severity '{other}'"))),
        }
    }
}

/// An issue reported against a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueReport {
    pub site_id: String,
    pub description: String,
    pub severity: Severity,
    pub status: String,
    pub timestamp: String,
    pub reported_by: String,
}

impl IssueReport {
    /// Build a new open issue, rejecting a missing site or description.
    pub fn new(
        site_id: &str,
        description: &str,
        severity: Severity,
        reported_by: &str,
    ) -> Result<Self> {
        let site_id = require_site_id(site_id)?;
        let description = normalize_text_option(Some(description.to_string()))
            .ok_or_else(|| Error::Validation("Description is required".to_string()))?;

        Ok(Self {
            site_id,
            description,
            severity,
            status: "open".to_string(),
            timestamp: iso_timestamp_now(),
            reported_by: reported_by.to_string(),
        })
    }
}

pub(crate) fn require_site_id(site_id: &str) -> Result<String> {
    normalize_text_option(Some(site_id.to_string()))
        .ok_or_else(|| Error::Validation("Site ID is required".to_string()))
}
