//! Workspace business-hours gate for personal-services requests (§4.7):
//! off-hours requests must be refused with the in-hours window proposed
//! instead of silently falling through to booking.

use crate::database::DbPool;
use crate::error::Result;
use chrono::NaiveTime;
use uuid::Uuid;

pub struct BusinessHours {
    start: NaiveTime,
    end: NaiveTime,
}

impl BusinessHours {
    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.start <= self.end {
            now >= self.start && now < self.end
        } else {
            // Overnight window, e.g. 22:00-02:00.
            now >= self.start || now < self.end
        }
    }

    pub fn refusal_message(&self) -> String {
        format!(
            "That time is outside our attention hours. We're open from {} to {}. Would a time in that window work instead?",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Reads `workspace.settings.business_hours = {"start": "HH:MM", "end":
/// "HH:MM"}` (§3.1). Missing or malformed settings mean no gate is
/// enforced, since a workspace that never configured hours shouldn't be
/// blocked from booking at all.
pub async fn fetch(pool: &DbPool, workspace_id: Uuid) -> Result<Option<BusinessHours>> {
    let workspace = crate::queries::workspaces::get_workspace(pool, workspace_id).await?;
    let hours = workspace.settings.get("business_hours");
    let start = hours
        .and_then(|h| h.get("start"))
        .and_then(|v| v.as_str())
        .and_then(|s| NaiveTime::parse_from_str(s, "%H:%M").ok());
    let end = hours
        .and_then(|h| h.get("end"))
        .and_then(|v| v.as_str())
        .and_then(|s| NaiveTime::parse_from_str(s, "%H:%M").ok());

    Ok(match (start, end) {
        (Some(start), Some(end)) => Some(BusinessHours { start, end }),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hours(start: &str, end: &str) -> BusinessHours {
        BusinessHours {
            start: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
            end: NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
        }
    }

    #[test]
    fn same_day_window_excludes_before_and_after() {
        let window = hours("09:00", "18:00");
        assert!(window.contains(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
        assert!(!window.contains(NaiveTime::from_hms_opt(8, 0, 0).unwrap()));
        assert!(!window.contains(NaiveTime::from_hms_opt(20, 0, 0).unwrap()));
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let window = hours("22:00", "02:00");
        assert!(window.contains(NaiveTime::from_hms_opt(23, 0, 0).unwrap()));
        assert!(window.contains(NaiveTime::from_hms_opt(1, 0, 0).unwrap()));
        assert!(!window.contains(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
    }
}
