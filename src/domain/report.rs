//! Report drafts, submitted snapshots and priority derivation.
//!
//! A `Report` is the mutable draft a reporter fills in through the
//! reporting flow. Once complete it is converted, exactly once, into an
//! immutable `SubmittedReport` that the queue owns.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::category::{
    ImminentHarm, MisinfoSubtype, MisinfoType, RecommendedAction, ReportType,
};
use super::message::{FetchedMessage, MessageRef, UserId};

/// Queue lane for a given harm assessment.
///
/// Physical or mental harm is most urgent (0), financial harm next (1),
/// everything else, including an unknown assessment, last (2).
pub fn priority(harm: Option<ImminentHarm>) -> usize {
    match harm {
        Some(ImminentHarm::Physical) | Some(ImminentHarm::Mental) => 0,
        Some(ImminentHarm::Financial) => 1,
        Some(ImminentHarm::NoHarm) | None => 2,
    }
}

/// LLM recommendation for the reviewing moderator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Parsed from the leading digit; `None` if the answer didn't start with one
    pub action: Option<RecommendedAction>,
    /// Free-text justification as returned by the model
    pub justification: String,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            Some(action) => write!(f, "{}. {}", action, self.justification),
            None => f.write_str(&self.justification),
        }
    }
}

/// Result of automatic categorization. Any field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categorization {
    pub misinfo_type: Option<MisinfoType>,
    pub misinfo_subtype: Option<MisinfoSubtype>,
    pub imminent_harm: Option<ImminentHarm>,
    pub recommendation: Option<Recommendation>,
}

/// Draft report collected from a reporting user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    reported: Option<FetchedMessage>,
    report_type: Option<ReportType>,
    misinfo_type: Option<MisinfoType>,
    misinfo_subtype: Option<MisinfoSubtype>,
    imminent_harm: Option<ImminentHarm>,
    filter_requested: bool,
    llm_recommendation: Option<Recommendation>,
    cancelled: bool,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reported_message(&mut self, message: FetchedMessage) {
        self.reported = Some(message);
    }

    /// Choosing a non-misinformation reason clears any misinformation fields
    pub fn set_report_type(&mut self, report_type: ReportType) {
        self.report_type = Some(report_type);
        if report_type != ReportType::Misinformation {
            self.misinfo_type = None;
            self.misinfo_subtype = None;
        }
    }

    /// Sets the misinformation type (and implies `ReportType::Misinformation`).
    /// "Other Misinformation" has no further breakdown, so its subtype is
    /// fixed to `MisinfoSubtype::Other` immediately.
    pub fn set_misinfo_type(&mut self, misinfo_type: MisinfoType) {
        self.report_type = Some(ReportType::Misinformation);
        self.misinfo_type = Some(misinfo_type);
        self.misinfo_subtype = match misinfo_type {
            MisinfoType::Other => Some(MisinfoSubtype::Other),
            _ => None,
        };
    }

    /// Sets the subtype together with the type it belongs to
    pub fn set_misinfo_subtype(&mut self, subtype: MisinfoSubtype) {
        self.report_type = Some(ReportType::Misinformation);
        self.misinfo_type = Some(subtype.misinfo_type());
        self.misinfo_subtype = Some(subtype);
    }

    pub fn set_imminent_harm(&mut self, harm: ImminentHarm) {
        self.imminent_harm = Some(harm);
    }

    pub fn set_filter_requested(&mut self, filter: bool) {
        self.filter_requested = filter;
    }

    pub fn set_llm_recommendation(&mut self, recommendation: Recommendation) {
        self.llm_recommendation = Some(recommendation);
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn reported_message(&self) -> Option<&FetchedMessage> {
        self.reported.as_ref()
    }

    pub fn report_type(&self) -> Option<ReportType> {
        self.report_type
    }

    pub fn misinfo_type(&self) -> Option<MisinfoType> {
        self.misinfo_type
    }

    pub fn misinfo_subtype(&self) -> Option<MisinfoSubtype> {
        self.misinfo_subtype
    }

    pub fn imminent_harm(&self) -> Option<ImminentHarm> {
        self.imminent_harm
    }

    pub fn filter_requested(&self) -> bool {
        self.filter_requested
    }

    pub fn llm_recommendation(&self) -> Option<&Recommendation> {
        self.llm_recommendation.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn priority(&self) -> usize {
        priority(self.imminent_harm)
    }

    /// subtype ⇒ type ⇒ Misinformation, and the subtype matches the type
    pub fn is_consistent(&self) -> bool {
        let subtype_ok = match self.misinfo_subtype {
            Some(subtype) => self.misinfo_type == Some(subtype.misinfo_type()),
            None => true,
        };
        let type_ok = self.misinfo_type.is_none()
            || self.report_type == Some(ReportType::Misinformation);
        subtype_ok && type_ok
    }
}

/// Errors converting a draft into a submitted report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("Report was cancelled")]
    Cancelled,

    #[error("Report is missing its {0}")]
    Incomplete(&'static str),
}

/// Who filed a submitted report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ReportOrigin {
    /// Filed by a user through the reporting flow
    User { reporter_id: UserId, reporter_name: String },

    /// Filed automatically after a classifier hit
    AutoMod { confidence: f64 },
}

impl fmt::Display for ReportOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { reporter_name, .. } => write!(f, "User {}", reporter_name),
            Self::AutoMod { .. } => f.write_str("[Auto-Mod]"),
        }
    }
}

/// Immutable snapshot of a finished report, as held by the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedReport {
    pub id: u64,
    pub origin: ReportOrigin,
    /// Reported message; its guild routes the eventual verdict
    pub message: MessageRef,
    pub author: String,
    pub content: String,
    pub report_type: ReportType,
    pub misinfo_type: Option<MisinfoType>,
    pub misinfo_subtype: Option<MisinfoSubtype>,
    pub imminent_harm: Option<ImminentHarm>,
    pub filter_requested: bool,
    pub llm_recommendation: Option<Recommendation>,
    pub priority: usize,
    pub submitted_at: DateTime<Utc>,
}

impl SubmittedReport {
    /// Snapshot a completed draft filed by `reporter`
    pub fn from_report(
        id: u64,
        report: Report,
        reporter_id: UserId,
        reporter_name: impl Into<String>,
    ) -> Result<Self, SubmitError> {
        if report.cancelled {
            return Err(SubmitError::Cancelled);
        }
        let reported = report
            .reported
            .ok_or(SubmitError::Incomplete("reported message"))?;
        let report_type = report
            .report_type
            .ok_or(SubmitError::Incomplete("report type"))?;

        Ok(Self {
            id,
            origin: ReportOrigin::User {
                reporter_id,
                reporter_name: reporter_name.into(),
            },
            message: reported.reference,
            author: reported.author_name,
            content: reported.content,
            report_type,
            misinfo_type: report.misinfo_type,
            misinfo_subtype: report.misinfo_subtype,
            imminent_harm: report.imminent_harm,
            filter_requested: report.filter_requested,
            llm_recommendation: report.llm_recommendation,
            priority: priority(report.imminent_harm),
            submitted_at: Utc::now(),
        })
    }

    /// Snapshot an automatic categorization of a flagged message
    pub fn from_categorization(
        id: u64,
        message: MessageRef,
        author: impl Into<String>,
        content: impl Into<String>,
        confidence: f64,
        categorization: Categorization,
    ) -> Self {
        Self {
            id,
            origin: ReportOrigin::AutoMod { confidence },
            message,
            author: author.into(),
            content: content.into(),
            report_type: ReportType::Misinformation,
            misinfo_type: categorization.misinfo_type,
            misinfo_subtype: categorization.misinfo_subtype,
            imminent_harm: categorization.imminent_harm,
            filter_requested: false,
            llm_recommendation: categorization.recommendation,
            priority: priority(categorization.imminent_harm),
            submitted_at: Utc::now(),
        }
    }

    /// `Misinformation > Health Misinformation > Vaccines`, with `None` for gaps
    pub fn category_path(&self) -> String {
        format!(
            "{} > {} > {}",
            self.report_type,
            display_or_none(self.misinfo_type),
            display_or_none(self.misinfo_subtype)
        )
    }

    /// Harm worth flagging as urgent, if any
    pub fn urgent_harm(&self) -> Option<ImminentHarm> {
        self.imminent_harm.filter(ImminentHarm::is_imminent)
    }
}

pub(crate) fn display_or_none<T: fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "None".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::category::HealthSubtype;

    fn fetched() -> FetchedMessage {
        FetchedMessage {
            reference: MessageRef::new(1, 2, 3),
            author_id: 42,
            author_name: "poster".to_string(),
            content: "the moon is made of cheese".to_string(),
        }
    }

    #[test]
    fn test_priority_derivation() {
        assert_eq!(priority(Some(ImminentHarm::Physical)), 0);
        assert_eq!(priority(Some(ImminentHarm::Mental)), 0);
        assert_eq!(priority(Some(ImminentHarm::Financial)), 1);
        assert_eq!(priority(Some(ImminentHarm::NoHarm)), 2);
        assert_eq!(priority(None), 2);
    }

    #[test]
    fn test_other_reason_clears_misinfo_fields() {
        let mut report = Report::new();
        report.set_misinfo_subtype(MisinfoSubtype::Health(HealthSubtype::Vaccines));
        report.set_report_type(ReportType::Other);

        assert_eq!(report.misinfo_type(), None);
        assert_eq!(report.misinfo_subtype(), None);
        assert!(report.is_consistent());
    }

    #[test]
    fn test_other_misinformation_fixes_subtype() {
        let mut report = Report::new();
        report.set_misinfo_type(MisinfoType::Other);

        assert_eq!(report.report_type(), Some(ReportType::Misinformation));
        assert_eq!(report.misinfo_subtype(), Some(MisinfoSubtype::Other));
        assert!(report.is_consistent());
    }

    #[test]
    fn test_submit_requires_message_and_type() {
        let report = Report::new();
        assert_eq!(
            SubmittedReport::from_report(0, report, 7, "reporter").unwrap_err(),
            SubmitError::Incomplete("reported message")
        );

        let mut report = Report::new();
        report.set_reported_message(fetched());
        report.cancel();
        assert_eq!(
            SubmittedReport::from_report(0, report, 7, "reporter").unwrap_err(),
            SubmitError::Cancelled
        );
    }

    #[test]
    fn test_submit_snapshot() {
        let mut report = Report::new();
        report.set_reported_message(fetched());
        report.set_misinfo_subtype(MisinfoSubtype::Health(HealthSubtype::Vaccines));
        report.set_imminent_harm(ImminentHarm::Financial);
        report.set_filter_requested(true);

        let submitted = SubmittedReport::from_report(9, report, 7, "reporter").unwrap();
        assert_eq!(submitted.id, 9);
        assert_eq!(submitted.priority, 1);
        assert_eq!(submitted.author, "poster");
        assert!(submitted.filter_requested);
        assert_eq!(
            submitted.category_path(),
            "Misinformation > Health Misinformation > Vaccines"
        );
        assert_eq!(submitted.urgent_harm(), Some(ImminentHarm::Financial));
    }

    #[test]
    fn test_auto_report_with_unknown_fields() {
        let submitted = SubmittedReport::from_categorization(
            1,
            MessageRef::new(1, 2, 3),
            "poster",
            "text",
            0.93,
            Categorization::default(),
        );
        assert_eq!(submitted.priority, 2);
        assert_eq!(submitted.category_path(), "Misinformation > None > None");
        assert_eq!(submitted.origin.to_string(), "[Auto-Mod]");
        assert_eq!(submitted.urgent_harm(), None);
    }
}
