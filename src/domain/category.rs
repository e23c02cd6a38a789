//! Closed option sets for every categorization decision point.
//!
//! Each questionnaire step (human or LLM) answers with a 1-based menu
//! number; `MenuOption::from_choice` maps that number to a variant and
//! anything else to `None`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A closed, numbered set of answers to one question
pub trait MenuOption: Copy + Sized + 'static {
    /// Options in menu order (option `n` is `OPTIONS[n - 1]`)
    const OPTIONS: &'static [Self];

    /// Text shown next to the option number
    fn menu_label(&self) -> &'static str;

    /// Parse a 1-based menu selection. Only plain decimal digits are accepted.
    fn from_choice(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let index: usize = input.parse().ok()?;
        Self::OPTIONS.get(index.checked_sub(1)?).copied()
    }

    /// Parse the first character of a free-form answer as a selection
    fn from_leading_digit(response: &str) -> Option<Self> {
        let first = response.trim_start().chars().next()?;
        Self::from_choice(first.encode_utf8(&mut [0u8; 4]))
    }

    /// Numbered option lines, one per option
    fn menu() -> String {
        Self::OPTIONS
            .iter()
            .enumerate()
            .map(|(i, option)| format!("{}. {}", i + 1, option.menu_label()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Top-level reason for a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Misinformation,
    Other,
}

impl MenuOption for ReportType {
    const OPTIONS: &'static [Self] = &[Self::Misinformation, Self::Other];

    fn menu_label(&self) -> &'static str {
        match self {
            Self::Misinformation => "Misinformation",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.menu_label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisinfoType {
    Political,
    Health,
    Other,
}

impl MenuOption for MisinfoType {
    const OPTIONS: &'static [Self] = &[Self::Political, Self::Health, Self::Other];

    fn menu_label(&self) -> &'static str {
        match self {
            Self::Political => "Political Misinformation",
            Self::Health => "Health Misinformation",
            Self::Other => "Other Misinformation",
        }
    }
}

impl fmt::Display for MisinfoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.menu_label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoliticalSubtype {
    ElectionCampaign,
    GovernmentCivic,
    ManipulatedMedia,
    Other,
}

impl MenuOption for PoliticalSubtype {
    const OPTIONS: &'static [Self] = &[
        Self::ElectionCampaign,
        Self::GovernmentCivic,
        Self::ManipulatedMedia,
        Self::Other,
    ];

    fn menu_label(&self) -> &'static str {
        match self {
            Self::ElectionCampaign => "Election/Campaign Misinformation",
            Self::GovernmentCivic => "Government/Civic Services",
            Self::ManipulatedMedia => "Manipulated Photos/Video",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthSubtype {
    Vaccines,
    CuresTreatments,
    MentalHealth,
    Other,
}

impl MenuOption for HealthSubtype {
    const OPTIONS: &'static [Self] = &[
        Self::Vaccines,
        Self::CuresTreatments,
        Self::MentalHealth,
        Self::Other,
    ];

    fn menu_label(&self) -> &'static str {
        match self {
            Self::Vaccines => "Vaccines",
            Self::CuresTreatments => "Cures and Treatments",
            Self::MentalHealth => "Mental Health",
            Self::Other => "Other",
        }
    }
}

/// Subtype of a misinformation report.
///
/// The variant determines the parent `MisinfoType`, so a subtype can never
/// disagree with the type it was chosen under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "subtype")]
pub enum MisinfoSubtype {
    Political(PoliticalSubtype),
    Health(HealthSubtype),
    /// Subtype of "Other Misinformation"
    Other,
}

impl MisinfoSubtype {
    /// The misinformation type this subtype belongs to
    pub fn misinfo_type(&self) -> MisinfoType {
        match self {
            Self::Political(_) => MisinfoType::Political,
            Self::Health(_) => MisinfoType::Health,
            Self::Other => MisinfoType::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Political(s) => s.menu_label(),
            Self::Health(s) => s.menu_label(),
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for MisinfoSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Likelihood of imminent real-world harm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImminentHarm {
    /// Assessed, no imminent harm
    #[serde(rename = "none")]
    NoHarm,
    Physical,
    Mental,
    Financial,
}

impl ImminentHarm {
    /// True for every assessed harm except `NoHarm`
    pub fn is_imminent(&self) -> bool {
        !matches!(self, Self::NoHarm)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NoHarm => "none",
            Self::Physical => "physical",
            Self::Mental => "mental",
            Self::Financial => "financial",
        }
    }
}

impl MenuOption for ImminentHarm {
    const OPTIONS: &'static [Self] = &[Self::NoHarm, Self::Physical, Self::Mental, Self::Financial];

    fn menu_label(&self) -> &'static str {
        match self {
            Self::NoHarm => "No.",
            Self::Physical => "Yes, physical harm.",
            Self::Mental => "Yes, mental harm.",
            Self::Financial => "Yes, financial or property harm.",
        }
    }
}

impl fmt::Display for ImminentHarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reporter's answer to "block content from this account on your feed?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterChoice {
    No,
    Yes,
}

impl MenuOption for FilterChoice {
    const OPTIONS: &'static [Self] = &[Self::No, Self::Yes];

    fn menu_label(&self) -> &'static str {
        match self {
            Self::No => "No",
            Self::Yes => "Yes",
        }
    }
}

/// Action an LLM recommends to the reviewing moderator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Allow,
    Remove,
    Escalate,
}

impl MenuOption for RecommendedAction {
    const OPTIONS: &'static [Self] = &[Self::Allow, Self::Remove, Self::Escalate];

    fn menu_label(&self) -> &'static str {
        match self {
            Self::Allow => "Allow Content",
            Self::Remove => "Remove Content",
            Self::Escalate => "Escalate to a human moderator",
        }
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.menu_label())
    }
}
