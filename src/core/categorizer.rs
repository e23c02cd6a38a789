//! LLM-backed categorization of flagged messages.
//!
//! A flagged message is walked through a fixed sequence of single-choice
//! questions (type, subtype, imminent harm, recommendation). Each answer is
//! read from the leading digit of the model's reply. A step that keeps
//! failing after its retry budget leaves its field unknown and the
//! remaining steps still run.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use super::retry::RetryPolicy;
use crate::adapters::{Classification, LlmService};
use crate::domain::report::display_or_none;
use crate::domain::{
    Categorization, HealthSubtype, ImminentHarm, MenuOption, MisinfoSubtype, MisinfoType,
    PoliticalSubtype, Recommendation, RecommendedAction, ReportOrigin, ReportType,
    SubmittedReport,
};

/// Questions asked of the model, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorizationStep {
    MisinfoType,
    PoliticalSubtype,
    HealthSubtype,
    ImminentHarm,
    Recommendation,
}

impl fmt::Display for CategorizationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MisinfoType => "misinfo_type",
            Self::PoliticalSubtype => "political_subtype",
            Self::HealthSubtype => "health_subtype",
            Self::ImminentHarm => "imminent_harm",
            Self::Recommendation => "recommendation",
        };
        f.write_str(name)
    }
}

/// Categorization errors. Never surfaced to users; a failed step yields an
/// unknown field.
#[derive(Debug, Error)]
pub enum CategorizationError {
    #[error("Categorization step '{step}' failed after {attempts} attempts: {message}")]
    StepFailed {
        step: CategorizationStep,
        attempts: u32,
        message: String,
    },
}

/// Everything the recommendation step gets to see about a report
#[derive(Debug, Clone)]
pub struct RecommendationRequest<'a> {
    pub content: &'a str,
    /// Classifier verdict, absent for user-filed reports
    pub classification: Option<Classification>,
    pub report_type: ReportType,
    pub misinfo_type: Option<MisinfoType>,
    pub misinfo_subtype: Option<MisinfoSubtype>,
    pub imminent_harm: Option<ImminentHarm>,
}

impl<'a> From<&'a SubmittedReport> for RecommendationRequest<'a> {
    fn from(report: &'a SubmittedReport) -> Self {
        let classification = match report.origin {
            ReportOrigin::AutoMod { confidence } => Some(Classification {
                label: crate::adapters::ClassifierLabel::Misinformation,
                confidence,
            }),
            ReportOrigin::User { .. } => None,
        };
        Self {
            content: &report.content,
            classification,
            report_type: report.report_type,
            misinfo_type: report.misinfo_type,
            misinfo_subtype: report.misinfo_subtype,
            imminent_harm: report.imminent_harm,
        }
    }
}

/// Runs the categorization questionnaire against an LLM
#[derive(Clone)]
pub struct Categorizer {
    llm: Arc<dyn LlmService>,
    retry: RetryPolicy,
}

impl Categorizer {
    pub fn new(llm: Arc<dyn LlmService>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    pub fn llm_name(&self) -> &str {
        self.llm.name()
    }

    /// Categorize a message the classifier flagged as misinformation.
    ///
    /// Always returns; unknown answers and exhausted steps are `None`.
    #[instrument(skip_all, fields(llm = %self.llm.name()))]
    pub async fn categorize(
        &self,
        content: &str,
        classification: Option<Classification>,
    ) -> Categorization {
        let misinfo_type: Option<MisinfoType> = self
            .choose(
                CategorizationStep::MisinfoType,
                prompts::MISINFO_TYPE_SYSTEM,
                content,
                "Please select the type of misinformation:",
            )
            .await;

        let misinfo_subtype = match misinfo_type {
            Some(MisinfoType::Political) => self
                .choose::<PoliticalSubtype>(
                    CategorizationStep::PoliticalSubtype,
                    prompts::POLITICAL_SYSTEM,
                    content,
                    "Classify the type of political misinformation the message falls under:",
                )
                .await
                .map(MisinfoSubtype::Political),
            Some(MisinfoType::Health) => self
                .choose::<HealthSubtype>(
                    CategorizationStep::HealthSubtype,
                    prompts::HEALTH_SYSTEM,
                    content,
                    "Classify the type of health misinformation the message falls under:",
                )
                .await
                .map(MisinfoSubtype::Health),
            Some(MisinfoType::Other) => Some(MisinfoSubtype::Other),
            None => None,
        };

        let imminent_harm: Option<ImminentHarm> = self
            .choose(
                CategorizationStep::ImminentHarm,
                prompts::HARM_SYSTEM,
                content,
                "Could this content likely cause imminent harm to people or public safety?",
            )
            .await;

        let recommendation = self
            .recommend(RecommendationRequest {
                content,
                classification,
                report_type: ReportType::Misinformation,
                misinfo_type,
                misinfo_subtype,
                imminent_harm,
            })
            .await;

        debug!(
            misinfo_type = ?misinfo_type,
            misinfo_subtype = ?misinfo_subtype,
            imminent_harm = ?imminent_harm,
            has_recommendation = recommendation.is_some(),
            "Categorization finished"
        );

        Categorization {
            misinfo_type,
            misinfo_subtype,
            imminent_harm,
            recommendation,
        }
    }

    /// Ask for a moderation recommendation with a short justification
    pub async fn recommend(&self, request: RecommendationRequest<'_>) -> Option<Recommendation> {
        let user = prompts::recommendation(&request);
        let response = self
            .complete_with_retry(
                CategorizationStep::Recommendation,
                prompts::RECOMMENDATION_SYSTEM,
                &user,
            )
            .await?;
        let recommendation = parse_recommendation(&response);
        if recommendation.justification.is_empty() && recommendation.action.is_none() {
            return None;
        }
        Some(recommendation)
    }

    async fn choose<T: MenuOption>(
        &self,
        step: CategorizationStep,
        system: &str,
        content: &str,
        question: &str,
    ) -> Option<T> {
        let user = prompts::single_choice::<T>(content, question);
        let response = self.complete_with_retry(step, system, &user).await?;
        let choice = T::from_leading_digit(&response);
        if choice.is_none() {
            warn!(%step, "Model answer did not start with a valid option");
        }
        choice
    }

    /// One LLM call under the retry policy; `None` once the budget is spent
    async fn complete_with_retry(
        &self,
        step: CategorizationStep,
        system: &str,
        user: &str,
    ) -> Option<String> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self.llm.complete(system, user).await {
                Ok(response) => return Some(response),
                Err(e) => {
                    if self.retry.should_retry(attempt) {
                        let delay = self.retry.delay;
                        warn!(
                            %step,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "LLM call failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let failure = CategorizationError::StepFailed {
                        step,
                        attempts: attempt,
                        message: e.to_string(),
                    };
                    error!(%step, attempt, error = %failure, "Categorization step failed permanently");
                    return None;
                }
            }
        }
    }
}

/// Split "2. Remove Content, because ..." into action and justification.
///
/// Falls back to matching the option phrase when no leading digit is given.
fn parse_recommendation(response: &str) -> Recommendation {
    let response = response.trim();
    let action = RecommendedAction::from_leading_digit(response);

    let justification = match action {
        Some(action) => {
            let rest = response[1..]
                .trim_start_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
            strip_prefix_ignore_case(rest, action.menu_label())
                .map(|tail| {
                    tail.trim_start_matches(|c: char| {
                        c.is_ascii_punctuation() || c.is_whitespace()
                    })
                })
                .unwrap_or(rest)
        }
        None => response,
    };

    let action = action.or_else(|| {
        RecommendedAction::OPTIONS
            .iter()
            .copied()
            .find(|option| response.contains(option.menu_label()))
    });

    Recommendation {
        action,
        justification: justification.to_string(),
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

mod prompts {
    use super::*;

    pub const MISINFO_TYPE_SYSTEM: &str = "You are a misinformation trust & safety expert content moderator for a social media platform who has been assigned to analyze content reported as misinformation.";

    pub const POLITICAL_SYSTEM: &str = "You are a political trust & safety expert content moderator for a social media platform who has been assigned to analyze content reported as political misinformation.";

    pub const HEALTH_SYSTEM: &str = "You are a health trust & safety expert content moderator for a social media platform who has been assigned to analyze content reported as health misinformation.";

    pub const HARM_SYSTEM: &str = "You are a trust & safety expert content moderator for a social media platform who has been assigned to analyze reported content and assess its potential for harm.";

    pub const RECOMMENDATION_SYSTEM: &str = "You are a trust & safety expert content moderator for a social media platform. You have been assigned to assist a human moderator in making a decision about reported content. Here is the information you have about the report:";

    pub fn single_choice<T: MenuOption>(content: &str, question: &str) -> String {
        format!(
            "Message Content: {}\n{}\n{}\n\nRespond with ONLY the number (1-{}).",
            content,
            question,
            T::menu(),
            T::OPTIONS.len()
        )
    }

    pub fn recommendation(request: &RecommendationRequest<'_>) -> String {
        let (label, confidence) = match request.classification {
            Some(c) if c.is_misinformation() => {
                ("Misinformation".to_string(), format!("{:.2}", c.confidence))
            }
            Some(c) => ("Not Misinformation".to_string(), format!("{:.2}", c.confidence)),
            None => ("None (user report)".to_string(), "None".to_string()),
        };

        format!(
            "Message Content: {content}\n\
             Classification: {label}\n\
             Confidence Score: {confidence}\n\
             Report Type: {report_type}\n\
             Misinformation Type: {misinfo_type}\n\
             Misinformation Subtype: {misinfo_subtype}\n\
             Imminent Harm: {harm}\n\n\
             Based on the message content, potential harm label and confidence score, which of the following do you recommend:\n\
             1. Allow Content, it is not harmful or inappropriate and the classifier's decision is incorrect.\n\
             2. Remove Content, it should not be allowed to remain on the platform.\n\
             3. Escalate to a human moderator.\n\n\
             Start your answer with the number of your choice (1-3), then justify your recommendation in less than 80 words.",
            content = request.content,
            label = label,
            confidence = confidence,
            report_type = request.report_type,
            misinfo_type = display_or_none(request.misinfo_type),
            misinfo_subtype = display_or_none(request.misinfo_subtype),
            harm = display_or_none(request.imminent_harm.map(|h| h.label())),
        )
    }
}
