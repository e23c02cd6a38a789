//! Multi-level priority queue of submitted reports.
//!
//! Lane 0 is the most urgent. Dequeue always takes the head of the first
//! non-empty lane (strict priority, FIFO within a lane, no aging).

use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;

use crate::domain::report::display_or_none;
use crate::domain::SubmittedReport;

/// Lane names used when none are configured
pub const DEFAULT_LANES: [&str; 3] = [
    "Imminent physical/mental harm",
    "Imminent financial/property harm",
    "Non-imminent",
];

/// Queue errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// A report carried a priority outside `[0, levels)`; a defect in priority derivation
    #[error("Invalid priority level {priority} (queue has {levels} levels)")]
    InvalidPriority { priority: usize, levels: usize },

    #[error("All queues are empty")]
    QueueEmpty,
}

#[derive(Debug)]
struct Lane {
    name: String,
    reports: VecDeque<SubmittedReport>,
}

/// Ordered lanes of pending reports
#[derive(Debug)]
pub struct PriorityQueue {
    lanes: Vec<Lane>,
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new(DEFAULT_LANES)
    }
}

impl PriorityQueue {
    /// Create a queue with one lane per name, in priority order
    pub fn new<I, S>(lane_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lanes: lane_names
                .into_iter()
                .map(|name| Lane {
                    name: name.into(),
                    reports: VecDeque::new(),
                })
                .collect(),
        }
    }

    /// Number of lanes
    pub fn levels(&self) -> usize {
        self.lanes.len()
    }

    /// Append a report to the tail of its priority lane
    pub fn enqueue(&mut self, report: SubmittedReport) -> Result<(), QueueError> {
        let levels = self.levels();
        let lane = self
            .lanes
            .get_mut(report.priority)
            .ok_or(QueueError::InvalidPriority {
                priority: report.priority,
                levels,
            })?;
        lane.reports.push_back(report);
        Ok(())
    }

    /// Remove and return the oldest report of the most urgent non-empty lane
    pub fn dequeue(&mut self) -> Result<SubmittedReport, QueueError> {
        self.lanes
            .iter_mut()
            .find_map(|lane| lane.reports.pop_front())
            .ok_or(QueueError::QueueEmpty)
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.iter().all(|lane| lane.reports.is_empty())
    }

    /// Total number of pending reports
    pub fn len(&self) -> usize {
        self.lanes.iter().map(|lane| lane.reports.len()).sum()
    }

    /// Reports in one lane, oldest first (empty for an unknown lane)
    pub fn lane(&self, priority: usize) -> impl Iterator<Item = &SubmittedReport> {
        self.lanes
            .get(priority)
            .into_iter()
            .flat_map(|lane| lane.reports.iter())
    }

    /// Per-lane counts and total
    pub fn summary(&self) -> QueueSummary {
        let lanes: Vec<LaneSummary> = self
            .lanes
            .iter()
            .enumerate()
            .map(|(priority, lane)| LaneSummary {
                priority,
                name: lane.name.clone(),
                count: lane.reports.len(),
            })
            .collect();
        let total = lanes.iter().map(|lane| lane.count).sum();
        QueueSummary { lanes, total }
    }

    /// Every pending report, grouped by lane.
    ///
    /// Message bodies are only included when `show_content` is set.
    pub fn display_all(&self, show_content: bool) -> String {
        let mut output = String::new();
        for (priority, lane) in self.lanes.iter().enumerate() {
            output.push_str(&format!("--- Priority {}: {} ---\n", priority, lane.name));
            if lane.reports.is_empty() {
                output.push_str("  (No reports)\n");
                continue;
            }
            for (idx, report) in lane.reports.iter().enumerate() {
                output.push_str(&format!("  [{}]\n", idx + 1));
                output.push_str(&Self::display_one(report, show_content));
            }
        }
        output.trim_end().to_string()
    }

    /// One report's queue entry; the body is redacted unless `show_content`
    pub fn display_one(report: &SubmittedReport, show_content: bool) -> String {
        let mut output = format!(
            "       Report ID: {}\n       Filed by: {}\n       Author: {}\n       Type: {}\n       Subtype: {}\n       Imminent: {}\n",
            report.id,
            report.origin,
            report.author,
            display_or_none(report.misinfo_type),
            display_or_none(report.misinfo_subtype),
            display_or_none(report.imminent_harm),
        );
        if show_content {
            output.push_str(&format!("       Content: `{}`\n", report.content));
        }
        output
    }
}

/// Pending count of a single lane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneSummary {
    pub priority: usize,
    pub name: String,
    pub count: usize,
}

/// Snapshot of queue depth, rendered as a fixed-width table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSummary {
    pub lanes: Vec<LaneSummary>,
    pub total: usize,
}

impl fmt::Display for QueueSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "```Priority |              Queue Name             | # Reports")?;
        writeln!(f, "{}", "-".repeat(58))?;
        for lane in &self.lanes {
            writeln!(
                f,
                "{:^8} | {:<35} | {:^9}",
                lane.priority, lane.name, lane.count
            )?;
        }
        writeln!(f, "{}", "-".repeat(58))?;
        writeln!(f, "Total pending reports: {}", self.total)?;
        write!(f, "```")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Categorization, ImminentHarm, MessageRef};

    fn report(id: u64, harm: Option<ImminentHarm>) -> SubmittedReport {
        SubmittedReport::from_categorization(
            id,
            MessageRef::new(1, 2, id),
            "author",
            format!("secret body {}", id),
            0.9,
            Categorization {
                imminent_harm: harm,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_strict_priority_then_fifo() {
        let mut queue = PriorityQueue::default();
        queue.enqueue(report(1, None)).unwrap();
        queue.enqueue(report(2, Some(ImminentHarm::Financial))).unwrap();
        queue.enqueue(report(3, Some(ImminentHarm::Mental))).unwrap();
        queue.enqueue(report(4, Some(ImminentHarm::Physical))).unwrap();

        let order: Vec<u64> = std::iter::from_fn(|| queue.dequeue().ok())
            .map(|r| r.id)
            .collect();
        assert_eq!(order, vec![3, 4, 2, 1]);
    }

    #[test]
    fn test_invalid_priority() {
        let mut queue = PriorityQueue::new(["only"]);
        let err = queue.enqueue(report(1, None)).unwrap_err();
        assert_eq!(
            err,
            QueueError::InvalidPriority {
                priority: 2,
                levels: 1
            }
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_empty_queue() {
        let mut queue = PriorityQueue::default();
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue().unwrap_err(), QueueError::QueueEmpty);
    }

    #[test]
    fn test_summary_counts() {
        let mut queue = PriorityQueue::default();
        queue.enqueue(report(1, None)).unwrap();
        queue.enqueue(report(2, None)).unwrap();
        queue.enqueue(report(3, Some(ImminentHarm::Physical))).unwrap();

        let summary = queue.summary();
        let counts: Vec<usize> = summary.lanes.iter().map(|l| l.count).collect();
        assert_eq!(counts, vec![1, 0, 2]);
        assert_eq!(summary.total, 3);

        let rendered = summary.to_string();
        assert!(rendered.contains("Total pending reports: 3"));
        assert!(rendered.contains("Non-imminent"));
    }

    #[test]
    fn test_display_redacts_content_by_default() {
        let mut queue = PriorityQueue::default();
        queue.enqueue(report(7, None)).unwrap();

        let redacted = queue.display_all(false);
        assert!(redacted.contains("Report ID: 7"));
        assert!(!redacted.contains("secret body"));
        assert!(redacted.contains("--- Priority 0: Imminent physical/mental harm ---\n  (No reports)"));

        let full = queue.display_all(true);
        assert!(full.contains("Content: `secret body 7`"));
    }
}
