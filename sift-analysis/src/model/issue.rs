//! Issues: a tainted flow from sources into a sink that matched a rule.

use crate::domain::AbstractDomain;
use crate::feature::FeatureMayAlwaysSet;
use crate::position::Position;
use crate::rules::RuleRef;
use crate::taint::Taint;

/// An issue found at a call site or field write.
///
/// Issues are immutable once created apart from joining with issues sharing
/// the same key (rule, callee, sink index, position) across iterations.
#[derive(Debug, Clone)]
pub struct Issue {
    pub sources: Taint,
    pub sinks: Taint,
    pub rule: RuleRef,
    /// Callee text, shown in reports.
    pub callee: String,
    /// Stable index of the sink within the call site.
    pub sink_index: usize,
    pub position: Position,
    /// Features computed from the involved kinds and class properties.
    pub features: FeatureMayAlwaysSet,
}

impl Issue {
    /// Whether two issues describe the same flow location.
    pub fn same_key(&self, other: &Issue) -> bool {
        self.rule.code == other.rule.code
            && self.callee == other.callee
            && self.sink_index == other.sink_index
            && self.position == other.position
    }

    pub fn leq(&self, other: &Issue) -> bool {
        debug_assert!(self.same_key(other), "leq requires equal issue keys");
        self.sources.leq(&other.sources)
            && self.sinks.leq(&other.sinks)
            && self.features.leq(&other.features)
    }

    pub fn join_with(&mut self, other: &Issue) {
        debug_assert!(self.same_key(other), "join requires equal issue keys");
        self.sources.join_with(&other.sources);
        self.sinks.join_with(&other.sinks);
        self.features.join_with(&other.features);
    }
}

impl PartialEq for Issue {
    fn eq(&self, other: &Self) -> bool {
        self.same_key(other)
            && self.sources == other.sources
            && self.sinks == other.sinks
            && self.features == other.features
    }
}

impl Eq for Issue {}

/// The accumulated issues of one model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueSet {
    issues: Vec<Issue>,
}

impl IssueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an issue, joining with an existing issue sharing its key.
    pub fn add(&mut self, issue: Issue) {
        match self.issues.iter_mut().find(|existing| existing.same_key(&issue)) {
            Some(existing) => existing.join_with(&issue),
            None => self.issues.push(issue),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn leq(&self, other: &IssueSet) -> bool {
        self.issues.iter().all(|issue| {
            other
                .issues
                .iter()
                .any(|other_issue| issue.same_key(other_issue) && issue.leq(other_issue))
        })
    }

    pub fn join_with(&mut self, other: &IssueSet) {
        for issue in &other.issues {
            self.add(issue.clone());
        }
    }
}
