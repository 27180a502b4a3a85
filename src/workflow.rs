//! Assessment activity workflow.
//!
//! An activity moves through a fixed set of states from being set to a
//! student until it is passed, failed or discontinued. Every write that
//! changes `activities.status` goes through [`can_transition`]; answers carry
//! the same status values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Status {
    NotSet,
    InProgress,
    Submitted,
    InMarking,
    Redoing,
    Resubmitted,
    InRemarking,
    Passed,
    NotPassed,
    Discontinued,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

impl Status {
    pub const ALL: [Status; 10] = [
        Status::NotSet,
        Status::InProgress,
        Status::Submitted,
        Status::InMarking,
        Status::Redoing,
        Status::Resubmitted,
        Status::InRemarking,
        Status::Passed,
        Status::NotPassed,
        Status::Discontinued,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::NotSet => "NOTSET",
            Status::InProgress => "INPROGRESS",
            Status::Submitted => "SUBMITTED",
            Status::InMarking => "INMARKING",
            Status::Redoing => "REDOING",
            Status::Resubmitted => "RESUBMITTED",
            Status::InRemarking => "INREMARKING",
            Status::Passed => "PASSED",
            Status::NotPassed => "NOTPASSED",
            Status::Discontinued => "DISCONTINUED",
        }
    }

    /// States an activity may be created in.
    pub fn is_initial(self) -> bool {
        matches!(self, Status::NotSet | Status::InProgress)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Passed | Status::NotPassed | Status::Discontinued)
    }

    fn successors(self) -> &'static [Status] {
        use Status::*;
        match self {
            NotSet => &[InProgress, Discontinued],
            InProgress => &[Submitted, Discontinued],
            Submitted => &[InMarking, Discontinued],
            InMarking => &[Passed, Redoing, Discontinued],
            Redoing => &[Resubmitted, Discontinued],
            Resubmitted => &[InRemarking, Discontinued],
            InRemarking => &[Passed, NotPassed, Redoing, Discontinued],
            Passed | NotPassed | Discontinued => &[],
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl TryFrom<String> for Status {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.as_str().to_string()
    }
}

/// Whether an activity may move from `from` to `to`. Staying put is always
/// allowed so that edits which do not touch the status pass through.
pub fn can_transition(from: Status, to: Status) -> bool {
    from == to || from.successors().contains(&to)
}

#[derive(Debug, thiserror::Error)]
#[error("Illegal status transition from {from} to {to}")]
pub struct TransitionError {
    pub from: Status,
    pub to: Status,
}

pub fn check_transition(from: Status, to: Status) -> Result<(), TransitionError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// What a student asked for when saving answers. `DRAFT` only exists on the
/// wire; it is stored as `INPROGRESS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    Draft,
    Submit,
}

impl SaveKind {
    pub fn parse(requested: &str) -> Option<SaveKind> {
        match requested {
            "DRAFT" | "INPROGRESS" => Some(SaveKind::Draft),
            "SUBMITTED" | "RESUBMITTED" => Some(SaveKind::Submit),
            _ => None,
        }
    }
}

/// The activity status a save of kind `kind` leads to from `current`.
pub fn save_target(current: Status, kind: SaveKind) -> Status {
    match (kind, current) {
        (SaveKind::Draft, Status::Redoing) => Status::Redoing,
        (SaveKind::Draft, _) => Status::InProgress,
        (SaveKind::Submit, Status::Redoing | Status::Resubmitted) => Status::Resubmitted,
        (SaveKind::Submit, _) => Status::Submitted,
    }
}

/// Checks a save against the workflow and returns the status it moves the
/// activity to. A submission on an activity that was never started is taken
/// as a pass through `INPROGRESS`.
pub fn check_save(current: Status, kind: SaveKind) -> Result<Status, TransitionError> {
    let target = save_target(current, kind);
    let from = match (current, kind) {
        (Status::NotSet, SaveKind::Submit) => Status::InProgress,
        _ => current,
    };
    check_transition(from, target).map_err(|_| TransitionError {
        from: current,
        to: target,
    })?;
    Ok(target)
}

/// The status recorded on the answer rows written by a save.
pub fn answer_status(kind: SaveKind, target: Status) -> Status {
    match kind {
        SaveKind::Draft => Status::InProgress,
        SaveKind::Submit => target,
    }
}

/// Marking a freshly submitted activity implicitly starts the marking pass.
pub fn marking_state(current: Status) -> Status {
    match current {
        Status::Submitted => Status::InMarking,
        Status::Resubmitted => Status::InRemarking,
        other => other,
    }
}

/// The only statuses a marker may finish with.
pub fn parse_final_status(value: &str) -> Option<Status> {
    match value {
        "PASSED" => Some(Status::Passed),
        "REDOING" => Some(Status::Redoing),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Outcome {
    Achieved,
    NotAchieved,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Achieved => "ACHIEVED",
            Outcome::NotAchieved => "NOT ACHIEVED",
        }
    }

    /// Anything other than a case-insensitive `ACHIEVED` is a fail.
    pub fn from_mark(value: Option<&str>) -> Outcome {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("ACHIEVED") => Outcome::Achieved,
            _ => Outcome::NotAchieved,
        }
    }
}

impl TryFrom<String> for Outcome {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "ACHIEVED" => Ok(Outcome::Achieved),
            "NOT ACHIEVED" => Ok(Outcome::NotAchieved),
            _ => Err(UnknownStatus(value)),
        }
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("DRAFT".parse::<Status>().is_err());
        assert!("inprogress".parse::<Status>().is_err());
    }

    #[test]
    fn happy_path_is_legal() {
        let path = [
            Status::NotSet,
            Status::InProgress,
            Status::Submitted,
            Status::InMarking,
            Status::Redoing,
            Status::Resubmitted,
            Status::InRemarking,
            Status::Passed,
        ];
        for pair in path.windows(2) {
            assert!(can_transition(pair[0], pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(can_transition(Status::InRemarking, Status::NotPassed));
        assert!(can_transition(Status::InMarking, Status::Passed));
    }

    #[test]
    fn marking_before_submission_is_refused() {
        assert!(!can_transition(Status::InProgress, Status::InMarking));
        assert!(!can_transition(Status::InProgress, Status::Passed));
        assert!(!can_transition(Status::Submitted, Status::Passed));
        assert!(!can_transition(Status::NotSet, Status::Submitted));
    }

    #[test]
    fn terminal_states_only_stay_put() {
        for terminal in [Status::Passed, Status::NotPassed, Status::Discontinued] {
            assert!(terminal.is_terminal());
            for to in Status::ALL {
                assert_eq!(can_transition(terminal, to), terminal == to);
            }
        }
    }

    #[test]
    fn any_open_activity_can_be_discontinued() {
        for from in Status::ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(can_transition(from, Status::Discontinued));
        }
    }

    #[test]
    fn check_transition_names_both_ends() {
        let err = check_transition(Status::Passed, Status::InProgress).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Illegal status transition from PASSED to INPROGRESS"
        );
    }

    #[test]
    fn drafts_keep_redo_cycle() {
        assert_eq!(save_target(Status::NotSet, SaveKind::Draft), Status::InProgress);
        assert_eq!(save_target(Status::InProgress, SaveKind::Draft), Status::InProgress);
        assert_eq!(save_target(Status::Redoing, SaveKind::Draft), Status::Redoing);
        assert_eq!(
            answer_status(SaveKind::Draft, Status::Redoing),
            Status::InProgress
        );
    }

    #[test]
    fn submissions_after_redo_are_resubmissions() {
        assert_eq!(save_target(Status::InProgress, SaveKind::Submit), Status::Submitted);
        assert_eq!(save_target(Status::Redoing, SaveKind::Submit), Status::Resubmitted);
        assert_eq!(
            save_target(Status::Resubmitted, SaveKind::Submit),
            Status::Resubmitted
        );
        assert_eq!(SaveKind::parse("DRAFT"), Some(SaveKind::Draft));
        assert_eq!(SaveKind::parse("PASSED"), None);
    }

    #[test]
    fn submitting_an_unstarted_activity_passes_through_in_progress() {
        assert_eq!(
            check_save(Status::NotSet, SaveKind::Submit).unwrap(),
            Status::Submitted
        );
        assert!(!can_transition(Status::NotSet, Status::Submitted));

        let err = check_save(Status::Passed, SaveKind::Submit).unwrap_err();
        assert_eq!((err.from, err.to), (Status::Passed, Status::Submitted));
        assert!(check_save(Status::InMarking, SaveKind::Draft).is_err());
    }

    #[test]
    fn final_status_is_restricted() {
        assert_eq!(parse_final_status("PASSED"), Some(Status::Passed));
        assert_eq!(parse_final_status("REDOING"), Some(Status::Redoing));
        assert_eq!(parse_final_status("NOTPASSED"), None);
        assert_eq!(parse_final_status("passed"), None);
    }

    #[test]
    fn marking_a_submission_starts_the_marking_pass() {
        assert_eq!(marking_state(Status::Submitted), Status::InMarking);
        assert_eq!(marking_state(Status::Resubmitted), Status::InRemarking);
        assert_eq!(marking_state(Status::InProgress), Status::InProgress);
        assert!(can_transition(marking_state(Status::Submitted), Status::Passed));
        assert!(!can_transition(marking_state(Status::InProgress), Status::Passed));
    }

    #[test]
    fn outcome_defaults_to_not_achieved() {
        assert_eq!(Outcome::from_mark(Some("achieved")), Outcome::Achieved);
        assert_eq!(Outcome::from_mark(Some("maybe")), Outcome::NotAchieved);
        assert_eq!(Outcome::from_mark(None), Outcome::NotAchieved);
        assert_eq!(
            serde_json::to_string(&Outcome::NotAchieved).unwrap(),
            "\"NOT ACHIEVED\""
        );
    }
}
