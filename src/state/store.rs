use super::delta::StateDelta;
use super::model::{Reflection, ResearchState};
use crate::types::Phase;
use std::collections::HashSet;

/// A delta that would break a state invariant. Always fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateIntegrityError {
    #[error("citation references unknown source '{0}'")]
    UnknownCitationSource(String),

    #[error("duplicate source id '{0}'")]
    DuplicateSourceId(String),

    #[error("plan must contain at least one non-blank sub-question")]
    EmptyPlan,

    #[error("report must not be empty")]
    EmptyReport,

    #[error("report has already been written")]
    ReportAlreadyWritten,

    #[error("search batch out of sequence: expected {expected}, found {found}")]
    BatchOutOfSequence { expected: u32, found: u32 },

    #[error("coverage recorded for plan revision {found}, current revision is {expected}")]
    StaleCoverage { expected: u32, found: u32 },

    #[error("cannot mark batch {batch} checked, latest batch is {latest} and last check was {previous}")]
    InvalidCheck { batch: u32, latest: u32, previous: u32 },
}

/// Single owner of a run's [`ResearchState`].
///
/// Stages only ever see snapshots; their deltas are applied here all at once
/// or not at all.
#[derive(Debug, Clone)]
pub struct StateStore {
    state: ResearchState,
}

impl StateStore {
    pub fn new(state: ResearchState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ResearchState {
        &self.state
    }

    /// Owned copy handed to a stage.
    pub fn snapshot(&self) -> ResearchState {
        self.state.clone()
    }

    pub fn into_state(self) -> ResearchState {
        self.state
    }

    /// Validate and apply a delta. On error the state is left untouched.
    pub fn commit(&mut self, delta: StateDelta) -> Result<&ResearchState, StateIntegrityError> {
        self.validate(&delta)?;
        self.apply(delta);
        Ok(&self.state)
    }

    fn validate(&self, delta: &StateDelta) -> Result<(), StateIntegrityError> {
        let state = &self.state;

        if let Some(plan) = &delta.plan {
            if plan.is_empty() || plan.iter().any(|q| q.trim().is_empty()) {
                return Err(StateIntegrityError::EmptyPlan);
            }
        }

        if let Some(report) = &delta.report {
            if state.report.is_some() {
                return Err(StateIntegrityError::ReportAlreadyWritten);
            }
            if report.trim().is_empty() {
                return Err(StateIntegrityError::EmptyReport);
            }
        }

        let revision = if delta.plan.is_some() {
            state.plan_revision + 1
        } else {
            state.plan_revision
        };
        let next_batch = state.search_batch + 1;

        for coverage in &delta.coverage {
            if coverage.batch != next_batch {
                return Err(StateIntegrityError::BatchOutOfSequence {
                    expected: next_batch,
                    found: coverage.batch,
                });
            }
            if coverage.plan_revision != revision {
                return Err(StateIntegrityError::StaleCoverage {
                    expected: revision,
                    found: coverage.plan_revision,
                });
            }
        }

        let mut new_ids = HashSet::new();
        for result in &delta.search_results {
            if result.batch != next_batch {
                return Err(StateIntegrityError::BatchOutOfSequence {
                    expected: next_batch,
                    found: result.batch,
                });
            }
            if state.has_source(&result.source_id) || !new_ids.insert(result.source_id.as_str()) {
                return Err(StateIntegrityError::DuplicateSourceId(
                    result.source_id.clone(),
                ));
            }
        }

        for (source_id, _) in &delta.citations {
            if !state.has_source(source_id) && !new_ids.contains(source_id.as_str()) {
                return Err(StateIntegrityError::UnknownCitationSource(source_id.clone()));
            }
        }

        if let Some(batch) = delta.checked_batch {
            let latest = if delta.opens_batch() {
                next_batch
            } else {
                state.search_batch
            };
            if batch > latest || batch < state.checked_batch {
                return Err(StateIntegrityError::InvalidCheck {
                    batch,
                    latest,
                    previous: state.checked_batch,
                });
            }
        }

        Ok(())
    }

    fn apply(&mut self, delta: StateDelta) {
        let state = &mut self.state;
        let opens_batch = delta.opens_batch();

        state.messages.extend(delta.messages);

        if let Some(plan) = delta.plan {
            state.plan = plan;
            state.plan_revision += 1;
        }

        if opens_batch {
            state.search_batch += 1;
        }
        state.search_results.extend(delta.search_results);
        state.coverage.extend(delta.coverage);

        for (source_id, verdict) in delta.citations {
            state.citations.insert(source_id, verdict);
        }
        if let Some(batch) = delta.checked_batch {
            state.checked_batch = batch;
        }

        if let Some(verdict) = delta.reflection {
            let iteration_count = state.iteration_count();
            state.reflection = Some(Reflection {
                sufficient: verdict.sufficient,
                missing_aspects: verdict.missing_aspects,
                iteration_count,
                based_on_check: state.checked_batch,
            });
        }

        if let Some(report) = delta.report {
            state.report = Some(report);
        }

        state.warnings.extend(delta.warnings);
    }

    // ============= Executor control operations =============

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.state.phase = phase;
    }

    /// Advance the reflection counter on a Reflector -> Planner transition.
    pub(crate) fn begin_iteration(&mut self) -> u32 {
        match self.state.reflection.as_mut() {
            Some(reflection) => {
                reflection.iteration_count += 1;
                reflection.iteration_count
            }
            None => 0,
        }
    }

    pub(crate) fn mark_degraded(&mut self, reason: impl Into<String>) {
        if self.state.degraded.is_none() {
            self.state.degraded = Some(reason.into());
        }
    }
}
