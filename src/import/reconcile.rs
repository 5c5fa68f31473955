//! Submits the staging store as one batch and reconciles it with the per-record results.
//!
//! The controller is the only owner of its staging store. A submission works on a snapshot of the
//! store taken before the request is sent; results are matched to the snapshot by correlation
//! token, and successes are pruned from the live store by token in a single pass. Records that
//! the user removed or added while the request was in flight are therefore never confused with
//! the ones that were sent.

use crate::api::{BatchResponse, FieldError, Outcome, Remote};
use crate::error::ImportError;
use crate::import::{Staged, StagingStore};
use crate::model::{Catalog, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The results of the most recent submission that produced results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pass {
    succeeded: usize,
    failed: usize,
    /// The errors of each failed record, by correlation token.
    failures: BTreeMap<Uuid, Vec<FieldError>>,
}

impl Pass {
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Every record of the pass was created.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// The persistable part of a `BulkImport`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session<R> {
    pub store: StagingStore<R>,
    #[serde(default)]
    pub last_pass: Option<Pass>,
}

impl<R> Default for Session<R> {
    fn default() -> Self {
        Self {
            store: StagingStore::default(),
            last_pass: None,
        }
    }
}

#[derive(Debug)]
struct State<R> {
    session: Session<R>,
    in_flight: bool,
}

/// One validation error of a record still in the staging store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// The record's current position in the store.
    pub index: usize,
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
}

/// The message shown after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Banner {
    Success(usize),
    Failures(usize),
}

impl Display for Banner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Banner::Success(n) => write!(f, "{n} registros enviados exitosamente"),
            Banner::Failures(n) => write!(f, "{n} registro(s) fallaron. Revise los errores."),
        }
    }
}

/// Aggregate status of the staging store with respect to the last submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchStatus {
    pub succeeded: usize,
    pub failed: usize,
    /// Staged records that have no result from the last pass.
    pub pending: usize,
    pub errors: Vec<RowError>,
    /// The last pass created every record it sent.
    pub complete: bool,
    pub submitting: bool,
}

impl BatchStatus {
    pub fn banner(&self) -> Option<Banner> {
        if self.failed > 0 {
            Some(Banner::Failures(self.failed))
        } else if self.succeeded > 0 {
            Some(Banner::Success(self.succeeded))
        } else {
            None
        }
    }
}

/// What a successful call to `submit_batch` did.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReport<R: Record> {
    pub succeeded: usize,
    pub failed: usize,
    /// Each created record with the entity the server returned for it, in submission order.
    pub created: Vec<(R, R::Entity)>,
}

impl<R: Record> SubmitReport<R> {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    pub fn banner(&self) -> Banner {
        if self.failed > 0 {
            Banner::Failures(self.failed)
        } else {
            Banner::Success(self.succeeded)
        }
    }

    /// Inserts every created entity into `catalog`. Returns how many were inserted.
    pub fn merge_into(&self, catalog: &mut Catalog) -> usize {
        self.created
            .iter()
            .filter(|(record, entity)| record.merge_into(entity, catalog))
            .count()
    }
}

/// The bulk-import workflow for records of kind `R`: an explicitly owned staging store plus the
/// results of the last submission.
#[derive(Debug)]
pub struct BulkImport<R> {
    state: Mutex<State<R>>,
}

impl<R: Record> Default for BulkImport<R> {
    fn default() -> Self {
        Self::new(Session::default())
    }
}

impl<R: Record> BulkImport<R> {
    pub fn new(session: Session<R>) -> Self {
        Self {
            state: Mutex::new(State {
                session,
                in_flight: false,
            }),
        }
    }

    /// A copy of the store and last pass, for persisting between runs.
    pub fn session(&self) -> Session<R> {
        self.lock().session.clone()
    }

    /// Replaces the store with a new upload. Results of the previous pass are discarded.
    pub fn replace_all(&self, records: Vec<R>) {
        let mut state = self.lock();
        state.session.store.replace_all(records);
        state.session.last_pass = None;
    }

    pub fn append(&self, record: R) {
        self.lock().session.store.append(record);
    }

    /// Removes the record at `index`. An index past the end does nothing.
    pub fn remove_at(&self, index: usize) -> Option<R> {
        self.lock().session.store.remove_at(index)
    }

    /// Empties the store and forgets the last pass.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.session.store.clear();
        state.session.last_pass = None;
    }

    pub fn len(&self) -> usize {
        self.lock().session.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().session.store.is_empty()
    }

    pub fn records(&self) -> Vec<R> {
        self.lock().session.store.records().cloned().collect()
    }

    pub fn is_submitting(&self) -> bool {
        self.lock().in_flight
    }

    pub fn status(&self) -> BatchStatus {
        let state = self.lock();
        let store = &state.session.store;
        let empty = Pass::default();
        let pass = state.session.last_pass.as_ref().unwrap_or(&empty);

        let mut errors = Vec::new();
        let mut failed_in_store = 0;
        for (index, item) in store.items().iter().enumerate() {
            let Some(field_errors) = pass.failures.get(&item.token()) else {
                continue;
            };
            failed_in_store += 1;
            for e in field_errors {
                errors.push(RowError {
                    index,
                    field: e.field.clone(),
                    message: e.message.clone(),
                    product_id: e.product_id.or_else(|| item.record().product_id()),
                });
            }
        }

        // shown = store + succeeded, pending = shown - succeeded - failed
        BatchStatus {
            succeeded: pass.succeeded,
            failed: pass.failed,
            pending: store.len().saturating_sub(failed_in_store),
            errors,
            complete: state.session.last_pass.as_ref().is_some_and(Pass::is_complete),
            submitting: state.in_flight,
        }
    }

    /// Submits every staged record in one request and reconciles the store with the results.
    ///
    /// # Errors
    /// - `NothingToSubmit` when the store is empty and `AlreadySubmitting` when another
    ///   submission is in flight. No request is made in either case.
    /// - `ConnectionFailed` when no result list was obtained and `MisalignedResults` when the
    ///   results cannot be attributed to the submitted records. The store is left untouched.
    pub async fn submit_batch(
        &self,
        remote: &dyn Remote<R>,
    ) -> Result<SubmitReport<R>, ImportError> {
        let snapshot = {
            let mut state = self.lock();
            if state.session.store.is_empty() {
                return Err(ImportError::NothingToSubmit);
            }
            if state.in_flight {
                return Err(ImportError::AlreadySubmitting);
            }
            state.in_flight = true;
            state.session.last_pass = None;
            state.session.store.items().to_vec()
        };
        let _in_flight = InFlight { import: self };

        debug!("Submitting {} {}", snapshot.len(), R::KIND.collection());
        let response = remote.create_batch(&snapshot).await.map_err(|e| {
            warn!("Submission of {} failed: {e:#}", R::KIND.collection());
            ImportError::ConnectionFailed(e)
        })?;
        let outcomes = align(&snapshot, response)?;

        let mut succeeded = HashSet::new();
        let mut failures = BTreeMap::new();
        let mut created = Vec::new();
        for (staged, outcome) in snapshot.into_iter().zip(outcomes) {
            match outcome {
                Outcome::Success(entity) => {
                    succeeded.insert(staged.token());
                    created.push((staged.into_record(), entity));
                }
                Outcome::Failure(errors) => {
                    failures.insert(staged.token(), errors);
                }
            }
        }

        let pass = Pass {
            succeeded: succeeded.len(),
            failed: failures.len(),
            failures,
        };
        let mut state = self.lock();
        state
            .session
            .store
            .retain(|item| !succeeded.contains(&item.token()));
        info!(
            "{} {} created, {} failed, {} remain staged",
            pass.succeeded,
            R::KIND.collection(),
            pass.failed,
            state.session.store.len()
        );
        let report = SubmitReport {
            succeeded: pass.succeeded,
            failed: pass.failed,
            created,
        };
        state.session.last_pass = Some(pass);
        Ok(report)
    }

    fn lock(&self) -> MutexGuard<'_, State<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight flag when the submission ends, however it ends.
struct InFlight<'a, R: Record> {
    import: &'a BulkImport<R>,
}

impl<R: Record> Drop for InFlight<'_, R> {
    fn drop(&mut self) {
        self.import.lock().in_flight = false;
    }
}

/// Puts the results in the order of `snapshot`. Results are matched by `clientRef` when every
/// result carries a distinct one from the snapshot, and by position otherwise.
fn align<R: Record>(
    snapshot: &[Staged<R>],
    response: BatchResponse<R::Entity>,
) -> Result<Vec<Outcome<R::Entity>>, ImportError> {
    let expected = snapshot.len();
    let actual = response.results.len();
    check_counts(&response);

    let tokens: HashSet<Uuid> = snapshot.iter().map(Staged::token).collect();
    let echoed: HashSet<Uuid> = response
        .results
        .iter()
        .filter_map(|r| r.client_ref)
        .collect();
    let by_token = echoed.len() == actual
        && actual == expected
        && echoed.iter().all(|t| tokens.contains(t));

    if by_token {
        let mut by_ref: HashMap<Uuid, Outcome<R::Entity>> = response
            .results
            .into_iter()
            .filter_map(|r| r.client_ref.map(|t| (t, r.into_outcome())))
            .collect();
        return snapshot
            .iter()
            .map(|s| {
                by_ref
                    .remove(&s.token())
                    .ok_or(ImportError::MisalignedResults { expected, actual })
            })
            .collect();
    }

    if actual != expected {
        warn!("Sent {expected} records but received {actual} results");
        return Err(ImportError::MisalignedResults { expected, actual });
    }
    debug!("Results carry no usable clientRef, matching by position");
    Ok(response
        .results
        .into_iter()
        .map(|r| r.into_outcome())
        .collect())
}

/// Logs any disagreement between the summary counts and the result list. The counts are always
/// recomputed from the list.
fn check_counts<E>(response: &BatchResponse<E>) {
    let total = response.results.len();
    let successes = response
        .results
        .iter()
        .filter(|r| r.entity.is_some() && r.errors.as_ref().map_or(true, Vec::is_empty))
        .count();
    let reported = [
        ("total", response.total, total),
        ("successCount", response.success_count, successes),
        ("errorCount", response.error_count, total - successes),
    ];
    for (name, reported, counted) in reported {
        if let Some(reported) = reported.filter(|r| *r != counted) {
            warn!("The server reported {name} = {reported} but the results show {counted}");
        }
    }
}
