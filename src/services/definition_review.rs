use time::PrimitiveDateTime;

use crate::core::metrics::{DEFINITION_TRANSITIONS_TOTAL, STORE_CONFLICTS_TOTAL};
use crate::core::time::primitive_now_utc;
use crate::db::models::AssessmentDefinition;
use crate::db::types::{ApprovalStatus, Modality};
use crate::repositories::store::AssessmentStore;
use crate::services::approval::{self, DefinitionInput};
use crate::services::caller::{CallerContext, CallerRole};
use crate::services::service_error::{ServiceError, MAX_WRITE_ATTEMPTS};
use crate::services::workflow_error::WorkflowError;

const ENTITY: &str = "definition";

fn record(action: &'static str, result: &Result<AssessmentDefinition, ServiceError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(err) => err.outcome_label(),
    };
    metrics::counter!(DEFINITION_TRANSITIONS_TOTAL, "action" => action, "outcome" => outcome)
        .increment(1);
}

async fn load(
    store: &dyn AssessmentStore,
    id: &str,
) -> Result<AssessmentDefinition, ServiceError> {
    store.find_definition(id).await?.ok_or(ServiceError::NotFound { entity: ENTITY })
}

async fn write_with_retry<F>(
    store: &dyn AssessmentStore,
    id: &str,
    apply: &F,
) -> Result<AssessmentDefinition, ServiceError>
where
    F: Fn(&AssessmentDefinition, PrimitiveDateTime) -> Result<AssessmentDefinition, WorkflowError>,
{
    for _ in 0..MAX_WRITE_ATTEMPTS {
        let current = load(store, id).await?;
        let next = apply(&current, primitive_now_utc())?;
        if let Some(stored) = store.update_definition(&next).await? {
            return Ok(stored);
        }
        metrics::counter!(STORE_CONFLICTS_TOTAL, "entity" => ENTITY).increment(1);
    }
    Err(ServiceError::Stale { entity: ENTITY, id: id.to_string() })
}

fn log_outcome(
    caller: &CallerContext,
    id: &str,
    action: &'static str,
    result: &Result<AssessmentDefinition, ServiceError>,
) {
    record(action, result);
    match result {
        Ok(stored) => tracing::info!(
            definition_id = %stored.id,
            action,
            actor = caller.user_ref(),
            status = %stored.status,
            version = stored.version,
            "Definition transition applied"
        ),
        Err(err) => tracing::info!(
            definition_id = id,
            action,
            actor = caller.user_ref(),
            error = %err,
            "Definition transition refused"
        ),
    }
}

/// Runs a single-record transition with reload-on-conflict.
async fn transition<F>(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
    action: &'static str,
    apply: F,
) -> Result<AssessmentDefinition, ServiceError>
where
    F: Fn(&AssessmentDefinition, PrimitiveDateTime) -> Result<AssessmentDefinition, WorkflowError>,
{
    let result = write_with_retry(store, id, &apply).await;
    log_outcome(caller, id, action, &result);
    result
}

async fn insert_new(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    input: DefinitionInput,
) -> Result<AssessmentDefinition, ServiceError> {
    let definition = approval::create_definition(caller, input, primitive_now_utc())?;
    Ok(store.insert_definition(&definition).await?)
}

pub(crate) async fn create(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    input: DefinitionInput,
) -> Result<AssessmentDefinition, ServiceError> {
    let result = insert_new(store, caller, input).await;
    let id = result.as_ref().map(|definition| definition.id.clone()).unwrap_or_default();
    log_outcome(caller, &id, "create", &result);
    result
}

/// Students see approved definitions only; other roles see everything.
pub(crate) async fn get(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
) -> Result<AssessmentDefinition, ServiceError> {
    let definition = load(store, id).await?;
    if caller.role() == CallerRole::Student && definition.status != ApprovalStatus::Approved {
        return Err(ServiceError::NotFound { entity: ENTITY });
    }
    Ok(definition)
}

pub(crate) async fn edit(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
    input: DefinitionInput,
) -> Result<AssessmentDefinition, ServiceError> {
    transition(store, caller, id, "edit", |current, now| {
        approval::edit_definition(caller, current, input.clone(), now)
    })
    .await
}

pub(crate) async fn submit_for_review(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
) -> Result<AssessmentDefinition, ServiceError> {
    transition(store, caller, id, "submit_for_review", |current, now| {
        approval::submit_for_review(caller, current, now)
    })
    .await
}

pub(crate) async fn reject(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
    notes: &str,
) -> Result<AssessmentDefinition, ServiceError> {
    transition(store, caller, id, "reject", |current, now| {
        approval::reject(caller, current, notes, now)
    })
    .await
}

async fn commit_with_retry(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
    notes: Option<String>,
) -> Result<AssessmentDefinition, ServiceError> {
    for _ in 0..MAX_WRITE_ATTEMPTS {
        let current = load(store, id).await?;
        let holder = store
            .find_approved_definition(&current.lesson_ref, current.modality)
            .await?
            .filter(|holder| holder.id != current.id);
        let outcome =
            approval::approve(caller, &current, notes.clone(), holder.as_ref(), primitive_now_utc())?;

        if let Some(committed) = store.commit_approval(&outcome).await? {
            if let Some(archived) = &committed.archived {
                tracing::info!(
                    definition_id = %archived.id,
                    replaced_by = %committed.approved.id,
                    "Previously approved definition archived"
                );
            }
            return Ok(committed.approved);
        }
        metrics::counter!(STORE_CONFLICTS_TOTAL, "entity" => ENTITY).increment(1);
    }
    Err(ServiceError::Stale { entity: ENTITY, id: id.to_string() })
}

/// Approves and demotes the slot's previous holder in one store commit.
pub(crate) async fn approve(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
    notes: Option<String>,
) -> Result<AssessmentDefinition, ServiceError> {
    let result = commit_with_retry(store, caller, id, notes).await;
    log_outcome(caller, id, "approve", &result);
    result
}

/// The selectable definitions for a lesson, one per modality at most.
pub(crate) async fn approved_for_lesson(
    store: &dyn AssessmentStore,
    lesson_ref: &str,
    modality: Option<Modality>,
) -> Result<Vec<AssessmentDefinition>, ServiceError> {
    let definitions = match modality {
        Some(modality) => store
            .find_approved_definition(lesson_ref, modality)
            .await?
            .into_iter()
            .collect(),
        None => store.list_approved_for_lesson(lesson_ref).await?,
    };

    if definitions.is_empty() {
        return Err(WorkflowError::NotApproved.into());
    }
    Ok(definitions)
}
