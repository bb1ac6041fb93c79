use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_models::{error::AppError, AppointmentId, Ordinal, PatientId, ProviderId, SlotId};
use shared_utils::{format_slot_time, normalize_date, parse_slot_time};

use crate::error::SchedulingError;
use crate::models::{
    BookAppointmentRequest, EditSlotRequest, RegisterSlotRequest, RescheduleAppointmentRequest,
    SetStatusRequest, SlotKey, SlotPatch, SlotQuery, UpdateSlotRequest,
};
use crate::state::SchedulingState;

// ==============================================================================
// REQUEST HELPERS
// ==============================================================================

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
}

fn path_params<T>(params: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    params
        .map(|Path(value)| value)
        .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
}

fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    normalize_date(value).map_err(|e| SchedulingError::from(e).into())
}

fn parse_time(value: &str) -> Result<NaiveTime, AppError> {
    parse_slot_time(value).map_err(|e| SchedulingError::from(e).into())
}

fn times_json(times: Vec<NaiveTime>) -> Json<Value> {
    let times: Vec<String> = times.into_iter().map(format_slot_time).collect();
    Json(json!({ "times": times }))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

/// Book an appointment; responds with the patient's ordinal
pub async fn book_appointment(
    State(state): State<Arc<SchedulingState>>,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = json_body(payload)?;
    info!("Booking request for patient {} with provider {}", request.patient_id, request.provider_id);

    let appointment = state
        .coordinator
        .book(
            request.patient_id,
            request.provider_id,
            request.specialty_id,
            &request.date,
            &request.time,
        )
        .await?;

    Ok(Json(json!({
        "message": "Appointment booked",
        "ordinal": appointment.ordinal
    })))
}

pub async fn reschedule_appointment(
    State(state): State<Arc<SchedulingState>>,
    path: Result<Path<AppointmentId>, PathRejection>,
    payload: Result<Json<RescheduleAppointmentRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = path_params(path)?;
    let request = json_body(payload)?;

    state
        .coordinator
        .reschedule(
            appointment_id,
            request.patient_id,
            request.provider_id,
            &request.date,
            &request.time,
            request.status,
        )
        .await?;

    Ok(Json(json!({ "message": "Appointment updated" })))
}

pub async fn cancel_appointment(
    State(state): State<Arc<SchedulingState>>,
    path: Result<Path<(PatientId, Ordinal)>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let (patient_id, ordinal) = path_params(path)?;
    state.coordinator.cancel(patient_id, ordinal).await?;
    Ok(Json(json!({ "message": "Appointment cancelled" })))
}

/// Administrative status override; slots are left alone
pub async fn set_appointment_status(
    State(state): State<Arc<SchedulingState>>,
    path: Result<Path<AppointmentId>, PathRejection>,
    payload: Result<Json<SetStatusRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = path_params(path)?;
    let request = json_body(payload)?;
    state
        .coordinator
        .set_appointment_status(appointment_id, request.status)
        .await?;

    Ok(Json(json!({ "message": format!("Appointment status set to {}", request.status) })))
}

pub async fn get_appointment_by_ordinal(
    State(state): State<Arc<SchedulingState>>,
    path: Result<Path<(PatientId, Ordinal)>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let (patient_id, ordinal) = path_params(path)?;
    let appointment = state.ledger.get_by_ordinal(patient_id, ordinal).await?;
    Ok(Json(json!({ "appointment": appointment })))
}

pub async fn get_patient_appointments(
    State(state): State<Arc<SchedulingState>>,
    path: Result<Path<PatientId>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let patient_id = path_params(path)?;
    let appointments = state.ledger.list_for_patient(patient_id).await?;
    debug!("Patient {} has {} appointments", patient_id, appointments.len());
    Ok(Json(json!({ "appointments": appointments })))
}

pub async fn get_provider_appointments(
    State(state): State<Arc<SchedulingState>>,
    path: Result<Path<ProviderId>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let provider_id = path_params(path)?;
    let appointments = state.ledger.list_for_provider(provider_id).await?;
    Ok(Json(json!({ "appointments": appointments })))
}

pub async fn get_appointments_per_day(
    State(state): State<Arc<SchedulingState>>,
) -> Result<Json<Value>, AppError> {
    let counts = state.ledger.count_by_date().await?;
    Ok(Json(json!(counts)))
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

pub async fn get_available_slots(
    State(state): State<Arc<SchedulingState>>,
    path: Result<Path<ProviderId>, PathRejection>,
    query: Result<Query<SlotQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let provider_id = path_params(path)?;
    let query = query_params(query)?;
    let date = parse_date(&query.date)?;
    let times = state
        .catalog
        .list_available(provider_id, query.specialty_id, date)
        .await?;
    Ok(times_json(times))
}

pub async fn get_registered_slots(
    State(state): State<Arc<SchedulingState>>,
    path: Result<Path<ProviderId>, PathRejection>,
    query: Result<Query<SlotQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let provider_id = path_params(path)?;
    let query = query_params(query)?;
    let date = parse_date(&query.date)?;
    let times = state
        .catalog
        .list_registered(provider_id, query.specialty_id, date)
        .await?;
    Ok(times_json(times))
}

pub async fn register_slot(
    State(state): State<Arc<SchedulingState>>,
    payload: Result<Json<RegisterSlotRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = json_body(payload)?;
    let date = parse_date(&request.date)?;
    let time = parse_time(&request.time)?;

    let slot = state
        .catalog
        .register_slot(request.provider_id, request.specialty_id, date, time, request.state)
        .await?;
    Ok(Json(json!({ "slot": slot })))
}

pub async fn update_slot(
    State(state): State<Arc<SchedulingState>>,
    path: Result<Path<SlotId>, PathRejection>,
    payload: Result<Json<UpdateSlotRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let slot_id = path_params(path)?;
    let request = json_body(payload)?;

    let patch = SlotPatch {
        provider_id: request.provider_id,
        specialty_id: request.specialty_id,
        date: request.date.as_deref().map(parse_date).transpose()?,
        time: request.time.as_deref().map(parse_time).transpose()?,
        occupied: request.occupied,
    };

    let slot = state.catalog.update_slot(slot_id, patch).await?;
    Ok(Json(json!({ "slot": slot })))
}

pub async fn edit_slot(
    State(state): State<Arc<SchedulingState>>,
    payload: Result<Json<EditSlotRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = json_body(payload)?;
    let key = SlotKey::new(request.provider_id, parse_date(&request.date)?, parse_time(&request.time)?);

    let affected = state.catalog.edit_by_key(key, request.action).await?;
    Ok(Json(json!({
        "message": "Slot updated",
        "affected": affected
    })))
}
