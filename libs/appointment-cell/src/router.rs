use std::sync::Arc;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::handlers;
use crate::state::SchedulingState;

pub fn scheduling_routes(state: Arc<SchedulingState>) -> Router {
    Router::new()
        // Appointment lifecycle
        .route("/appointments", post(handlers::book_appointment))
        .route("/appointments/per-day", get(handlers::get_appointments_per_day))
        .route("/appointments/{appointment_id}", put(handlers::reschedule_appointment))
        .route("/appointments/{appointment_id}/status", patch(handlers::set_appointment_status))
        .route("/patients/{patient_id}/appointments", get(handlers::get_patient_appointments))
        .route(
            "/patients/{patient_id}/appointments/{ordinal}",
            get(handlers::get_appointment_by_ordinal),
        )
        .route(
            "/patients/{patient_id}/appointments/{ordinal}/cancel",
            post(handlers::cancel_appointment),
        )
        .route("/providers/{provider_id}/appointments", get(handlers::get_provider_appointments))

        // Slot catalog
        .route("/providers/{provider_id}/slots/available", get(handlers::get_available_slots))
        .route("/providers/{provider_id}/slots/registered", get(handlers::get_registered_slots))
        .route("/slots", post(handlers::register_slot))
        .route("/slots/edit", post(handlers::edit_slot))
        .route("/slots/{slot_id}", patch(handlers::update_slot))

        .with_state(state)
}
