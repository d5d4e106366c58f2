//! Simple REST API server example for the registration engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /events` - Create and publish an event
//! - `POST /registrations` - Submit a registration (free or paid)
//! - `POST /registrations/{ticket}/resolve` - Approve or reject a pending registration
//! - `POST /check-ins` - Check a ticket or scanned code in
//! - `GET /events/{id}/availability` - Availability snapshot
//! - `GET /events/{id}/registrations` - List registrations for an event
//!
//! ## Example Usage
//!
//! ```bash
//! # Create a free event with capacity 2
//! curl -X POST http://localhost:3000/events \
//!   -H "Content-Type: application/json" \
//!   -d '{"id": 1, "name": "Hack Night", "organizer": 7, "capacity": 2, "fee": "0"}'
//!
//! # Register
//! curl -X POST http://localhost:3000/registrations \
//!   -H "Content-Type: application/json" \
//!   -d '{"event": 1, "participant": 42, "answers": {"topic": "async"}}'
//!
//! # Check in with the returned code
//! curl -X POST http://localhost:3000/check-ins \
//!   -H "Content-Type: application/json" \
//!   -d '{"scan": "QR-TICK-0A1B2C3D", "organizer": 7}'
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Duration, Utc};
use eventdesk_rs::{
    Decision, Engine, Event, EventId, ItemRequest, OrganizerId, ParticipantId, RegistrationError,
    Schedule, Submission, SubmissionDetails, SubmitOutcome, TicketId, Variant, VariantKey,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request/Response DTOs ===

/// Request body for creating an event.
///
/// Normal events carry `capacity`; merchandise events carry `variants`.
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub id: u32,
    pub name: String,
    pub organizer: u32,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub variants: Option<Vec<VariantRequest>>,
    pub fee: Decimal,
    /// Minutes from now until the registration deadline.
    #[serde(default = "default_deadline_minutes")]
    pub deadline_minutes: i64,
}

fn default_deadline_minutes() -> i64 {
    60
}

#[derive(Debug, Deserialize)]
pub struct VariantRequest {
    pub item: String,
    pub size: String,
    pub price: Decimal,
    pub stock: u32,
    #[serde(default)]
    pub purchase_limit: Option<u32>,
}

/// Request body for submitting a registration.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub event: u32,
    pub participant: u32,
    /// Form answers for a normal event.
    #[serde(default)]
    pub answers: Option<BTreeMap<String, String>>,
    /// Ordered lines for a merchandise event.
    #[serde(default)]
    pub order: Option<Vec<OrderLine>>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub proof: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderLine {
    pub item: String,
    pub size: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub organizer: u32,
    /// "approve" or "reject"
    pub decision: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub scan: String,
    pub organizer: u32,
}

/// Response body for a submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub ticket: String,
    pub status: String,
    pub check_in_code: Option<String>,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the registration engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

// === Error Handling ===

/// Wrapper for converting `RegistrationError` into HTTP responses.
pub struct AppError(RegistrationError);

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            RegistrationError::EventNotFound => (StatusCode::NOT_FOUND, "EVENT_NOT_FOUND"),
            RegistrationError::RegistrationNotFound => {
                (StatusCode::NOT_FOUND, "REGISTRATION_NOT_FOUND")
            }
            RegistrationError::DeadlinePassed => (StatusCode::BAD_REQUEST, "DEADLINE_PASSED"),
            RegistrationError::AlreadyRegistered => (StatusCode::CONFLICT, "ALREADY_REGISTERED"),
            RegistrationError::EventFull => (StatusCode::UNPROCESSABLE_ENTITY, "EVENT_FULL"),
            RegistrationError::OutOfStock { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "OUT_OF_STOCK")
            }
            RegistrationError::PurchaseLimitExceeded { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "PURCHASE_LIMIT_EXCEEDED")
            }
            RegistrationError::ProofRequired => (StatusCode::BAD_REQUEST, "PROOF_REQUIRED"),
            RegistrationError::PayloadMismatch => (StatusCode::BAD_REQUEST, "PAYLOAD_MISMATCH"),
            RegistrationError::Unauthorized => (StatusCode::FORBIDDEN, "UNAUTHORIZED"),
            RegistrationError::InvalidState => (StatusCode::CONFLICT, "INVALID_STATE"),
            RegistrationError::InvalidTicket => (StatusCode::NOT_FOUND, "INVALID_TICKET"),
            RegistrationError::AlreadyCheckedIn { .. } => {
                (StatusCode::CONFLICT, "ALREADY_CHECKED_IN")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /events - Create and publish an event.
async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<StatusCode, AppError> {
    let now = Utc::now();
    let schedule = Schedule {
        deadline: now + Duration::minutes(request.deadline_minutes),
        starts_at: now + Duration::minutes(request.deadline_minutes),
        ends_at: now + Duration::minutes(request.deadline_minutes + 120),
    };
    let id = EventId(request.id);
    let organizer = OrganizerId(request.organizer);

    let event = match request.variants {
        Some(variants) if !variants.is_empty() => Event::merchandise(
            id,
            request.name,
            organizer,
            schedule,
            variants
                .into_iter()
                .map(|v| {
                    let mut variant = Variant::new(v.item, v.size, v.price, v.stock);
                    if let Some(limit) = v.purchase_limit {
                        variant = variant.with_purchase_limit(limit);
                    }
                    variant
                })
                .collect(),
            request.fee,
        ),
        _ => Event::normal(
            id,
            request.name,
            organizer,
            schedule,
            request.capacity,
            request.fee,
        ),
    };
    event.publish()?;
    state.engine.add_event(event)?;
    Ok(StatusCode::CREATED)
}

/// POST /registrations - Submit a registration.
async fn submit_registration(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let details = match (request.answers, request.order) {
        (_, Some(order)) => SubmissionDetails::Order(
            order
                .into_iter()
                .map(|line| ItemRequest::new(VariantKey::new(line.item, line.size), line.quantity))
                .collect(),
        ),
        (answers, None) => SubmissionDetails::Form(answers.unwrap_or_default()),
    };

    let outcome = state.engine.submit(Submission {
        event: EventId(request.event),
        participant: ParticipantId(request.participant),
        details,
        team_name: request.team,
        payment_proof: request.proof,
    })?;

    let response = match outcome {
        SubmitOutcome::Confirmed {
            ticket,
            check_in_code,
        } => SubmitResponse {
            ticket: ticket.to_string(),
            status: "Successful".to_string(),
            check_in_code: Some(check_in_code.to_string()),
        },
        SubmitOutcome::PendingApproval { ticket } => SubmitResponse {
            ticket: ticket.to_string(),
            status: "Pending".to_string(),
            check_in_code: None,
        },
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /registrations/{ticket}/resolve - Approve or reject a pending
/// registration.
async fn resolve_registration(
    State(state): State<AppState>,
    Path(ticket): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    let ticket = TicketId::parse(&ticket).ok_or(RegistrationError::RegistrationNotFound)?;
    let decision = match request.decision.as_str() {
        "approve" => Decision::Approve,
        "reject" => Decision::Reject,
        _ => return Err(AppError(RegistrationError::InvalidState)),
    };

    let status = state
        .engine
        .resolve(&ticket, OrganizerId(request.organizer), decision)?;
    let registration = state
        .engine
        .registration(&ticket)
        .ok_or(RegistrationError::RegistrationNotFound)?;

    Ok(Json(SubmitResponse {
        ticket: ticket.to_string(),
        status: status.to_string(),
        check_in_code: registration.check_in_code().map(|code| code.to_string()),
    }))
}

/// POST /check-ins - Record attendance for a scanned ticket.
async fn check_in(
    State(state): State<AppState>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let at = state
        .engine
        .check_in(&request.scan, OrganizerId(request.organizer))?;
    Ok(Json(serde_json::json!({ "checked_in_at": at })))
}

/// GET /events/{id}/availability - Availability snapshot.
async fn availability(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<eventdesk_rs::Availability>, AppError> {
    Ok(Json(state.engine.availability(EventId(id))?))
}

/// GET /events/{id}/registrations - List registrations for an event.
async fn list_registrations(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Json<Vec<serde_json::Value>> {
    let rows = state
        .engine
        .registrations_for_event(EventId(id))
        .iter()
        .filter_map(|registration| serde_json::to_value(registration.as_ref()).ok())
        .collect();
    Json(rows)
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/events", post(create_event))
        .route("/registrations", post(submit_registration))
        .route("/registrations/{ticket}/resolve", post(resolve_registration))
        .route("/check-ins", post(check_in))
        .route("/events/{id}/availability", get(availability))
        .route("/events/{id}/registrations", get(list_registrations))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    let state = AppState {
        engine: Arc::new(Engine::new()),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("EventDesk API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST /events                          - Create and publish an event");
    println!("  POST /registrations                   - Submit a registration");
    println!("  POST /registrations/:ticket/resolve   - Approve or reject");
    println!("  POST /check-ins                       - Check a ticket in");
    println!("  GET  /events/:id/availability         - Availability snapshot");
    println!("  GET  /events/:id/registrations        - List registrations");

    axum::serve(listener, app).await.unwrap();
}
