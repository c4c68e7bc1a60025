//! Route handlers, DTO conversion, and the router.

use crate::error::{ApiError, ApiResult};
use crate::extract::{AuthActor, ClientMeta};
use crate::AppState;
use api_shared::{
    AccessLogEntryRes, AccessLogRes, ActiveGrantsRes, ActorRes, AuthRes, CreateRecordReq,
    DashboardStatsRes, EmergencyAccessReq, EmergencyAccessRes, EmergencyContactDto,
    EmergencyPatientRes, EmergencyRecordRes, EmergencyTokenReq, EmergencyTokenRes, ErrorBody,
    FileRefDto, GrantReq, GrantRes, HealthRes, LoginReq, RecordListRes, RecordRes, RegisterReq,
    VisibilityReq,
};
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Duration;
use mera_core::{
    Actor, CoreError, EmergencyAccessBundle, EmergencyContact, MedicalRecord, NewActor, NewRecord,
    Role, RoleProfile,
};
use mera_types::{EmailAddress, NonEmptyText};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        register,
        login,
        emergency_access,
        issue_emergency_token,
        dashboard_stats,
        access_log,
        create_record,
        list_records,
        read_record,
        set_record_visibility,
        create_grant,
        revoke_grant,
        list_record_grants,
    ),
    components(schemas(
        ErrorBody,
        HealthRes,
        RegisterReq,
        LoginReq,
        AuthRes,
        ActorRes,
        EmergencyContactDto,
        CreateRecordReq,
        FileRefDto,
        RecordRes,
        RecordListRes,
        VisibilityReq,
        GrantReq,
        GrantRes,
        ActiveGrantsRes,
        EmergencyTokenReq,
        EmergencyTokenRes,
        EmergencyAccessReq,
        EmergencyAccessRes,
        EmergencyPatientRes,
        EmergencyRecordRes,
        DashboardStatsRes,
        AccessLogEntryRes,
        AccessLogRes,
    ))
)]
struct ApiDoc;

/// Builds the full application router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/emergency/access", post(emergency_access))
        .route("/emergency/token", post(issue_emergency_token))
        .route("/patient/dashboard-stats", get(dashboard_stats))
        .route("/patient/access-log", get(access_log))
        .route("/records", post(create_record).get(list_records))
        .route("/records/:id", get(read_record))
        .route("/records/:id/visibility", put(set_record_visibility))
        .route("/records/:id/grants", post(create_grant).get(list_record_grants))
        .route("/records/:id/grants/:doctor_id", delete(revoke_grant))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Health check response", body = HealthRes))
)]
/// Health check endpoint, used by monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "MERA REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Account created", body = AuthRes),
        (status = 400, description = "Invalid registration payload", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
/// Registers a new account and returns its first session token.
///
/// Password hashing is CPU-bound, so the whole registration runs on a
/// blocking worker rather than stalling the request pool.
#[axum::debug_handler]
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterReq>,
) -> ApiResult<(StatusCode, Json<AuthRes>)> {
    let new_actor = new_actor_from(req)?;

    let identity = state.identity().clone();
    let session = tokio::task::spawn_blocking(move || identity.register(new_actor))
        .await
        .map_err(|_| ApiError::internal())??;

    Ok((
        StatusCode::CREATED,
        Json(AuthRes {
            message: "User created successfully".into(),
            token: session.token,
            actor: actor_res(&session.actor),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Login successful", body = AuthRes),
        (status = 401, description = "Bad credentials or deactivated account", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
/// Authenticates an email/password pair.
///
/// Runs on a blocking worker (bcrypt verification). Unknown email and
/// wrong password are indistinguishable in the response.
#[axum::debug_handler]
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> ApiResult<Json<AuthRes>> {
    let email = EmailAddress::new(&req.email).map_err(|_| CoreError::InvalidCredentials)?;

    let identity = state.identity().clone();
    let session = tokio::task::spawn_blocking(move || identity.login(&email, &req.password))
        .await
        .map_err(|_| ApiError::internal())??;

    Ok(Json(AuthRes {
        message: "Login successful".into(),
        token: session.token,
        actor: actor_res(&session.actor),
    }))
}

#[utoipa::path(
    post,
    path = "/emergency/access",
    request_body = EmergencyAccessReq,
    responses(
        (status = 200, description = "Emergency access granted", body = EmergencyAccessRes),
        (status = 401, description = "Invalid, expired, or wrong-purpose token", body = ErrorBody),
        (status = 404, description = "Patient not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
/// Redeems a scanned QR token anonymously.
///
/// Every successful redemption appends an anonymous audit entry before any
/// data is returned.
#[axum::debug_handler]
async fn emergency_access(
    State(state): State<AppState>,
    ClientMeta(ctx): ClientMeta,
    Json(req): Json<EmergencyAccessReq>,
) -> ApiResult<Json<EmergencyAccessRes>> {
    let bundle = state.emergency().redeem(&req.qr_token, &ctx)?;
    Ok(Json(emergency_access_res(bundle)))
}

#[utoipa::path(
    post,
    path = "/emergency/token",
    request_body = EmergencyTokenReq,
    responses(
        (status = 200, description = "Emergency token issued", body = EmergencyTokenRes),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Only patients can issue emergency tokens", body = ErrorBody)
    )
)]
/// Issues an emergency QR token for the authenticated patient.
#[axum::debug_handler]
async fn issue_emergency_token(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(req): Json<EmergencyTokenReq>,
) -> ApiResult<Json<EmergencyTokenRes>> {
    let ttl = match req.ttl_minutes {
        Some(minutes) if minutes <= 0 => {
            return Err(CoreError::InvalidInput("ttl_minutes must be positive".into()).into());
        }
        Some(minutes) => Some(Duration::minutes(minutes)),
        None => None,
    };

    let qr_token = state.emergency().issue(&actor, ttl)?;
    Ok(Json(EmergencyTokenRes { qr_token }))
}

#[utoipa::path(
    get,
    path = "/patient/dashboard-stats",
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStatsRes),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not a patient", body = ErrorBody)
    )
)]
/// Dashboard tiles for the authenticated patient.
#[axum::debug_handler]
async fn dashboard_stats(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> ApiResult<Json<DashboardStatsRes>> {
    let stats = state.dashboard().stats(&actor)?;
    Ok(Json(DashboardStatsRes {
        total_records: stats.total_records,
        shared_doctors: stats.shared_doctors,
        recent_activity: stats.recent_activity,
        storage_used: stats.storage_used,
    }))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
struct AccessLogQuery {
    /// Maximum entries to return; defaults to 50.
    limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/patient/access-log",
    params(AccessLogQuery),
    responses(
        (status = 200, description = "Access log, newest first", body = AccessLogRes),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not a patient", body = ErrorBody)
    )
)]
/// The authenticated patient's own disclosure trail.
#[axum::debug_handler]
async fn access_log(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(query): Query<AccessLogQuery>,
) -> ApiResult<Json<AccessLogRes>> {
    if actor.role() != Role::Patient {
        return Err(CoreError::InsufficientPermissions.into());
    }

    let entries = state
        .audit()
        .list_for_patient(actor.id, query.limit.unwrap_or(50))?
        .into_iter()
        .map(|entry| AccessLogEntryRes {
            id: entry.id,
            accessor_id: entry.accessor_id,
            record_id: entry.record_id,
            access_type: entry.access_type.as_str().into(),
            reason: entry.reason,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            timestamp: entry.timestamp,
        })
        .collect();

    Ok(Json(AccessLogRes { entries }))
}

#[utoipa::path(
    post,
    path = "/records",
    request_body = CreateRecordReq,
    responses(
        (status = 201, description = "Record created", body = RecordRes),
        (status = 400, description = "Invalid record payload", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Only patients can create records", body = ErrorBody)
    )
)]
/// Creates a record owned by the authenticated patient.
#[axum::debug_handler]
async fn create_record(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(req): Json<CreateRecordReq>,
) -> ApiResult<(StatusCode, Json<RecordRes>)> {
    let new_record = new_record_from(req)?;
    let record = state.records().create(&actor, new_record)?;
    Ok((StatusCode::CREATED, Json(record_res(record))))
}

#[utoipa::path(
    get,
    path = "/records",
    responses(
        (status = 200, description = "The caller's records, newest first", body = RecordListRes),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Only patients own records", body = ErrorBody)
    )
)]
/// Lists the authenticated patient's own records.
#[axum::debug_handler]
async fn list_records(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> ApiResult<Json<RecordListRes>> {
    let records = state
        .records()
        .list_for_owner(&actor)?
        .into_iter()
        .map(record_res)
        .collect();
    Ok(Json(RecordListRes { records }))
}

#[utoipa::path(
    get,
    path = "/records/{id}",
    params(("id" = Uuid, Path, description = "Record id")),
    responses(
        (status = 200, description = "The record", body = RecordRes),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Access denied", body = ErrorBody),
        (status = 404, description = "No such record", body = ErrorBody)
    )
)]
/// Reads one record through the access-decision engine.
///
/// A non-owner read is audited before the response is built; audit failure
/// fails the read.
#[axum::debug_handler]
async fn read_record(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    ClientMeta(ctx): ClientMeta,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<Json<RecordRes>> {
    let record = state.engine().read_record(&actor, id, &ctx)?;
    Ok(Json(record_res(record)))
}

#[utoipa::path(
    put,
    path = "/records/{id}/visibility",
    params(("id" = Uuid, Path, description = "Record id")),
    request_body = VisibilityReq,
    responses(
        (status = 200, description = "Updated record", body = RecordRes),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not the record owner", body = ErrorBody),
        (status = 404, description = "No such record", body = ErrorBody)
    )
)]
/// Toggles whether a record is disclosed through the emergency path.
#[axum::debug_handler]
async fn set_record_visibility(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<VisibilityReq>,
) -> ApiResult<Json<RecordRes>> {
    let record = state
        .records()
        .set_emergency_visibility(&actor, id, req.is_emergency_visible)?;
    Ok(Json(record_res(record)))
}

#[utoipa::path(
    post,
    path = "/records/{id}/grants",
    params(("id" = Uuid, Path, description = "Record id")),
    request_body = GrantReq,
    responses(
        (status = 201, description = "Grant created or refreshed", body = GrantRes),
        (status = 400, description = "Grantee is not an active doctor, or expiry in the past", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not the record owner", body = ErrorBody),
        (status = 404, description = "No such record or doctor", body = ErrorBody)
    )
)]
/// Grants a doctor time-boxed access to one record.
#[axum::debug_handler]
async fn create_grant(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<GrantReq>,
) -> ApiResult<(StatusCode, Json<GrantRes>)> {
    let grant = state
        .grants()
        .grant(&actor, id, req.doctor_id, req.expires_at)?;
    Ok((
        StatusCode::CREATED,
        Json(GrantRes {
            doctor_id: grant.doctor_id,
            granted: grant.granted,
            granted_at: grant.granted_at,
            expires_at: grant.expires_at,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/records/{id}/grants/{doctor_id}",
    params(
        ("id" = Uuid, Path, description = "Record id"),
        ("doctor_id" = Uuid, Path, description = "Doctor to revoke")
    ),
    responses(
        (status = 204, description = "Grant revoked (idempotent)"),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not the record owner", body = ErrorBody),
        (status = 404, description = "No such record", body = ErrorBody)
    )
)]
/// Revokes a doctor's access. Idempotent: revoking twice succeeds.
#[axum::debug_handler]
async fn revoke_grant(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    AxumPath((id, doctor_id)): AxumPath<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state.grants().revoke(&actor, id, doctor_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/records/{id}/grants",
    params(("id" = Uuid, Path, description = "Record id")),
    responses(
        (status = 200, description = "Doctors with effective access right now", body = ActiveGrantsRes),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not the record owner", body = ErrorBody),
        (status = 404, description = "No such record", body = ErrorBody)
    )
)]
/// Lists the doctors currently holding an effective grant on a record.
#[axum::debug_handler]
async fn list_record_grants(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<Json<ActiveGrantsRes>> {
    // Ownership check first; expired and revoked entries are filtered
    // lazily by the grant store.
    state.records().get_owned(&actor, id)?;
    let doctor_ids = state.grants().list_active_grants_for(id)?;
    Ok(Json(ActiveGrantsRes { doctor_ids }))
}

// ---------------------------------------------------------------------------
// DTO conversion
// ---------------------------------------------------------------------------

fn required_text(field: &'static str, value: Option<String>) -> ApiResult<NonEmptyText> {
    value
        .as_deref()
        .map(NonEmptyText::new)
        .transpose()
        .ok()
        .flatten()
        .ok_or_else(|| {
            CoreError::InvalidInput(format!("{field} is required for this role")).into()
        })
}

fn opt_text(value: Option<String>) -> ApiResult<Option<NonEmptyText>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(NonEmptyText::new)
        .transpose()
        .map_err(ApiError::from)
}

fn contact_from(dto: EmergencyContactDto) -> ApiResult<EmergencyContact> {
    Ok(EmergencyContact {
        name: NonEmptyText::new(&dto.name)?,
        phone: NonEmptyText::new(&dto.phone)?,
        relationship: opt_text(dto.relationship)?,
    })
}

fn new_actor_from(req: RegisterReq) -> ApiResult<NewActor> {
    let role: Role = req.role.parse().map_err(ApiError::from)?;

    let profile = match role {
        Role::Patient => RoleProfile::Patient {
            date_of_birth: req.date_of_birth,
            address: opt_text(req.address)?,
            emergency_contact: req.emergency_contact.map(contact_from).transpose()?,
        },
        Role::Doctor => RoleProfile::Doctor {
            license_number: required_text("license_number", req.license_number)?,
            specialization: opt_text(req.specialization)?,
            hospital: opt_text(req.hospital)?,
            verified: false,
        },
        Role::EmergencyResponder => RoleProfile::EmergencyResponder {
            badge_number: required_text("badge_number", req.badge_number)?,
            department: opt_text(req.department)?,
            verified: false,
        },
        Role::Admin => RoleProfile::Admin,
    };

    Ok(NewActor {
        email: EmailAddress::new(&req.email)?,
        password: req.password,
        first_name: NonEmptyText::new(&req.first_name)?,
        last_name: NonEmptyText::new(&req.last_name)?,
        phone: opt_text(req.phone)?,
        profile,
    })
}

fn new_record_from(req: CreateRecordReq) -> ApiResult<NewRecord> {
    let category = match req.category.as_deref() {
        Some(value) => value.parse().map_err(ApiError::from)?,
        None => Default::default(),
    };

    let files = req
        .files
        .into_iter()
        .map(|f| {
            Ok(mera_core::FileRef {
                filename: NonEmptyText::new(&f.filename)?,
                original_name: opt_text(f.original_name)?,
                media_type: opt_text(f.media_type)?,
                size_bytes: f.size_bytes,
            })
        })
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(NewRecord {
        title: Some(NonEmptyText::new(&req.title)?),
        description: opt_text(req.description)?,
        category,
        files,
        record_date: req.record_date,
        hospital: opt_text(req.hospital)?,
        is_emergency_visible: req.is_emergency_visible,
    })
}

fn actor_res(actor: &Actor) -> ActorRes {
    let verified = match &actor.profile {
        RoleProfile::Doctor { verified, .. }
        | RoleProfile::EmergencyResponder { verified, .. } => Some(*verified),
        RoleProfile::Patient { .. } | RoleProfile::Admin => None,
    };

    ActorRes {
        id: actor.id,
        email: actor.email.to_string(),
        role: actor.role().as_str().into(),
        first_name: actor.first_name.to_string(),
        last_name: actor.last_name.to_string(),
        phone: actor.phone.as_ref().map(ToString::to_string),
        verified,
        is_active: actor.is_active,
        created_at: actor.created_at,
        last_login: actor.last_login,
    }
}

fn record_res(record: MedicalRecord) -> RecordRes {
    RecordRes {
        id: record.id,
        patient_id: record.patient_id,
        title: record.title.to_string(),
        description: record.description.map(|d| d.to_string()),
        category: record.category.as_str().into(),
        files: record
            .files
            .into_iter()
            .map(|f| FileRefDto {
                filename: f.filename.to_string(),
                original_name: f.original_name.map(|n| n.to_string()),
                media_type: f.media_type.map(|m| m.to_string()),
                size_bytes: f.size_bytes,
            })
            .collect(),
        record_date: record.record_date,
        hospital: record.hospital.map(|h| h.to_string()),
        is_emergency_visible: record.is_emergency_visible,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

fn emergency_access_res(bundle: EmergencyAccessBundle) -> EmergencyAccessRes {
    EmergencyAccessRes {
        message: "Emergency access granted".into(),
        patient: EmergencyPatientRes {
            first_name: bundle.patient.first_name.to_string(),
            last_name: bundle.patient.last_name.to_string(),
            date_of_birth: bundle.patient.date_of_birth,
            phone: bundle.patient.phone.map(|p| p.to_string()),
            address: bundle.patient.address.map(|a| a.to_string()),
            emergency_contact: bundle.patient.emergency_contact.map(|c| EmergencyContactDto {
                name: c.name.to_string(),
                phone: c.phone.to_string(),
                relationship: c.relationship.map(|r| r.to_string()),
            }),
        },
        emergency_records: bundle
            .emergency_records
            .into_iter()
            .map(|view| EmergencyRecordRes {
                title: view.title.to_string(),
                description: view.description.map(|d| d.to_string()),
                category: view.category.as_str().into(),
                record_date: view.record_date,
            })
            .collect(),
        access_id: bundle.access_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_register() -> RegisterReq {
        RegisterReq {
            email: "person@example.com".into(),
            password: "a-long-password".into(),
            role: "patient".into(),
            first_name: "Pat".into(),
            last_name: "Ient".into(),
            phone: None,
            date_of_birth: None,
            address: None,
            emergency_contact: None,
            license_number: None,
            specialization: None,
            hospital: None,
            badge_number: None,
            department: None,
        }
    }

    #[test]
    fn test_patient_registration_converts() {
        let new_actor = new_actor_from(base_register()).unwrap();
        assert_eq!(new_actor.profile.role(), Role::Patient);
        assert_eq!(new_actor.email.as_str(), "person@example.com");
    }

    #[test]
    fn test_doctor_registration_requires_license() {
        let req = RegisterReq {
            role: "doctor".into(),
            ..base_register()
        };
        assert!(new_actor_from(req).is_err());

        let req = RegisterReq {
            role: "doctor".into(),
            license_number: Some("GMC-55".into()),
            ..base_register()
        };
        let new_actor = new_actor_from(req).unwrap();
        assert!(matches!(
            new_actor.profile,
            RoleProfile::Doctor {
                verified: false,
                ..
            }
        ));
    }

    #[test]
    fn test_responder_registration_requires_badge() {
        let req = RegisterReq {
            role: "emergency".into(),
            ..base_register()
        };
        assert!(new_actor_from(req).is_err());
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let req = RegisterReq {
            role: "superuser".into(),
            ..base_register()
        };
        assert!(new_actor_from(req).is_err());
    }

    #[test]
    fn test_record_conversion_rejects_unknown_category() {
        let req = CreateRecordReq {
            title: "X-ray".into(),
            description: None,
            category: Some("selfies".into()),
            files: Vec::new(),
            record_date: None,
            hospital: None,
            is_emergency_visible: false,
        };
        assert!(new_record_from(req).is_err());
    }

    #[test]
    fn test_record_conversion_defaults_category() {
        let req = CreateRecordReq {
            title: "Notes".into(),
            description: Some("  ".into()),
            category: None,
            files: Vec::new(),
            record_date: None,
            hospital: None,
            is_emergency_visible: true,
        };
        let new_record = new_record_from(req).unwrap();
        assert_eq!(new_record.category, mera_core::RecordCategory::General);
        // Whitespace-only optional text collapses to None.
        assert!(new_record.description.is_none());
        assert!(new_record.is_emergency_visible);
    }
}
