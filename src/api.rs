use crate::clinic;
use crate::dispatcher::Dispatcher;
use crate::models::{AppointmentChanges, NewAppointment, NewClient, SettingsInput};
use actix_web::http::StatusCode;
use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder, ResponseError};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

const CLINIC_HEADER: &str = "x-clinic-id";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid data provided: {0}")]
    BadClientData(String),
    #[error("Unidentifiable clinic: {0}")]
    UnidentifiableClinic(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal data store error")]
    Store(#[from] sqlx::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadClientData(_) => StatusCode::BAD_REQUEST,
            ApiError::UnidentifiableClinic(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Store(e) = self {
            error!("Data store error: {}", e);
        }
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

/// The clinic a request acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub clinic_id: Uuid,
}

pub fn ensure_clinic_header(req: &HttpRequest) -> Result<TenantContext, ApiError> {
    let header = req.headers().get(CLINIC_HEADER).ok_or_else(|| {
        ApiError::UnidentifiableClinic(format!("missing `{}` header", CLINIC_HEADER))
    })?;

    header
        .to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .map(|clinic_id| TenantContext { clinic_id })
        .ok_or_else(|| {
            ApiError::UnidentifiableClinic(format!("malformed `{}` header", CLINIC_HEADER))
        })
}

fn bad_request(reason: String) -> actix_web::Error {
    ApiError::BadClientData(reason).into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| bad_request(err.to_string())))
        .app_data(web::PathConfig::default().error_handler(|err, _req| bad_request(err.to_string())))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| bad_request(err.to_string())))
        .service(health_check)
        .service(send_reminders)
        .service(list_clients)
        .service(create_client)
        .service(update_client)
        .service(delete_client)
        .service(list_appointments)
        .service(create_appointment)
        .service(update_appointment)
        .service(delete_appointment)
        .service(get_settings)
        .service(put_settings);
}

#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

/// Runs one reminder pass. Meant to be hit by an external scheduler.
#[get("/api/send-reminders")]
async fn send_reminders(dispatcher: web::Data<Dispatcher>) -> HttpResponse {
    match dispatcher.run_pass().await {
        Ok(summary) => HttpResponse::Ok().json(json!({ "success": true, "summary": summary })),
        Err(e) => {
            error!("Error fetching pending appointments: {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClientQuery {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppointmentQuery {
    q: Option<String>,
    date: Option<NaiveDate>,
}

fn validate_client(client: &NewClient) -> Result<(), ApiError> {
    if client.name.trim().is_empty() {
        return Err(ApiError::BadClientData("client name must not be empty".into()));
    }
    Ok(())
}

#[get("/api/clients")]
async fn list_clients(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    query: web::Query<ClientQuery>,
) -> Result<HttpResponse, ApiError> {
    let ctx = ensure_clinic_header(&req)?;
    let clients = clinic::list_clients(&pool, ctx.clinic_id).await?;
    Ok(HttpResponse::Ok().json(clinic::filter_clients(clients, query.q.as_deref())))
}

#[post("/api/clients")]
async fn create_client(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    body: web::Json<NewClient>,
) -> Result<HttpResponse, ApiError> {
    let ctx = ensure_clinic_header(&req)?;
    validate_client(&body)?;
    let client = clinic::create_client(&pool, ctx.clinic_id, &body).await?;
    Ok(HttpResponse::Created().json(client))
}

#[put("/api/clients/{id}")]
async fn update_client(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    body: web::Json<NewClient>,
) -> Result<HttpResponse, ApiError> {
    let ctx = ensure_clinic_header(&req)?;
    validate_client(&body)?;
    let client_id = path.into_inner();
    match clinic::update_client(&pool, ctx.clinic_id, client_id, &body).await? {
        Some(client) => Ok(HttpResponse::Ok().json(client)),
        None => Err(ApiError::NotFound(format!("client {}", client_id))),
    }
}

#[delete("/api/clients/{id}")]
async fn delete_client(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let ctx = ensure_clinic_header(&req)?;
    let client_id = path.into_inner();
    if clinic::delete_client(&pool, ctx.clinic_id, client_id).await? {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(ApiError::NotFound(format!("client {}", client_id)))
    }
}

#[get("/api/appointments")]
async fn list_appointments(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    tz: web::Data<Tz>,
    query: web::Query<AppointmentQuery>,
) -> Result<HttpResponse, ApiError> {
    let ctx = ensure_clinic_header(&req)?;
    let appointments = clinic::list_appointments(&pool, ctx.clinic_id).await?;
    Ok(HttpResponse::Ok().json(clinic::filter_appointments(
        appointments,
        query.q.as_deref(),
        query.date,
        **tz,
    )))
}

#[post("/api/appointments")]
async fn create_appointment(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    body: web::Json<NewAppointment>,
) -> Result<HttpResponse, ApiError> {
    let ctx = ensure_clinic_header(&req)?;
    match clinic::create_appointment(&pool, ctx.clinic_id, &body).await? {
        Some(appointment) => Ok(HttpResponse::Created().json(appointment)),
        None => Err(ApiError::NotFound(format!("client {}", body.client_id))),
    }
}

#[put("/api/appointments/{id}")]
async fn update_appointment(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    body: web::Json<AppointmentChanges>,
) -> Result<HttpResponse, ApiError> {
    let ctx = ensure_clinic_header(&req)?;
    let appointment_id = path.into_inner();
    match clinic::update_appointment(&pool, ctx.clinic_id, appointment_id, &body).await? {
        Some(appointment) => Ok(HttpResponse::Ok().json(appointment)),
        None => Err(ApiError::NotFound(format!("appointment {}", appointment_id))),
    }
}

#[delete("/api/appointments/{id}")]
async fn delete_appointment(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let ctx = ensure_clinic_header(&req)?;
    let appointment_id = path.into_inner();
    if clinic::delete_appointment(&pool, ctx.clinic_id, appointment_id).await? {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(ApiError::NotFound(format!("appointment {}", appointment_id)))
    }
}

#[get("/api/settings")]
async fn get_settings(req: HttpRequest, pool: web::Data<PgPool>) -> Result<HttpResponse, ApiError> {
    let ctx = ensure_clinic_header(&req)?;
    match clinic::get_settings(&pool, ctx.clinic_id).await? {
        Some(settings) => Ok(HttpResponse::Ok().json(settings)),
        None => Err(ApiError::NotFound("clinic settings".into())),
    }
}

#[put("/api/settings")]
async fn put_settings(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    body: web::Json<SettingsInput>,
) -> Result<HttpResponse, ApiError> {
    let ctx = ensure_clinic_header(&req)?;
    if !(0..=23).contains(&body.send_hour) {
        return Err(ApiError::BadClientData(format!(
            "send_hour must be between 0 and 23, got {}",
            body.send_hour
        )));
    }
    let settings = clinic::upsert_settings(&pool, ctx.clinic_id, &body).await?;
    Ok(HttpResponse::Ok().json(settings))
}
