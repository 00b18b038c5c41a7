use crate::infra::{deserialize_optional_date, lock_desk, today_or_now, AppState, SharedDesk, UserView};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post, put};
use axum::{Extension, Json, Router};
use bto_allocation::allocation::{
    Application, BookingFilter, BookingReceipt, BookingReportEntry, Decision, DeletionOutcome,
    Denial, Enquiry, EnquiryId, FlatType, Identity, OfficerRegistration, Project, ProjectDraft,
    ProjectFilter, ProjectName, ProjectUpdate, ProjectView, SyncReport,
};
use bto_allocation::error::AppError;
use bto_allocation::storage::AllocationStore;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

/// Identity of the caller; every desk route acts on its behalf.
pub(crate) const ACTOR_HEADER: &str = "x-bto-identity";

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) identity: String,
    pub(crate) password: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DatedRequest {
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApplyRequest {
    pub(crate) flat_type: FlatType,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionRequest {
    pub(crate) decision: Decision,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VisibilityRequest {
    pub(crate) visible: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnquiryRequest {
    pub(crate) project: String,
    pub(crate) text: String,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnquiryTextRequest {
    pub(crate) text: String,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) fn with_desk_routes<S>(desk: SharedDesk<S>) -> Router
where
    S: AllocationStore + 'static,
{
    Router::new()
        .route("/api/v1/login", post(login_endpoint::<S>))
        .route("/api/v1/sync", post(sync_endpoint::<S>))
        .route(
            "/api/v1/projects",
            get(list_projects::<S>).post(create_project::<S>),
        )
        .route(
            "/api/v1/projects/:project",
            patch(update_project::<S>).delete(delete_project::<S>),
        )
        .route(
            "/api/v1/projects/:project/visibility",
            put(set_visibility::<S>),
        )
        .route(
            "/api/v1/projects/:project/applications",
            post(apply_endpoint::<S>),
        )
        .route(
            "/api/v1/projects/:project/withdrawal",
            post(withdrawal_endpoint::<S>),
        )
        .route(
            "/api/v1/projects/:project/applications/:applicant/decision",
            post(decide_application::<S>),
        )
        .route(
            "/api/v1/projects/:project/applications/:applicant/withdrawal",
            post(decide_withdrawal::<S>),
        )
        .route(
            "/api/v1/projects/:project/applications/:applicant/booking",
            post(book_endpoint::<S>),
        )
        .route(
            "/api/v1/projects/:project/registrations",
            post(register_endpoint::<S>),
        )
        .route(
            "/api/v1/projects/:project/registrations/:officer/decision",
            post(decide_registration::<S>),
        )
        .route("/api/v1/bookings", get(booking_report::<S>))
        .route(
            "/api/v1/enquiries",
            get(list_enquiries::<S>).post(submit_enquiry::<S>),
        )
        .route(
            "/api/v1/enquiries/:enquiry",
            patch(edit_enquiry::<S>).delete(delete_enquiry::<S>),
        )
        .route("/api/v1/enquiries/:enquiry/reply", post(reply_enquiry::<S>))
        .with_state(desk)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn actor(headers: &HeaderMap) -> Result<Identity, AppError> {
    let raw = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(Denial::InvalidCredentials)?;
    Identity::parse(raw).map_err(|_| Denial::InvalidCredentials.into())
}

fn project_name(raw: &str) -> Result<ProjectName, AppError> {
    ProjectName::new(raw).map_err(|err| Denial::from(err).into())
}

fn identity(raw: &str) -> Result<Identity, AppError> {
    Identity::parse(raw).map_err(|err| Denial::from(err).into())
}

fn enquiry_id(raw: &str) -> Result<EnquiryId, AppError> {
    EnquiryId::parse(raw).map_err(|err| Denial::from(err).into())
}

pub(crate) async fn login_endpoint<S>(
    State(desk): State<SharedDesk<S>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<UserView>, AppError>
where
    S: AllocationStore + 'static,
{
    let user = lock_desk(&desk)?.login(&request.identity, &request.password)?;
    Ok(Json(UserView::from(&user)))
}

pub(crate) async fn sync_endpoint<S>(
    State(desk): State<SharedDesk<S>>,
) -> Result<Json<SyncReport>, AppError>
where
    S: AllocationStore + 'static,
{
    Ok(Json(lock_desk(&desk)?.synchronize()?))
}

pub(crate) async fn list_projects<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Query(filter): Query<ProjectFilter>,
) -> Result<Json<Vec<ProjectView>>, AppError>
where
    S: AllocationStore + 'static,
{
    let viewer = actor(&headers)?;
    Ok(Json(lock_desk(&desk)?.projects_for(&viewer, &filter)?))
}

pub(crate) async fn create_project<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Json(draft): Json<ProjectDraft>,
) -> Result<(StatusCode, Json<Project>), AppError>
where
    S: AllocationStore + 'static,
{
    let manager = actor(&headers)?;
    let project = lock_desk(&desk)?.create_project(&manager, draft)?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub(crate) async fn update_project<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Path(project): Path<String>,
    Json(update): Json<ProjectUpdate>,
) -> Result<Json<Project>, AppError>
where
    S: AllocationStore + 'static,
{
    let manager = actor(&headers)?;
    let name = project_name(&project)?;
    Ok(Json(lock_desk(&desk)?.update_project(&manager, &name, update)?))
}

pub(crate) async fn set_visibility<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Path(project): Path<String>,
    Json(request): Json<VisibilityRequest>,
) -> Result<Json<Project>, AppError>
where
    S: AllocationStore + 'static,
{
    let manager = actor(&headers)?;
    let name = project_name(&project)?;
    Ok(Json(lock_desk(&desk)?.set_visibility(&manager, &name, request.visible)?))
}

pub(crate) async fn delete_project<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Path(project): Path<String>,
) -> Result<Json<DeletionOutcome>, AppError>
where
    S: AllocationStore + 'static,
{
    let manager = actor(&headers)?;
    let name = project_name(&project)?;
    Ok(Json(lock_desk(&desk)?.delete_project(&manager, &name)?))
}

pub(crate) async fn apply_endpoint<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Path(project): Path<String>,
    Json(request): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<Application>), AppError>
where
    S: AllocationStore + 'static,
{
    let applicant = actor(&headers)?;
    let name = project_name(&project)?;
    let application = lock_desk(&desk)?.apply(
        &applicant,
        &name,
        request.flat_type,
        today_or_now(request.today),
    )?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub(crate) async fn withdrawal_endpoint<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Path(project): Path<String>,
) -> Result<Json<Application>, AppError>
where
    S: AllocationStore + 'static,
{
    let applicant = actor(&headers)?;
    let name = project_name(&project)?;
    Ok(Json(lock_desk(&desk)?.request_withdrawal(&applicant, &name)?))
}

pub(crate) async fn decide_application<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Path((project, applicant)): Path<(String, String)>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Application>, AppError>
where
    S: AllocationStore + 'static,
{
    let manager = actor(&headers)?;
    let name = project_name(&project)?;
    let applicant = identity(&applicant)?;
    Ok(Json(lock_desk(&desk)?.decide_application(
        &manager,
        &applicant,
        &name,
        request.decision,
    )?))
}

pub(crate) async fn decide_withdrawal<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Path((project, applicant)): Path<(String, String)>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Application>, AppError>
where
    S: AllocationStore + 'static,
{
    let manager = actor(&headers)?;
    let name = project_name(&project)?;
    let applicant = identity(&applicant)?;
    Ok(Json(lock_desk(&desk)?.decide_withdrawal(
        &manager,
        &applicant,
        &name,
        request.decision,
    )?))
}

pub(crate) async fn book_endpoint<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Path((project, applicant)): Path<(String, String)>,
    Json(request): Json<DatedRequest>,
) -> Result<Json<BookingReceipt>, AppError>
where
    S: AllocationStore + 'static,
{
    let officer = actor(&headers)?;
    let name = project_name(&project)?;
    let applicant = identity(&applicant)?;
    Ok(Json(lock_desk(&desk)?.book(
        &officer,
        &applicant,
        &name,
        today_or_now(request.today),
    )?))
}

pub(crate) async fn register_endpoint<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Path(project): Path<String>,
    Json(request): Json<DatedRequest>,
) -> Result<(StatusCode, Json<OfficerRegistration>), AppError>
where
    S: AllocationStore + 'static,
{
    let officer = actor(&headers)?;
    let name = project_name(&project)?;
    let registration =
        lock_desk(&desk)?.register(&officer, &name, today_or_now(request.today))?;
    Ok((StatusCode::CREATED, Json(registration)))
}

pub(crate) async fn decide_registration<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Path((project, officer)): Path<(String, String)>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<OfficerRegistration>, AppError>
where
    S: AllocationStore + 'static,
{
    let manager = actor(&headers)?;
    let name = project_name(&project)?;
    let officer = identity(&officer)?;
    Ok(Json(lock_desk(&desk)?.decide_registration(
        &manager,
        &officer,
        &name,
        request.decision,
    )?))
}

pub(crate) async fn booking_report<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Vec<BookingReportEntry>>, AppError>
where
    S: AllocationStore + 'static,
{
    let manager = actor(&headers)?;
    Ok(Json(lock_desk(&desk)?.booking_report(&manager, &filter)?))
}

pub(crate) async fn list_enquiries<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Enquiry>>, AppError>
where
    S: AllocationStore + 'static,
{
    let viewer = actor(&headers)?;
    Ok(Json(lock_desk(&desk)?.enquiries_for(&viewer)?))
}

pub(crate) async fn submit_enquiry<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Json(request): Json<EnquiryRequest>,
) -> Result<(StatusCode, Json<Enquiry>), AppError>
where
    S: AllocationStore + 'static,
{
    let author = actor(&headers)?;
    let enquiry = lock_desk(&desk)?.submit_enquiry(
        &author,
        &request.project,
        &request.text,
        today_or_now(request.today),
    )?;
    Ok((StatusCode::CREATED, Json(enquiry)))
}

pub(crate) async fn edit_enquiry<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Path(enquiry): Path<String>,
    Json(request): Json<EnquiryTextRequest>,
) -> Result<Json<Enquiry>, AppError>
where
    S: AllocationStore + 'static,
{
    let author = actor(&headers)?;
    let id = enquiry_id(&enquiry)?;
    Ok(Json(lock_desk(&desk)?.edit_enquiry(&author, id, &request.text)?))
}

pub(crate) async fn delete_enquiry<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Path(enquiry): Path<String>,
) -> Result<Json<Enquiry>, AppError>
where
    S: AllocationStore + 'static,
{
    let author = actor(&headers)?;
    let id = enquiry_id(&enquiry)?;
    Ok(Json(lock_desk(&desk)?.delete_enquiry(&author, id)?))
}

pub(crate) async fn reply_enquiry<S>(
    State(desk): State<SharedDesk<S>>,
    headers: HeaderMap,
    Path(enquiry): Path<String>,
    Json(request): Json<EnquiryTextRequest>,
) -> Result<Json<Enquiry>, AppError>
where
    S: AllocationStore + 'static,
{
    let responder = actor(&headers)?;
    let id = enquiry_id(&enquiry)?;
    Ok(Json(lock_desk(&desk)?.reply_enquiry(
        &responder,
        id,
        &request.text,
        today_or_now(request.today),
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use axum::response::Response;
    use bto_allocation::allocation::{
        AllocationDesk, ApplicationWindow, DeskPolicy, FlatInventory, MaritalStatus, Role, User,
    };
    use bto_allocation::storage::MemoryStore;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    const APPLICANT: &str = "T7654321B";
    const OFFICER: &str = "T2109876H";
    const MANAGER: &str = "T8765432F";
    const ACACIA: &str = "/api/v1/projects/Acacia%20Breeze";

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn router() -> Router {
        let id = |raw: &str| Identity::parse(raw).expect("valid identity");
        let users = vec![
            User::new(id(APPLICANT), "Sarah", 40, MaritalStatus::Married, "secret", Role::Applicant),
            User::new(id(OFFICER), "Daniel", 36, MaritalStatus::Single, "secret", Role::Officer),
            User::new(id(MANAGER), "Michael", 36, MaritalStatus::Single, "secret", Role::Manager),
        ];
        let flats = BTreeMap::from([
            (FlatType::TwoRoom, FlatInventory::new(2, 350_000)),
            (FlatType::ThreeRoom, FlatInventory::new(2, 450_000)),
        ]);
        let mut project = Project::new(
            ProjectName::new("Acacia Breeze").expect("valid name"),
            "Yishun",
            flats,
            ApplicationWindow::new(day(2025, 2, 15), day(2025, 3, 20)).expect("valid window"),
            id(MANAGER),
            3,
        )
        .expect("valid project")
        .with_roster(vec![id(OFFICER)]);
        project.visible = true;

        let store = Arc::new(MemoryStore::from_records(
            users,
            vec![project],
            Vec::new(),
            Vec::new(),
            Vec::new(),
        ));
        let (desk, _) = AllocationDesk::open(store, DeskPolicy::default()).expect("desk opens");
        with_desk_routes(Arc::new(Mutex::new(desk)))
    }

    fn request(method: Method, uri: &str, actor: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header(ACTOR_HEADER, actor);
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> Response {
        router.clone().oneshot(request).await.expect("route executes")
    }

    async fn read_json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = send(&router(), request(Method::GET, "/health", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_follows_the_flag() {
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };

        let response = readiness_endpoint(Extension(state.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state
            .readiness
            .store(true, std::sync::atomic::Ordering::Release);
        let response = readiness_endpoint(Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn application_is_decided_and_booked_over_http() {
        let router = router();

        let applied = send(
            &router,
            request(
                Method::POST,
                &format!("{ACACIA}/applications"),
                Some(APPLICANT),
                Some(json!({ "flat_type": "three_room", "today": "2025-03-01" })),
            ),
        )
        .await;
        assert_eq!(applied.status(), StatusCode::CREATED);

        let decided = send(
            &router,
            request(
                Method::POST,
                &format!("{ACACIA}/applications/{APPLICANT}/decision"),
                Some(MANAGER),
                Some(json!({ "decision": "approve" })),
            ),
        )
        .await;
        assert_eq!(decided.status(), StatusCode::OK);

        let booked = send(
            &router,
            request(
                Method::POST,
                &format!("{ACACIA}/applications/{APPLICANT}/booking"),
                Some(OFFICER),
                Some(json!({ "today": "2025-03-05" })),
            ),
        )
        .await;
        assert_eq!(booked.status(), StatusCode::OK);
        let receipt = read_json_body(booked).await;
        assert_eq!(receipt["price"], 450_000);
        assert_eq!(receipt["officer"], OFFICER);

        let report = send(
            &router,
            request(
                Method::GET,
                "/api/v1/bookings?flat_type=three_room",
                Some(MANAGER),
                None,
            ),
        )
        .await;
        assert_eq!(report.status(), StatusCode::OK);
        let entries = read_json_body(report).await;
        assert_eq!(entries.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn denials_map_to_status_codes() {
        let router = router();

        let anonymous = send(&router, request(Method::GET, "/api/v1/projects", None, None)).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let hidden_role = send(
            &router,
            request(
                Method::GET,
                "/api/v1/projects?managed_only=true",
                Some(APPLICANT),
                None,
            ),
        )
        .await;
        assert_eq!(hidden_role.status(), StatusCode::FORBIDDEN);

        let unknown = send(
            &router,
            request(
                Method::POST,
                "/api/v1/projects/Nowhere/applications",
                Some(APPLICANT),
                Some(json!({ "flat_type": "two_room", "today": "2025-03-01" })),
            ),
        )
        .await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let apply = || {
            request(
                Method::POST,
                &format!("{ACACIA}/applications"),
                Some(APPLICANT),
                Some(json!({ "flat_type": "two_room", "today": "2025-03-01" })),
            )
        };
        assert_eq!(send(&router, apply()).await.status(), StatusCode::CREATED);
        let duplicate = send(&router, apply()).await;
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
        assert!(read_json_body(duplicate).await["error"].is_string());
    }

    #[tokio::test]
    async fn enquiries_round_trip_by_display_id() {
        let router = router();

        let submitted = send(
            &router,
            request(
                Method::POST,
                "/api/v1/enquiries",
                Some(APPLICANT),
                Some(json!({ "project": "acacia breeze", "text": "Pets allowed?", "today": "2025-03-01" })),
            ),
        )
        .await;
        assert_eq!(submitted.status(), StatusCode::CREATED);
        let enquiry = read_json_body(submitted).await;
        assert_eq!(enquiry["id"], 1);
        assert_eq!(enquiry["project"], "Acacia Breeze");

        let replied = send(
            &router,
            request(
                Method::POST,
                "/api/v1/enquiries/ENQ-0001/reply",
                Some(OFFICER),
                Some(json!({ "text": "Small pets only." })),
            ),
        )
        .await;
        assert_eq!(replied.status(), StatusCode::OK);

        let listed = send(&router, request(Method::GET, "/api/v1/enquiries", Some(MANAGER), None)).await;
        let enquiries = read_json_body(listed).await;
        assert_eq!(enquiries[0]["reply"]["text"], "Small pets only.");
    }
}
