use axum::{
    Router,
    body::Bytes,
    extract::{Form, Json, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::ServeConfig;
use crate::core::{
    Clock, LoanCalculation, LoanError, LoanForm, LoanResult, Summary, SystemClock, calculate,
};
use crate::export::{REPORT_FILE_NAME, render_csv};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

/// Immutable per-process state shared by every handler.
pub struct AppState {
    pub config: ServeConfig,
    pub clock: Box<dyn Clock>,
}

/// Export form: the loan fields plus the totals the user was shown.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DownloadForm {
    #[serde(flatten)]
    loan: LoanForm,
    emi: Option<String>,
    total_interest: Option<String>,
    total_payment: Option<String>,
}

impl DownloadForm {
    fn submitted_summary(&self) -> Option<Summary> {
        let parse = |field: &Option<String>| {
            field
                .as_deref()
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };
        Some(Summary {
            installment_amount: parse(&self.emi)?,
            total_interest: parse(&self.total_interest)?,
            total_payment: parse(&self.total_payment)?,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShareResponse {
    shareable_link: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/calculate",
            get(calculate_get_handler).post(calculate_post_handler),
        )
        .route("/api/download", post(download_handler))
        .route("/api/share", post(share_handler))
        .route("/api/share_link", get(share_link_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(config: ServeConfig) -> std::io::Result<()> {
    let addr = config.addr;
    let state = Arc::new(AppState {
        config,
        clock: Box::new(SystemClock),
    });

    if state.config.public_url.is_none() {
        log::warn!("--public-url not set; share links will use the client-supplied Host header");
    }

    let listener = TcpListener::bind(addr).await?;
    log::info!("EMI calculator listening on http://{addr}");
    log::info!("Local access: http://127.0.0.1:{}/", addr.port());

    axum::serve(listener, router(state)).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn calculate_get_handler(
    State(state): State<Arc<AppState>>,
    Query(form): Query<LoanForm>,
) -> Response {
    calculation_response(&state, &form, "calculate")
}

/// Accepts the browser's urlencoded form or a JSON object carrying the same fields.
async fn calculate_post_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match decode_loan_form(&headers, &body) {
        Ok(form) => calculation_response(&state, &form, "calculate"),
        Err(response) => response,
    }
}

/// Decodes a shared link. The link only carries inputs, so everything is validated and
/// recomputed here.
async fn share_link_handler(
    State(state): State<Arc<AppState>>,
    Query(form): Query<LoanForm>,
) -> Response {
    calculation_response(&state, &form, "share_link")
}

async fn download_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<DownloadForm>,
) -> Response {
    let calculation = match calculate_for(&state, &form.loan) {
        Ok(calculation) => calculation,
        Err(e) => return loan_error_response("download", e),
    };

    let summary = form.submitted_summary();
    match render_csv(&calculation, summary.as_ref()) {
        Ok(document) => with_cache_control((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{REPORT_FILE_NAME}\""),
                ),
            ],
            document,
        )),
        Err(e) => loan_error_response("download", e),
    }
}

async fn share_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoanForm>,
) -> Response {
    if let Err(e) = form.validate(&state.config.policy) {
        return loan_error_response("share", e);
    }

    let base = base_url(&state.config, &headers);
    match share_link(&base, &form) {
        Ok(link) => json_response(
            StatusCode::OK,
            ShareResponse {
                shareable_link: link,
            },
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn decode_loan_form(headers: &HeaderMap, body: &[u8]) -> Result<LoanForm, Response> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase());

    match content_type.as_deref() {
        Some("application/json") => serde_json::from_slice(body).map_err(|e| {
            log::warn!("rejected calculate request: bad json body: {e}");
            error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON body: {e}"))
        }),
        None | Some("application/x-www-form-urlencoded") => serde_urlencoded::from_bytes(body)
            .map_err(|e| {
                log::warn!("rejected calculate request: bad form body: {e}");
                error_response(StatusCode::BAD_REQUEST, &format!("Invalid form body: {e}"))
            }),
        Some(other) => Err(error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            &format!("Unsupported content type: {other}"),
        )),
    }
}

fn calculate_for(state: &AppState, form: &LoanForm) -> LoanResult<LoanCalculation> {
    let request = form.validate(&state.config.policy)?;
    calculate(&request, state.clock.current_period())
}

fn calculation_response(state: &AppState, form: &LoanForm, route: &str) -> Response {
    match calculate_for(state, form) {
        Ok(calculation) => json_response(StatusCode::OK, calculation),
        Err(e) => loan_error_response(route, e),
    }
}

/// Builds `{base}/?{query}` carrying only the non-empty input fields.
pub fn share_link(base: &str, form: &LoanForm) -> Result<String, serde_urlencoded::ser::Error> {
    let query = serde_urlencoded::to_string(form.normalized())?;
    Ok(format!("{}/?{query}", base.trim_end_matches('/')))
}

fn base_url(config: &ServeConfig, headers: &HeaderMap) -> String {
    if let Some(url) = &config.public_url {
        return url.clone();
    }
    headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .map(|host| format!("http://{host}"))
        .unwrap_or_else(|| format!("http://{}", config.addr))
}

fn loan_error_response(route: &str, err: LoanError) -> Response {
    if err.is_rejection() {
        log::warn!("rejected {route} request: {err}");
        error_response(StatusCode::BAD_REQUEST, &err.to_string())
    } else {
        log::error!("{route} failed: {err}");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validation::DEFAULT_MAX_TERM_MONTHS;
    use crate::core::{FixedClock, StartPeriod, ValidationPolicy};
    use serde_json::Value;

    fn sample_state() -> Arc<AppState> {
        Arc::new(AppState {
            config: ServeConfig {
                addr: "127.0.0.1:8080".parse().expect("socket addr"),
                public_url: None,
                policy: ValidationPolicy {
                    max_term_months: DEFAULT_MAX_TERM_MONTHS,
                },
            },
            clock: Box::new(FixedClock(StartPeriod {
                year: 2026,
                month: 11,
            })),
        })
    }

    fn sample_form() -> LoanForm {
        LoanForm {
            loan_amount: Some("100000".to_string()),
            interest_rate: Some("10".to_string()),
            tenure_years: Some("1".to_string()),
            tenure_months: None,
        }
    }

    fn form_request(form: &LoanForm) -> (HeaderMap, Bytes) {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let body = serde_urlencoded::to_string(form).expect("form encodes");
        (headers, Bytes::from(body))
    }

    fn json_request(body: &str) -> (HeaderMap, Bytes) {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        (headers, Bytes::from(body.to_string()))
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable")
            .to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).expect("body should be json")
    }

    #[tokio::test]
    async fn calculate_returns_summary_breakdown_and_schedule() {
        let (headers, body) = form_request(&sample_form());
        let response = calculate_post_handler(State(sample_state()), headers, body).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );

        let json = body_json(response).await;
        assert_eq!(json["summary"]["installmentAmount"], 8792.0);
        assert_eq!(json["summary"]["totalPayment"], 105_499.0);
        assert_eq!(json["summary"]["totalInterest"], 5_499.0);
        assert_eq!(json["tenureMonths"], 12);
        assert_eq!(json["breakdown"]["slices"][0]["label"], "Total Interest");

        let schedule = json["schedule"].as_array().expect("schedule array");
        assert_eq!(schedule.len(), 12);
        assert_eq!(schedule[0]["month"], "Nov");
        assert_eq!(schedule[2]["year"], 2027);
        assert_eq!(schedule[0]["installmentAmount"], 8791.59);
        assert!(schedule[0].get("percentPaidToDate").is_some());
        assert!(schedule[0].get("remainingBalance").is_some());
    }

    #[tokio::test]
    async fn calculate_rejects_out_of_range_principal() {
        let mut form = sample_form();
        form.loan_amount = Some("50".to_string());
        let response = calculate_get_handler(State(sample_state()), Query(form)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(
            json["error"],
            "Loan amount must be between 100 and 1,000,000,000."
        );
    }

    #[tokio::test]
    async fn calculate_rejects_missing_fields() {
        let (headers, body) = form_request(&LoanForm::default());
        let response = calculate_post_handler(State(sample_state()), headers, body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "All fields are required.");
    }

    #[tokio::test]
    async fn calculate_accepts_json_with_text_fields() {
        let (headers, body) = json_request(
            r#"{"loan_amount":"100000","interest_rate":"10","tenure_years":"1"}"#,
        );
        let response = calculate_post_handler(State(sample_state()), headers, body).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["summary"]["installmentAmount"], 8792.0);
    }

    #[tokio::test]
    async fn calculate_accepts_json_with_numeric_fields() {
        let (headers, body) =
            json_request(r#"{"loan_amount":100000,"interest_rate":10.0,"tenure_months":12}"#);
        let response = calculate_post_handler(State(sample_state()), headers, body).await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["summary"]["totalPayment"], 105_499.0);
        assert_eq!(json["tenureMonths"], 12);
    }

    #[tokio::test]
    async fn calculate_rejects_malformed_json() {
        let (headers, body) = json_request(r#"{"loan_amount":"#);
        let response = calculate_post_handler(State(sample_state()), headers, body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn calculate_rejects_unsupported_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let body = Bytes::from("loan_amount=1");
        let response = calculate_post_handler(State(sample_state()), headers, body).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn calculate_defaults_to_form_decoding_without_content_type() {
        let body = Bytes::from("loan_amount=100000&interest_rate=10&tenure_years=1");
        let response = calculate_post_handler(State(sample_state()), HeaderMap::new(), body).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn share_link_rejects_zero_rate_before_the_engine() {
        let mut form = sample_form();
        form.interest_rate = Some("0".to_string());
        let response = share_link_handler(State(sample_state()), Query(form)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Interest rate must be between 2% and 20%."
        );
    }

    #[tokio::test]
    async fn share_builds_link_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("emi.local:3000"));
        let response = share_handler(State(sample_state()), headers, Form(sample_form())).await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(
            json["shareableLink"],
            "http://emi.local:3000/?loan_amount=100000&interest_rate=10&tenure_years=1"
        );
    }

    #[tokio::test]
    async fn share_rejects_invalid_inputs() {
        let mut form = sample_form();
        form.loan_amount = Some("lots".to_string());
        let response = share_handler(State(sample_state()), HeaderMap::new(), Form(form)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn share_link_round_trips_through_query_decoding() {
        let form = LoanForm {
            loan_amount: Some(" 2500.50 ".to_string()),
            interest_rate: Some("7.25".to_string()),
            tenure_years: Some(String::new()),
            tenure_months: Some("18".to_string()),
        };
        let link = share_link("https://emi.example.com/", &form).expect("link encodes");
        assert_eq!(
            link,
            "https://emi.example.com/?loan_amount=2500.50&interest_rate=7.25&tenure_months=18"
        );

        let (_, query) = link.split_once('?').expect("query string");
        let decoded: LoanForm = serde_urlencoded::from_str(query).expect("query decodes");
        let policy = ValidationPolicy::default();
        assert_eq!(
            decoded.validate(&policy).expect("valid decoded form"),
            form.validate(&policy).expect("valid original form")
        );
    }

    #[test]
    fn base_url_prefers_configured_public_url() {
        let state = sample_state();
        let mut config = state.config.clone();
        assert_eq!(base_url(&config, &HeaderMap::new()), "http://127.0.0.1:8080");

        config.public_url = Some("https://emi.example.com".to_string());
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("ignored:1"));
        assert_eq!(base_url(&config, &headers), "https://emi.example.com");
    }

    #[tokio::test]
    async fn download_recomputes_schedule_and_echoes_summary() {
        let form = DownloadForm {
            loan: sample_form(),
            emi: Some("8792".to_string()),
            total_interest: Some("5499".to_string()),
            total_payment: Some("105499".to_string()),
        };
        let response = download_handler(State(sample_state()), Form(form)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/csv; charset=utf-8"))
        );
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION),
            Some(&HeaderValue::from_static(
                "attachment; filename=\"emi_report.csv\""
            ))
        );

        let text = String::from_utf8(body_bytes(response).await).expect("utf-8 csv");
        assert!(text.starts_with("Loan Amount,100000.00\n"));
        assert!(text.contains("EMI,8792\n"));
        assert!(text.contains("2027,Oct,8718.93,72.66,8791.59,0.00,100.00\n"));
    }

    #[tokio::test]
    async fn download_rejects_invalid_inputs() {
        let mut loan = sample_form();
        loan.tenure_years = Some("0".to_string());
        let form = DownloadForm {
            loan,
            ..DownloadForm::default()
        };
        let response = download_handler(State(sample_state()), Form(form)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_ne!(
            response.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/csv; charset=utf-8"))
        );
        assert_eq!(
            body_json(response).await["error"],
            "Loan tenure must be at least 1 month."
        );
    }

    #[tokio::test]
    async fn download_rejects_missing_fields() {
        let response =
            download_handler(State(sample_state()), Form(DownloadForm::default())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "All fields are required.");
    }

    #[test]
    fn download_form_decodes_flattened_fields() {
        let form: DownloadForm = serde_urlencoded::from_str(
            "loan_amount=1000&interest_rate=5&tenure_months=6&emi=169&total_interest=15&total_payment=1015",
        )
        .expect("form decodes");
        assert_eq!(form.loan.tenure_months.as_deref(), Some("6"));
        let summary = form.submitted_summary().expect("numeric summary");
        assert_eq!(summary.total_payment, 1015.0);

        let partial: DownloadForm =
            serde_urlencoded::from_str("loan_amount=1000&emi=abc").expect("form decodes");
        assert!(partial.submitted_summary().is_none());
    }

    #[tokio::test]
    async fn unknown_routes_return_json_404() {
        let response = not_found_handler().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Not found");
    }

    #[test]
    fn router_builds_with_state() {
        let _router: Router = router(sample_state());
    }
}
