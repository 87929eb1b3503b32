use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use actix_files::NamedFile;
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder, Responder};
use log::{error, info, warn};
use moto_inference::PredictionRecord;
use serde::Serialize;

use crate::event_logger::{model_name, EventLogger};
use crate::form::{self, FormControl, FormState};
use crate::inference::InferenceAdapter;
use crate::models::{ApiResponse, PredictionResult};

const JSON_LIMIT: usize = 64 * 1024;

/// Shared per-process state. The model is read-only after load.
pub struct AppState {
    pub adapter: Arc<InferenceAdapter>,
    pub events: Arc<EventLogger>,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(adapter: InferenceAdapter, events: EventLogger, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            adapter: Arc::new(adapter),
            events: Arc::new(events),
            static_dir: static_dir.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct FormSchema {
    controls: Vec<FormControl>,
    defaults: FormState,
    default_record: Option<PredictionRecord>,
    currency: &'static str,
}

/// Registers the JSON API under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/api/health", web::get().to(health_check))
        .route("/api/model-info", web::get().to(model_info))
        .route("/api/form", web::get().to(form_schema))
        .route("/api/predict", web::post().to(predict));
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| {
            let message = format!("Invalid input: {err}");
            warn!("{message}");
            let response = HttpResponse::BadRequest().json(ApiResponse::<()>::error(&message));
            actix_web::error::InternalError::from_response(err, response).into()
        })
}

fn timed<T: Serialize>(mut builder: HttpResponseBuilder, mut body: ApiResponse<T>, start: Instant) -> HttpResponse {
    body.execution_time_ms = Some(start.elapsed().as_millis() as u64);
    builder.json(body)
}

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success("Motorbike price predictor is up"))
}

async fn model_info(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(state.adapter.model_info()))
}

async fn form_schema() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(FormSchema {
        controls: form::controls(),
        defaults: FormState::default(),
        default_record: form::default_record().ok(),
        currency: crate::models::CURRENCY,
    }))
}

async fn predict(state: web::Data<AppState>, body: web::Json<FormState>) -> HttpResponse {
    let start = Instant::now();

    let record = match body.into_inner().record() {
        Ok(record) => record,
        Err(e) => {
            warn!("Rejected prediction input: {}", e);
            return timed(
                HttpResponse::BadRequest(),
                ApiResponse::<PredictionResult>::error(&format!("Invalid input: {e}")),
                start,
            );
        }
    };

    info!(
        "Prediction requested: {} {} ({}, {} cc, {})",
        record.brand(),
        record.model(),
        record.bike_type(),
        record.capacity().get(),
        record.year().get()
    );

    let adapter = Arc::clone(&state.adapter);
    let scoring_record = record.clone();
    let prediction = match web::block(move || adapter.predict(&scoring_record)).await {
        Ok(Ok(prediction)) => prediction,
        Ok(Err(e)) => {
            error!("Prediction failed: {}", e);
            return timed(
                HttpResponse::InternalServerError(),
                ApiResponse::<PredictionResult>::error(&format!("Prediction failed: {e}")),
                start,
            );
        }
        Err(e) => {
            error!("Blocking pool error during prediction: {}", e);
            return timed(
                HttpResponse::InternalServerError(),
                ApiResponse::<PredictionResult>::error(&format!("Prediction failed: {e}")),
                start,
            );
        }
    };

    let events = Arc::clone(&state.events);
    let logged_record = record.clone();
    let price = prediction.price;
    let (run_id, tracking_warning) =
        match web::block(move || events.log_prediction(&logged_record, price)).await {
            Ok(Ok(run_id)) => (Some(run_id), None),
            Ok(Err(e)) => {
                warn!("Prediction succeeded but was not recorded: {}", e);
                (None, Some(format!("Prediction was not recorded: {e}")))
            }
            Err(e) => {
                warn!("Blocking pool error while recording prediction: {}", e);
                (None, Some(format!("Prediction was not recorded: {e}")))
            }
        };

    let result = PredictionResult::new(
        prediction,
        record,
        model_name(state.adapter.model_path()),
        run_id,
        tracking_warning,
    );
    info!("{}", result.display);
    timed(HttpResponse::Ok(), ApiResponse::success(result), start)
}

pub async fn index(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    match NamedFile::open_async(state.static_dir.join("index.html")).await {
        Ok(file) => file.into_response(&req),
        Err(e) => {
            error!("Could not open index.html: {}", e);
            HttpResponse::InternalServerError().body("Failed to load the page")
        }
    }
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ApiResponse::<()>::error("Endpoint not found"))
}

#[cfg(test)]
mod tests {
    use actix_web::{test, App};
    use moto_inference::{InferenceError, ModelInfo, PredictionRecord, PricePredictor};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use super::*;
    use crate::config::TrackingConfig;
    use crate::event_logger::{METRIC_PREDICTED_PRICE, PARAM_MODEL_NAME, TAG_SOURCE};

    struct Stub(Result<f64, InferenceError>);

    impl PricePredictor for Stub {
        fn predict(&self, _record: &PredictionRecord) -> Result<f64, InferenceError> {
            self.0.clone()
        }

        fn describe(&self) -> ModelInfo {
            ModelInfo {
                name: "stub_model.json".to_string(),
                format: "stub".to_string(),
                features: moto_inference::FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
                trees: None,
            }
        }
    }

    fn state(dir: &TempDir, outcome: Result<f64, InferenceError>, with_model_file: bool) -> web::Data<AppState> {
        let model_path = dir.path().join("stub_model.json");
        if with_model_file {
            std::fs::write(&model_path, b"{\"stub\": true}").unwrap();
        }
        let adapter = InferenceAdapter::new(Arc::new(Stub(outcome)), model_path.clone());
        let events =
            EventLogger::new(TrackingConfig::local(&dir.path().join("mlruns")), model_path).unwrap();
        web::Data::new(AppState::new(adapter, events, dir.path()))
    }

    fn honda() -> Value {
        json!({
            "Brand": "Honda",
            "Model": "CB125",
            "Bike Type": "Motorcycle",
            "Capacity": 125,
            "Mileage": 15000,
            "Year": 2018,
            "Seller": "Individual",
        })
    }

    fn run_count(state: &web::Data<AppState>) -> usize {
        let experiment_id = &state.events.experiment().experiment_id;
        state.events.store().list_runs(experiment_id).unwrap().len()
    }

    #[actix_web::test]
    async fn stub_prediction_is_displayed_and_logged() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Ok(350000.0), true);
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post().uri("/api/predict").set_json(honda()).to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body: Value = test::read_body_json(resp).await;

        assert_eq!(body["success"], true);
        let display = body["data"]["display"].as_str().unwrap();
        assert!(display.contains("350,000"), "{display}");
        assert!(body["data"]["tracking_warning"].is_null());
        assert_eq!(body["data"]["input"]["Bike Type"], "Motorcycle");

        let run_id = body["data"]["run_id"].as_str().unwrap();
        let experiment_id = &state.events.experiment().experiment_id;
        let run = state.events.store().get_run(experiment_id, run_id).unwrap();
        assert_eq!(run.metrics[METRIC_PREDICTED_PRICE], 350000.0);
        assert_eq!(run.params[PARAM_MODEL_NAME], "stub_model.json");
        assert_eq!(run.params["Brand"], "Honda");
        assert_eq!(run.params["Seller"], "Individual");
        assert_eq!(run.tags[TAG_SOURCE], "web_app");
        assert_eq!(run_count(&state), 1);
    }

    #[actix_web::test]
    async fn failed_inference_writes_no_run() {
        let dir = TempDir::new().unwrap();
        let state = state(
            &dir,
            Err(InferenceError::UnseenCategory {
                field: "Brand",
                value: "Ducati".to_string(),
            }),
            true,
        );
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post().uri("/api/predict").set_json(honda()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500);
        let body: Value = test::read_body_json(resp).await;

        assert_eq!(body["success"], false);
        let error = body["error"].as_str().unwrap();
        assert!(error.starts_with("Prediction failed:"), "{error}");
        assert!(error.contains("Ducati"), "{error}");
        assert_eq!(run_count(&state), 0);
    }

    #[actix_web::test]
    async fn tracking_failure_still_returns_the_prediction() {
        let dir = TempDir::new().unwrap();
        // no model file on disk, so the artifact copy fails
        let state = state(&dir, Ok(120000.0), false);
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post().uri("/api/predict").set_json(honda()).to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body: Value = test::read_body_json(resp).await;

        assert_eq!(body["data"]["price"], 120000.0);
        assert!(body["data"]["run_id"].is_null());
        let warning = body["data"]["tracking_warning"].as_str().unwrap();
        assert!(warning.starts_with("Prediction was not recorded"), "{warning}");
    }

    #[actix_web::test]
    async fn boundary_inputs_are_accepted() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Ok(1000.0), true);
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        for (capacity, year) in [(50, 0), (2000, 2025)] {
            let mut body = honda();
            body["Capacity"] = json!(capacity);
            body["Year"] = json!(year);
            let req = test::TestRequest::post().uri("/api/predict").set_json(body).to_request();
            let resp = test::call_service(&app, req).await;
            assert!(resp.status().is_success());
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["data"]["input"]["Capacity"], capacity);
            assert_eq!(body["data"]["input"]["Year"], year);
        }
        assert_eq!(run_count(&state), 2);
    }

    #[actix_web::test]
    async fn invalid_input_is_a_bad_request() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Ok(1000.0), true);
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let mut out_of_range = honda();
        out_of_range["Capacity"] = json!(2001);
        let mut missing = honda();
        missing.as_object_mut().unwrap().remove("Year");

        for body in [out_of_range, missing] {
            let req = test::TestRequest::post().uri("/api/predict").set_json(body).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 400);
            let body: Value = test::read_body_json(resp).await;
            assert!(body["error"].as_str().unwrap().starts_with("Invalid input"));
        }
        assert_eq!(run_count(&state), 0);
    }

    #[actix_web::test]
    async fn form_schema_lists_controls_and_defaults() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Ok(1000.0), true);
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/form").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let controls = body["data"]["controls"].as_array().unwrap();
        assert_eq!(controls.len(), 7);
        assert_eq!(body["data"]["defaults"]["Brand"], "Honda");
        assert_eq!(body["data"]["default_record"]["Seller"], "Dealer");
        assert_eq!(body["data"]["currency"], "LKR");
    }

    #[actix_web::test]
    async fn model_info_describes_the_loaded_artifact() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Ok(1000.0), true);
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/model-info").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["name"], "stub_model.json");
        assert_eq!(body["data"]["features"].as_array().unwrap().len(), 7);
    }

    #[actix_web::test]
    async fn fractional_integers_are_rejected_not_truncated() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Ok(1000.0), true);
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        for (field, value) in [("Capacity", json!(125.9)), ("Year", json!(2018.5))] {
            let mut body = honda();
            body[field] = value;
            let req = test::TestRequest::post().uri("/api/predict").set_json(body).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 400, "{field}");
        }
        assert_eq!(run_count(&state), 0);
    }

    #[actix_web::test]
    async fn page_blocks_invalid_entries_before_posting() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("stub_model.json");
        let adapter = InferenceAdapter::new(Arc::new(Stub(Ok(1000.0))), model_path.clone());
        let events =
            EventLogger::new(TrackingConfig::local(&dir.path().join("mlruns")), model_path).unwrap();
        let state = web::Data::new(AppState::new(
            adapter,
            events,
            concat!(env!("CARGO_MANIFEST_DIR"), "/static"),
        ));
        let app = test::init_service(App::new().app_data(state).route("/", web::get().to(index))).await;

        let req = test::TestRequest::get().uri("/").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let page = String::from_utf8(body.to_vec()).unwrap();

        assert!(page.contains("Predict Price"));
        assert!(page.contains("form.reportValidity()"));
        assert!(page.contains("Number.isInteger(value)"));
        assert!(!page.contains("parseInt("));
    }
}
