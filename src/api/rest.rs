use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, info_span, Instrument};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Reply};

use crate::config::Config;
use crate::error::{ChartError, ChartResult};
use crate::model::{ChartRequest, ValidatedRequest};
use crate::render::document::{generate_pdf, parse_page_query, ChartPdf};

/// Request bodies larger than this are refused before parsing.
const BODY_LIMIT: u64 = 50 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct RunningResponse {
    pub running: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime: f64,
}

pub struct RestApi {
    config: Arc<Config>,
    started: Instant,
}

impl RestApi {
    pub fn new(config: Arc<Config>) -> Self {
        RestApi {
            config,
            started: Instant::now(),
        }
    }

    pub fn routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        self.running()
            .or(self.healthcheck())
            .or(self.send_pdf())
            .or(self.sample_send_pdf())
    }

    fn running(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path!("running")
            .and(warp::get())
            .map(|| warp::reply::json(&RunningResponse { running: true }))
    }

    fn healthcheck(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let started = self.started;

        warp::path!("healthcheck")
            .and(warp::get())
            .map(move || {
                warp::reply::json(&HealthResponse {
                    status: "ok".to_string(),
                    uptime: started.elapsed().as_secs_f64(),
                })
            })
    }

    fn send_pdf(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let config = Arc::clone(&self.config);

        warp::path!("dhos" / "v1" / "send_pdf")
            .and(warp::post())
            .and(warp::header::optional::<String>("x-request-id"))
            .and(warp::body::content_length_limit(BODY_LIMIT))
            .and(warp::body::bytes())
            .and_then(move |request_id: Option<String>, body: Bytes| {
                let config = Arc::clone(&config);
                let span = info_span!("send_pdf", request_id = request_id.as_deref().unwrap_or("-"));
                async move {
                    let started = Instant::now();
                    info!("Starting PDF generation");
                    let result = match parse_request(&body) {
                        Ok(request) => generate_pdf(&config, &request, Utc::now()).await,
                        Err(err) => Err(err),
                    };
                    let response = pdf_response(result);
                    info!(
                        status = response.status().as_u16(),
                        latency = started.elapsed().as_secs_f64(),
                        "/dhos/v1/send_pdf endpoint hit"
                    );
                    Ok::<Response, Infallible>(response)
                }
                .instrument(span)
            })
    }

    /// Development endpoint rendering the sample request, e.g. `?page=3:5&trust=ouh`.
    fn sample_send_pdf(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let config = Arc::clone(&self.config);

        warp::path!("dhos" / "v1" / "sample_send_pdf")
            .and(warp::get())
            .and(warp::header::optional::<String>("x-request-id"))
            .and(warp::query::<HashMap<String, String>>())
            .and_then(move |request_id: Option<String>, params: HashMap<String, String>| {
                let config = Arc::clone(&config);
                let span = info_span!("sample_send_pdf", request_id = request_id.as_deref().unwrap_or("-"));
                async move {
                    info!("Starting sample PDF generation");
                    let trust = params.get("trust").map(String::as_str);
                    let result = match load_sample(&config, trust).await {
                        Ok(mut request) => {
                            request.pages = params.get("page").map(|page| parse_page_query(page));
                            match request.validate() {
                                Ok(request) => {
                                    generate_pdf(&config, &request, Utc::now()).await
                                }
                                Err(err) => Err(err),
                            }
                        }
                        Err(err) => Err(err),
                    };
                    Ok::<Response, Infallible>(pdf_response(result))
                }
                .instrument(span)
            })
    }
}

/// Bad JSON and missing top-level members are both the caller's fault.
pub fn parse_request(body: &[u8]) -> ChartResult<ValidatedRequest> {
    let request: ChartRequest = serde_json::from_slice(body)
        .map_err(|err| ChartError::RequestValidation(err.to_string()))?;
    request.validate()
}

async fn read_json<T: serde::de::DeserializeOwned>(path: std::path::PathBuf) -> ChartResult<T> {
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ChartError::ResourceLoad { path, source })?;
    Ok(serde_json::from_str(&text)?)
}

/// Assemble the sample request from the files in the sample directory.
pub async fn load_sample(config: &Config, trust: Option<&str>) -> ChartResult<ChartRequest> {
    let dir = &config.paths.sample_dir;
    let trustomer_file = match trust {
        Some("ouh") => "sample_trustomer_ouh.json",
        _ => "sample_trustomer.json",
    };
    debug!(dir = %dir.display(), trustomer_file, "loading sample request");
    Ok(ChartRequest {
        patient: Some(read_json(dir.join("sample_patient.json")).await?),
        encounter: Some(read_json(dir.join("sample_encounter.json")).await?),
        observation_sets: Some(read_json(dir.join("sample_observations.json")).await?),
        location: Some(read_json(dir.join("sample_location.json")).await?),
        trustomer: Some(read_json(dir.join(trustomer_file)).await?),
        pages: None,
    })
}

fn pdf_response(result: ChartResult<ChartPdf>) -> Response {
    match result {
        Ok(pdf) => {
            info!(filename = %pdf.filename, "Completed PDF generation");
            let disposition = format!("inline; filename=\"{}\"", pdf.filename);
            let reply = warp::reply::with_header(pdf.bytes, "Content-type", "application/pdf");
            warp::reply::with_header(reply, "Content-disposition", disposition).into_response()
        }
        Err(err) if err.is_bad_request() => {
            info!("rejected request: {}", err);
            StatusCode::BAD_REQUEST.into_response()
        }
        Err(err) => {
            error!("{}", err);
            warp::reply::with_status("PDF generation failed", StatusCode::INTERNAL_SERVER_ERROR)
                .into_response()
        }
    }
}
