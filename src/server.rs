use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection, Reply};

use crate::error::{ApiError, TrackerError};
use crate::feed::FeedSource;
use crate::geocode::Geocoder;
use crate::model::{LocationReport, NowReport};
use crate::tracker::Tracker;

pub const INTEGERS_MSG: &str = "Limit and offset must be integers";
pub const NON_NEGATIVE_MSG: &str = "Limit and offset must be non-negative integers";
pub const TOGETHER_MSG: &str = "Limit and offset must be provided together";
pub const EPOCH_ENCODING_MSG: &str = "Epoch is not valid UTF-8 once percent-decoded";

type Response = WithStatus<Json>;

pub struct TrackerServer<F, G> {
    tracker: Arc<Tracker<F, G>>,
}

impl<F, G> TrackerServer<F, G>
where
    F: FeedSource + 'static,
    G: Geocoder + 'static,
{
    pub fn new(tracker: Arc<Tracker<F, G>>) -> Self {
        Self { tracker }
    }

    /// Serves until `shutdown` resolves.
    pub async fn run(
        &self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), warp::Error> {
        let (bound, server) =
            warp::serve(routes(self.tracker.clone())).try_bind_with_graceful_shutdown(addr, shutdown)?;
        info!("Tracker API listening on {}", bound);
        server.await;
        Ok(())
    }
}

/// All API routes, with every failure rendered as `{"error": ...}`.
pub fn routes<F, G>(
    tracker: Arc<Tracker<F, G>>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone
where
    F: FeedSource + 'static,
    G: Geocoder + 'static,
{
    // 1. GET /epochs[?limit=&offset=]
    let epochs = warp::path!("epochs")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_tracker(tracker.clone()))
        .and_then(list_epochs::<F, G>);

    // 2. GET /epochs/{epoch}
    let state_vector = warp::path!("epochs" / String)
        .and(warp::get())
        .and(with_tracker(tracker.clone()))
        .and_then(get_state_vector::<F, G>);

    // 3. GET /epochs/{epoch}/speed
    let speed = warp::path!("epochs" / String / "speed")
        .and(warp::get())
        .and(with_tracker(tracker.clone()))
        .and_then(get_speed::<F, G>);

    // 4. GET /epochs/{epoch}/location
    let location = warp::path!("epochs" / String / "location")
        .and(warp::get())
        .and(with_tracker(tracker.clone()))
        .and_then(get_location::<F, G>);

    // 5. GET /now
    let now = warp::path!("now")
        .and(warp::get())
        .and(with_tracker(tracker.clone()))
        .and_then(get_now::<F, G>);

    // 6. GET /summary
    let summary = warp::path!("summary")
        .and(warp::get())
        .and(with_tracker(tracker))
        .and_then(get_summary::<F, G>);

    epochs
        .or(state_vector)
        .or(speed)
        .or(location)
        .or(now)
        .or(summary)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn with_tracker<F, G>(
    tracker: Arc<Tracker<F, G>>,
) -> impl Filter<Extract = (Arc<Tracker<F, G>>,), Error = Infallible> + Clone
where
    F: FeedSource + 'static,
    G: Geocoder + 'static,
{
    warp::any().map(move || tracker.clone())
}

/// `Ok(None)` when neither parameter is present.
pub fn parse_page(params: &HashMap<String, String>) -> Result<Option<(usize, usize)>, ApiError> {
    let parse = |value: &String| -> Result<i64, ApiError> {
        value.trim().parse::<i64>().map_err(|_| ApiError::bad_request(INTEGERS_MSG))
    };

    match (params.get("limit"), params.get("offset")) {
        (None, None) => Ok(None),
        (Some(limit), Some(offset)) => {
            let (limit, offset) = (parse(limit)?, parse(offset)?);
            match (usize::try_from(limit), usize::try_from(offset)) {
                (Ok(limit), Ok(offset)) => Ok(Some((limit, offset))),
                _ => Err(ApiError::bad_request(NON_NEGATIVE_MSG)),
            }
        }
        (Some(value), None) | (None, Some(value)) => {
            if parse(value)? < 0 {
                return Err(ApiError::bad_request(NON_NEGATIVE_MSG));
            }
            Err(ApiError::bad_request(TOGETHER_MSG))
        }
    }
}

/// Path segments arrive percent-encoded (`%3A` for `:`).
pub fn decode_epoch(raw: &str) -> Result<String, ApiError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|epoch| epoch.into_owned())
        .map_err(|_| ApiError::bad_request(EPOCH_ENCODING_MSG))
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> Response {
    match result {
        Ok(body) => warp::reply::with_status(warp::reply::json(&body), StatusCode::OK),
        Err(err) => error_reply(err),
    }
}

fn error_reply(err: ApiError) -> Response {
    if err.status.is_server_error() {
        error!(status = err.status.as_u16(), "request failed: {}", err.message);
    }
    warp::reply::with_status(warp::reply::json(&json!({ "error": err.message })), err.status)
}

// --- HANDLERS ---

async fn list_epochs<F: FeedSource, G: Geocoder>(
    params: HashMap<String, String>,
    tracker: Arc<Tracker<F, G>>,
) -> Result<Response, Infallible> {
    let result = match parse_page(&params) {
        Ok(Some((limit, offset))) => tracker.epochs_page(limit, offset).await.map_err(ApiError::from),
        Ok(None) => tracker.epochs().await.map_err(ApiError::from),
        Err(e) => Err(e),
    };
    Ok(respond(result))
}

async fn get_state_vector<F: FeedSource, G: Geocoder>(
    epoch: String,
    tracker: Arc<Tracker<F, G>>,
) -> Result<Response, Infallible> {
    let result = match decode_epoch(&epoch) {
        Ok(epoch) => tracker
            .state_vector(&epoch)
            .await
            .and_then(|found| found.ok_or(TrackerError::NotFound(epoch)))
            .map_err(ApiError::from),
        Err(e) => Err(e),
    };
    Ok(respond(result))
}

async fn get_speed<F: FeedSource, G: Geocoder>(
    epoch: String,
    tracker: Arc<Tracker<F, G>>,
) -> Result<Response, Infallible> {
    let result = match decode_epoch(&epoch) {
        Ok(epoch) => tracker
            .speed_at(&epoch)
            .await
            .and_then(|found| found.ok_or(TrackerError::NotFound(epoch)))
            .map_err(ApiError::from),
        Err(e) => Err(e),
    };
    Ok(respond(result))
}

async fn get_location<F: FeedSource, G: Geocoder>(
    epoch: String,
    tracker: Arc<Tracker<F, G>>,
) -> Result<Response, Infallible> {
    let result = match decode_epoch(&epoch) {
        Ok(epoch) => tracker
            .location_at(&epoch)
            .await
            .and_then(|found| found.ok_or(TrackerError::NotFound(epoch)))
            .map(LocationReport::from)
            .map_err(ApiError::from),
        Err(e) => Err(e),
    };
    Ok(respond(result))
}

async fn get_now<F: FeedSource, G: Geocoder>(tracker: Arc<Tracker<F, G>>) -> Result<Response, Infallible> {
    let result = tracker
        .now()
        .await
        .and_then(|found| found.ok_or(TrackerError::Empty))
        .map(NowReport::from);
    Ok(respond(result.map_err(ApiError::from)))
}

async fn get_summary<F: FeedSource, G: Geocoder>(tracker: Arc<Tracker<F, G>>) -> Result<Response, Infallible> {
    let result = tracker
        .summary()
        .await
        .and_then(|found| found.ok_or(TrackerError::NothingToSummarize));
    Ok(respond(result.map_err(ApiError::from)))
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let api = if err.is_not_found() {
        ApiError::new(StatusCode::NOT_FOUND, "Not Found")
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        ApiError::bad_request(e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    } else {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("unhandled rejection: {:?}", err))
    };
    Ok(error_reply(api))
}
