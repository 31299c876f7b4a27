mod profile;

use dotenv::dotenv;
use env_logger::Builder;
use lazy_static::lazy_static;
use log::LevelFilter;
use profile::directory::{Comparison, Directory};
use profile::{Profile, ProfileForm};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::error::Error;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

#[macro_use]
extern crate log;

lazy_static! {
    static ref MATCH_PORT: u16 = std::env::var("MATCH_PORT")
        .ok()
        .and_then(|port| port.parse::<u16>().ok())
        .unwrap_or(8080);
    static ref STORAGE_DIR: String =
        std::env::var("STORAGE_DIR").unwrap_or_else(|_| "./storage".to_string());
}

#[derive(Deserialize, Serialize)]
struct ProfileQuery {
    username: String,
}

#[derive(Deserialize, Serialize)]
struct CompareRequest {
    a: String,
    b: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // read .env
    dotenv().ok();

    // init logger
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    if log_level == "debug" {
        Builder::new()
            .filter(None, LevelFilter::Off)
            .filter(Some("friendmatch::profile"), LevelFilter::Debug)
            .filter(Some("friendmatch"), LevelFilter::Debug)
            .init();
    } else if log_level == "info" {
        Builder::new()
            .filter(None, LevelFilter::Off)
            .filter(Some("friendmatch::profile"), LevelFilter::Info)
            .filter(Some("friendmatch"), LevelFilter::Info)
            .init();
    } else {
        env_logger::init();
    }

    let directory = Arc::new(Directory::new(STORAGE_DIR.as_str()).await?);
    info!("storage opened at: {}", *STORAGE_DIR);

    info!("server running at port: {}", *MATCH_PORT);
    warp::serve(routes(directory))
        .run(([0, 0, 0, 0], *MATCH_PORT))
        .await;

    Ok(())
}

fn routes(
    directory: Arc<Directory>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let index_route = warp::path::end().and(warp::get()).and_then(index);

    let upsert_route = warp::path("profile")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_directory(Arc::clone(&directory)))
        .and_then(handle_upsert);

    let form_route = warp::path!("profile" / "form")
        .and(warp::post())
        .and(warp::body::form())
        .and(with_directory(Arc::clone(&directory)))
        .and_then(handle_form);

    let profile_route = warp::path("profile")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<ProfileQuery>())
        .and(with_directory(Arc::clone(&directory)))
        .and_then(handle_get_profile);

    let compare_route = warp::path("compare")
        .and(warp::get())
        .and(warp::query::<CompareRequest>())
        .and(with_directory(Arc::clone(&directory)))
        .and_then(handle_compare);

    let get_list_route = warp::path("profiles")
        .and(warp::get())
        .and(with_directory(directory))
        .and_then(handle_get_list);

    index_route
        .or(upsert_route)
        .or(form_route)
        .or(profile_route)
        .or(compare_route)
        .or(get_list_route)
}

fn with_directory(
    directory: Arc<Directory>,
) -> impl Filter<Extract = (Arc<Directory>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&directory))
}

fn error_reply(message: impl Into<String>, status: StatusCode) -> Response {
    let body = json!({ "error": message.into() });
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

async fn index() -> Result<impl Reply, Rejection> {
    let index_html = include_str!("../index.html");
    Ok(warp::reply::html(index_html))
}

async fn handle_upsert(profile: Profile, directory: Arc<Directory>) -> Result<Response, Infallible> {
    info!("get upsert request: {:?}", profile.username);
    if let Err(e) = profile.validate() {
        return Ok(error_reply(e.to_string(), StatusCode::BAD_REQUEST));
    }

    let username = profile.username.clone();
    match directory.upsert(profile).await {
        Ok(_) => Ok(warp::reply::json(&json!({ "username": username })).into_response()),
        Err(e) => {
            error!("upsert {} failed: {}", username, e);
            Ok(error_reply("save profile failed", StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

async fn handle_form(form: ProfileForm, directory: Arc<Directory>) -> Result<Response, Infallible> {
    let profile = Profile::from(form);
    info!("get form request: {:?}", profile.username);
    if profile.validate().is_err() {
        let reply = warp::reply::html("Username is required");
        return Ok(warp::reply::with_status(reply, StatusCode::BAD_REQUEST).into_response());
    }

    let username = profile.username.clone();
    match directory.upsert(profile).await {
        Ok(_) => Ok(warp::reply::html("Profile saved successfully!").into_response()),
        Err(e) => {
            error!("upsert {} failed: {}", username, e);
            let reply = warp::reply::html("Save profile failed");
            Ok(warp::reply::with_status(reply, StatusCode::INTERNAL_SERVER_ERROR).into_response())
        }
    }
}

async fn handle_get_profile(
    query: ProfileQuery,
    directory: Arc<Directory>,
) -> Result<Response, Infallible> {
    info!("get profile request: {:?}", query.username);
    match directory.get(&query.username).await {
        Ok(Some(profile)) => {
            debug!("found profile: {}", profile);
            Ok(warp::reply::json(&profile).into_response())
        }
        Ok(None) => Ok(error_reply("profile not found", StatusCode::NOT_FOUND)),
        Err(e) => {
            warn!("load {} failed: {}", query.username, e);
            Ok(error_reply("load profile failed", StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

async fn handle_compare(
    request: CompareRequest,
    directory: Arc<Directory>,
) -> Result<Response, Infallible> {
    info!("get compare request: {:?} with {:?}", request.a, request.b);
    match directory.compare(&request.a, &request.b).await {
        Ok(Comparison::Matched(matched)) => {
            info!("compare {} with {} overall: {}", request.a, request.b, matched.overall);
            Ok(warp::reply::json(&matched).into_response())
        }
        Ok(Comparison::Missing(missing)) => {
            let body = json!({ "error": "one or both profiles not found", "missing": missing });
            Ok(warp::reply::with_status(warp::reply::json(&body), StatusCode::NOT_FOUND).into_response())
        }
        Err(e) => {
            warn!("compare {} with {} failed: {}", request.a, request.b, e);
            Ok(error_reply("compare profiles failed", StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

async fn handle_get_list(directory: Arc<Directory>) -> Result<impl Reply, Rejection> {
    let list = directory.get_list().await;
    info!("get get_list request return: {:?}", list);
    Ok(warp::reply::json(&list))
}
