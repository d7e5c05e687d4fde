use super::error::*;
use super::handler;
use crate::application_port::AuthService;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let signup = warp::post()
        .and(warp::path("signup"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::signup);

    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::login);

    let refresh = warp::post()
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(with_verification(server.auth_service.clone()))
        .untuple_one()
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::logout);

    let create_conversation = warp::post()
        .and(warp::path("conversations"))
        .and(warp::path::end())
        .and(with_verification(server.auth_service.clone()))
        .untuple_one()
        .and(warp::body::json())
        .and(with(server.conversation_service.clone()))
        .and_then(handler::create_conversation);

    signup
        .or(login)
        .or(refresh)
        .or(logout)
        .or(create_conversation)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Bearer guard. Verification collapses every bad-token cause to one
/// undifferentiated unauthorized.
fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = ((),), Error = warp::Rejection> + Clone {
    warp::header::<String>(http::header::AUTHORIZATION.as_ref()).and_then(move |token: String| {
        let auth_service = auth_service.clone();
        async move {
            let Some(token) = token.strip_prefix("Bearer ") else {
                return Err(reject::custom(ApiErrorCode::unauthorized()));
            };
            let valid = auth_service
                .verify(token)
                .await
                .map_err(ApiErrorCode::from)
                .map_err(reject::custom)?;
            if valid {
                Ok(())
            } else {
                Err(reject::custom(ApiErrorCode::unauthorized()))
            }
        }
    })
}
