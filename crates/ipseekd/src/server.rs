//! HTTP trigger receiver
//!
//! `GET /update?group=<name>&address=<addr>` schedules an update of every
//! object in the group and answers before any object is touched.

use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use ipseek_core::{Dispatcher, Error};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Query parameters of `/update`
///
/// A repeated parameter keeps its first value; an empty value counts as
/// absent.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UpdateQuery {
    pub group: Option<String>,
    pub address: Option<String>,
}

impl UpdateQuery {
    /// Collect the parameters from decoded query pairs
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "group" => &mut query.group,
                "address" => &mut query.address,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query.group = query.group.filter(|g| !g.is_empty());
        query.address = query.address.filter(|a| !a.is_empty());
        query
    }
}

/// Build the trigger router around a shared dispatcher
///
/// Handlers read the peer address through `ConnectInfo`, so the router must
/// be served with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/update", get(update))
        .with_state(dispatcher)
}

async fn update(
    State(dispatcher): State<Arc<Dispatcher>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    uri: Uri,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    let query = match pairs {
        Ok(Query(pairs)) => UpdateQuery::from_pairs(pairs),
        Err(e) => {
            warn!("Unreadable query in {} ({}), received from {}", uri, e, remote);
            UpdateQuery::default()
        }
    };

    let Some(group_name) = query.group else {
        warn!("Update group is not specified in {}, received from {}", uri, remote);
        return (StatusCode::BAD_REQUEST, "Update group is not specified\n").into_response();
    };

    let Some(address) = query.address else {
        warn!("IP address is not specified in {}, received from {}", uri, remote);
        return (StatusCode::BAD_REQUEST, "IP address is not specified\n").into_response();
    };

    match dispatcher.trigger(&group_name, &address) {
        Ok(_) => {
            info!(
                group = %group_name,
                %remote,
                "Scheduling update of group \"{}\" with {}, received from {}",
                group_name, address, remote
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(Error::GroupNotFound(_)) => {
            warn!(
                "Update group \"{}\" is not found in {}, received from {}",
                group_name, uri, remote
            );
            (StatusCode::NOT_FOUND, "Update group is not found\n").into_response()
        }
        Err(e) => {
            error!("Failed to schedule {}, received from {}: {}", uri, remote, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
