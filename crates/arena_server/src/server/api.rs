//! HTTP endpoints under `/api`.

use super::AppState;
use crate::body::read_json;
use crate::config::SiteInfoConfig;
use crate::error::BodyError;
use crate::matchmaking::{select_game, MatchTicket};
use crate::pool::SlotId;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfo {
    pub modes: Vec<GameMode>,
    pub pops: Pops,
    pub youtube: Youtube,
    pub twitch: Vec<TwitchStream>,
    pub prompt_consent: bool,
    pub country: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameMode {
    pub map_name: String,
    pub team_mode: u8,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Pops {
    pub local: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Youtube {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TwitchStream {
    pub name: String,
    pub viewers: u32,
    pub url: String,
    pub img: String,
}

impl SiteInfo {
    fn new(site: &SiteInfoConfig, players: usize) -> Self {
        Self {
            modes: site
                .modes
                .iter()
                .map(|mode| GameMode {
                    map_name: mode.map_name.clone(),
                    team_mode: mode.team_mode,
                })
                .collect(),
            pops: Pops {
                local: format!("{players} players"),
            },
            youtube: Youtube {
                name: site.youtube.name.clone(),
                link: site.youtube.link.clone(),
            },
            twitch: site
                .twitch
                .iter()
                .map(|stream| TwitchStream {
                    name: stream.name.clone(),
                    viewers: stream.viewers,
                    url: stream.url.clone(),
                    img: stream.img.clone(),
                })
                .collect(),
            prompt_consent: site.prompt_consent,
            country: site.country.clone(),
        }
    }
}

/// `GET /api/site_info`
pub async fn site_info(State(state): State<AppState>) -> Json<SiteInfo> {
    let players = state.pool.lock().await.player_count();
    Json(SiteInfo::new(&state.site, players))
}

/// `POST /api/user/profile` and `POST /api/user/get_pass`
///
/// Accounts live elsewhere; these only keep old clients happy.
pub async fn user_stub() -> Json<serde_json::Value> {
    Json(json!({ "err": "" }))
}

#[derive(Debug, Deserialize)]
pub struct FindGameRequest {
    pub region: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FindGameResponse {
    pub res: Vec<FindGameEntry>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FindGameEntry {
    Match {
        zone: String,
        #[serde(rename = "gameId")]
        game_id: SlotId,
        #[serde(rename = "useHttps")]
        use_https: bool,
        hosts: Vec<String>,
        addrs: Vec<String>,
        data: String,
    },
    Error {
        err: String,
    },
}

impl From<MatchTicket> for FindGameEntry {
    fn from(ticket: MatchTicket) -> Self {
        FindGameEntry::Match {
            zone: ticket.zone,
            game_id: ticket.game_id,
            use_https: ticket.region.https,
            hosts: vec![ticket.region.address.clone()],
            addrs: vec![ticket.region.address],
            data: ticket.game_id.to_string(),
        }
    }
}

/// `POST /api/find_game`
pub async fn find_game(State(state): State<AppState>, body: Body) -> Response {
    let request: FindGameRequest =
        match read_json(body.into_data_stream(), state.max_body_bytes).await {
            Ok(request) => request,
            Err(e) => return reject_body(e),
        };

    let entry = {
        let mut pool = state.pool.lock().await;
        match select_game(&mut pool, &state.regions, request.region.as_deref()) {
            Ok(ticket) => {
                debug!(game = ticket.game_id, zone = %ticket.zone, "matched player");
                FindGameEntry::from(ticket)
            }
            Err(e) => FindGameEntry::Error { err: e.to_string() },
        }
    };

    Json(FindGameResponse { res: vec![entry] }).into_response()
}

/// Ends a request whose body could not be used and drops its connection.
fn reject_body(error: BodyError) -> Response {
    match &error {
        BodyError::Aborted(_) => debug!(error = %error, "find_game request aborted"),
        _ => warn!(error = %error, "find_game request body rejected"),
    }
    (
        StatusCode::BAD_REQUEST,
        [(header::CONNECTION, "close")],
    )
        .into_response()
}
