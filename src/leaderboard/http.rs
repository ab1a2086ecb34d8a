//! HTTP transport for the ranking service
//!
//! Requests run on a dedicated thread that owns a tokio runtime. The game loop
//! talks to it over unbounded channels and never blocks on the network.

use std::io;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::{LeaderboardEntry, LeaderboardError, ScoreSubmission};

/// `GET`/`POST` client for `<base>/scores`
pub struct HttpScoreService {
    client: Client<HttpConnector, Full<Bytes>>,
    scores_url: String,
    timeout: Duration,
}

impl HttpScoreService {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            scores_url: format!("{}/scores", base_url.trim_end_matches('/')),
            timeout,
        }
    }

    pub fn scores_url(&self) -> &str {
        &self.scores_url
    }

    /// Current ranking
    pub async fn fetch(&self) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.scores_url.as_str())
            .header("accept", "application/json")
            .body(Full::new(Bytes::new()))
            .map_err(|err| LeaderboardError::Request(err.to_string()))?;
        self.exchange(request).await
    }

    /// Submit a score; the service answers with the updated ranking
    pub async fn submit(
        &self,
        submission: &ScoreSubmission,
    ) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        let body = serde_json::to_vec(submission)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.scores_url.as_str())
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|err| LeaderboardError::Request(err.to_string()))?;
        self.exchange(request).await
    }

    async fn exchange(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        let round_trip = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|err| LeaderboardError::Transport(err.to_string()))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|err| LeaderboardError::Transport(err.to_string()))?
                .to_bytes();
            if status != StatusCode::OK {
                return Err(LeaderboardError::Status(status.as_u16()));
            }
            Ok(serde_json::from_slice::<Vec<LeaderboardEntry>>(&body)?)
        };

        match tokio::time::timeout(self.timeout, round_trip).await {
            Ok(result) => result,
            Err(_) => Err(LeaderboardError::Timeout(self.timeout)),
        }
    }
}

/// Work sent to the background thread
#[derive(Debug, Clone, PartialEq)]
pub enum LeaderboardRequest {
    Fetch,
    Submit(ScoreSubmission),
}

/// Outcome of one request
#[derive(Debug)]
pub enum LeaderboardReply {
    Fetched(Result<Vec<LeaderboardEntry>, LeaderboardError>),
    Submitted(Result<Vec<LeaderboardEntry>, LeaderboardError>),
}

impl LeaderboardReply {
    pub fn into_result(self) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        match self {
            LeaderboardReply::Fetched(result) | LeaderboardReply::Submitted(result) => result,
        }
    }
}

/// Handle to the background request thread. Dropping it stops the thread
/// once in-flight work finishes.
pub struct LeaderboardWorker {
    tx: mpsc::UnboundedSender<LeaderboardRequest>,
    rx: mpsc::UnboundedReceiver<LeaderboardReply>,
}

impl LeaderboardWorker {
    pub fn spawn(base_url: &str, timeout: Duration) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (tx, mut requests) = mpsc::unbounded_channel::<LeaderboardRequest>();
        let (replies, rx) = mpsc::unbounded_channel::<LeaderboardReply>();
        let base_url = base_url.to_string();

        thread::Builder::new()
            .name("leaderboard".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let service = HttpScoreService::new(&base_url, timeout);
                    log::debug!("Leaderboard worker serving {}", service.scores_url());
                    while let Some(request) = requests.recv().await {
                        let reply = match request {
                            LeaderboardRequest::Fetch => {
                                LeaderboardReply::Fetched(service.fetch().await)
                            }
                            LeaderboardRequest::Submit(submission) => {
                                LeaderboardReply::Submitted(service.submit(&submission).await)
                            }
                        };
                        if replies.send(reply).is_err() {
                            break;
                        }
                    }
                    log::debug!("Leaderboard worker stopped");
                });
            })?;

        Ok(Self { tx, rx })
    }

    pub fn send(&self, request: LeaderboardRequest) -> Result<(), LeaderboardError> {
        self.tx
            .send(request)
            .map_err(|_| LeaderboardError::WorkerGone)
    }

    /// Non-blocking poll for a finished request
    pub fn try_recv(&mut self) -> Result<Option<LeaderboardReply>, LeaderboardError> {
        match self.rx.try_recv() {
            Ok(reply) => Ok(Some(reply)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LeaderboardError::WorkerGone),
        }
    }

    /// Block until the next reply. Must not be called from async code.
    pub fn recv_blocking(&mut self) -> Result<LeaderboardReply, LeaderboardError> {
        self.rx.blocking_recv().ok_or(LeaderboardError::WorkerGone)
    }
}
