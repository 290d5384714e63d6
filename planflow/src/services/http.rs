//! Reqwest-backed clients for the generation backend.
//!
//! The stream client adapts a chunked SSE response body into the typed
//! [`EventStream`] the ingestor consumes; malformed frames are logged and
//! skipped without tearing the stream down.

use super::{
    EventStream, ImageGenerationService, ImageRequest, ImageResponse, PlanStreamService,
    RecipeDetailRequest, RecipeDetailService, WeekStreamRequest,
};
use crate::errors::PlanError;
use crate::model::DetailedRecipe;
use crate::stream::{ErrorEvent, SseFrame, SseParser, StreamEvent};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::warn;

/// Base URLs for the backend services.
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    base_url: String,
}

impl ServiceEndpoints {
    /// Creates endpoints rooted at the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    fn week_stream(&self) -> String {
        format!("{}/meal-plans/generate/stream", self.base_url)
    }

    fn recipe_details(&self) -> String {
        format!("{}/recipes/generate-details", self.base_url)
    }

    fn recipe_image(&self) -> String {
        format!("{}/recipes/generate-image", self.base_url)
    }
}

/// Opens week generation streams over HTTP and decodes their SSE bodies.
#[derive(Debug, Clone)]
pub struct HttpPlanStreamClient {
    client: Client,
    endpoints: ServiceEndpoints,
}

impl HttpPlanStreamClient {
    /// Creates a client with a default connection pool.
    #[must_use]
    pub fn new(endpoints: ServiceEndpoints) -> Self {
        Self {
            client: Client::new(),
            endpoints,
        }
    }

    /// Uses a preconfigured reqwest client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl PlanStreamService for HttpPlanStreamClient {
    async fn open_week_stream(
        &self,
        request: &WeekStreamRequest,
    ) -> Result<EventStream, PlanError> {
        let week = request.week_number;
        let response = self
            .client
            .post(self.endpoints.week_stream())
            .json(request)
            .send()
            .await
            .map_err(|err| PlanError::stream(week, err.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::PAYMENT_REQUIRED => {
                return Err(PlanError::quota_exceeded("plan_stream"));
            }
            status => {
                return Err(PlanError::stream(week, format!("http status {status}")));
            }
        }

        Ok(decode_sse_body(response.bytes_stream(), week))
    }
}

struct SseDecodeState<S> {
    body: S,
    parser: SseParser,
    ready: VecDeque<StreamEvent>,
    done: bool,
}

/// Adapts a chunked response body into typed stream events.
///
/// Chunk boundaries are arbitrary relative to SSE frames; the incremental
/// parser reassembles them. A transport error ends the stream with a typed
/// error event so the ingestor fails the week rather than treating it as
/// truncation.
fn decode_sse_body<S, B, E>(body: S, week: u32) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    let state = SseDecodeState {
        body,
        parser: SseParser::new(),
        ready: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, move |mut state| async move {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((event, state));
            }
            if state.done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let text = String::from_utf8_lossy(chunk.as_ref()).into_owned();
                    for frame in state.parser.feed(&text) {
                        push_frame(&mut state.ready, &frame, week);
                    }
                }
                Some(Err(err)) => {
                    state.done = true;
                    state.ready.push_back(StreamEvent::Error(ErrorEvent {
                        message: err.to_string(),
                        code: None,
                    }));
                }
                None => {
                    state.done = true;
                    if let Some(frame) = state.parser.finish() {
                        push_frame(&mut state.ready, &frame, week);
                    }
                }
            }
        }
    })
    .boxed()
}

fn push_frame(ready: &mut VecDeque<StreamEvent>, frame: &SseFrame, week: u32) {
    match StreamEvent::from_frame(&frame.event, &frame.data) {
        Ok(Some(event)) => ready.push_back(event),
        Ok(None) => {}
        Err(err) => {
            warn!(week, event = %frame.event, error = %err, "malformed stream frame skipped");
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecipeDetailResponse {
    recipe: DetailedRecipe,
}

/// Requests detailed recipes over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRecipeDetailClient {
    client: Client,
    endpoints: ServiceEndpoints,
}

impl HttpRecipeDetailClient {
    /// Creates a client with a default connection pool.
    #[must_use]
    pub fn new(endpoints: ServiceEndpoints) -> Self {
        Self {
            client: Client::new(),
            endpoints,
        }
    }

    /// Uses a preconfigured reqwest client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl RecipeDetailService for HttpRecipeDetailClient {
    async fn generate_recipe(
        &self,
        request: &RecipeDetailRequest,
    ) -> Result<DetailedRecipe, PlanError> {
        let response = self
            .client
            .post(self.endpoints.recipe_details())
            .json(request)
            .send()
            .await
            .map_err(|err| PlanError::enrichment(request.meal_id, err.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::PAYMENT_REQUIRED => {
                return Err(PlanError::quota_exceeded("recipe_detail"));
            }
            status => {
                return Err(PlanError::enrichment(
                    request.meal_id,
                    format!("http status {status}"),
                ));
            }
        }

        let body: RecipeDetailResponse = response
            .json()
            .await
            .map_err(|err| PlanError::enrichment(request.meal_id, err.to_string()))?;
        Ok(body.recipe)
    }
}

/// Requests recipe images over HTTP.
#[derive(Debug, Clone)]
pub struct HttpImageClient {
    client: Client,
    endpoints: ServiceEndpoints,
}

impl HttpImageClient {
    /// Creates a client with a default connection pool.
    #[must_use]
    pub fn new(endpoints: ServiceEndpoints) -> Self {
        Self {
            client: Client::new(),
            endpoints,
        }
    }

    /// Uses a preconfigured reqwest client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl ImageGenerationService for HttpImageClient {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse, PlanError> {
        let response = self
            .client
            .post(self.endpoints.recipe_image())
            .json(request)
            .send()
            .await
            .map_err(|err| PlanError::enrichment(request.recipe_id, err.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::PAYMENT_REQUIRED => {
                return Err(PlanError::quota_exceeded("image_generation"));
            }
            status => {
                return Err(PlanError::enrichment(
                    request.recipe_id,
                    format!("http status {status}"),
                ));
            }
        }

        response
            .json()
            .await
            .map_err(|err| PlanError::enrichment(request.recipe_id, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn chunked(chunks: Vec<&'static str>) -> EventStream {
        let body = futures::stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<_, Infallible>(chunk.as_bytes())),
        );
        decode_sse_body(body.boxed(), 1)
    }

    #[test]
    fn test_endpoints_trim_trailing_slash() {
        let endpoints = ServiceEndpoints::new("https://api.test/");
        assert_eq!(
            endpoints.week_stream(),
            "https://api.test/meal-plans/generate/stream"
        );
        assert_eq!(
            endpoints.recipe_image(),
            "https://api.test/recipes/generate-image"
        );
    }

    #[tokio::test]
    async fn test_decode_frames_across_chunk_boundaries() {
        let events: Vec<_> = chunked(vec![
            "event: day\ndata: {\"date\": \"2025-0",
            "6-02\", \"breakfast\": {\"name\": \"Oats\"}}\n\nevent: compl",
            "ete\ndata: {}\n\n",
        ])
        .collect()
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StreamEvent::Day(_)));
        assert!(matches!(events[1], StreamEvent::Complete(_)));
    }

    #[tokio::test]
    async fn test_decode_skips_malformed_frames() {
        let events: Vec<_> = chunked(vec![
            "event: day\ndata: {not json\n\nevent: heartbeat\ndata:\n\n",
        ])
        .collect()
        .await;

        assert_eq!(events, vec![StreamEvent::Heartbeat]);
    }

    #[tokio::test]
    async fn test_decode_flushes_trailing_frame() {
        let events: Vec<_> = chunked(vec!["event: complete\ndata: {\"summary\": \"ok\"}\n"])
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Complete(_)));
    }
}
