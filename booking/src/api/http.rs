//! `reqwest` implementation of [`BookingApi`].

use super::{BookingApi, BookingRequest, PaymentRequest, SeatLockRequest};
use crate::error::ApiError;
use crate::types::{
    BookingConfirmation, PaymentReceipt, Seat, SeatCode, SeatLease, Showtime, ShowtimeId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Error body the backend sends with non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Lock reply; older backends answer with an empty body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockResponse {
    #[serde(default)]
    seats: Option<Vec<SeatCode>>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// REST client for the cinema backend
#[derive(Clone, Debug)]
pub struct HttpBookingApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBookingApi {
    /// Create a client for `base_url` (e.g. `https://api.example.com/api`)
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the HTTP client cannot be built
    /// (for example when no TLS backend is available).
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// The base URL requests are resolved against
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        tracing::debug!(path, "Calling booking API");
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty());

        tracing::warn!(path, status = status.as_u16(), ?message, "Booking API refused request");

        Err(match status {
            StatusCode::NOT_FOUND => {
                ApiError::NotFound(message.unwrap_or_else(|| path.to_string()))
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized,
            status => ApiError::Rejected {
                status: status.as_u16(),
                message: message.unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                }),
            },
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(path, self.client.get(self.url(path))).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: serde::Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(path, self.client.post(self.url(path)).json(body))
            .await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl BookingApi for HttpBookingApi {
    async fn showtime(&self, id: ShowtimeId) -> Result<Showtime, ApiError> {
        self.get_json(&format!("/showtimes/{id}")).await
    }

    async fn seats(&self, showtime_id: ShowtimeId) -> Result<Vec<Seat>, ApiError> {
        self.get_json(&format!("/showtimes/{showtime_id}/seats")).await
    }

    async fn lock_seats(
        &self,
        showtime_id: ShowtimeId,
        seats: &[SeatCode],
    ) -> Result<SeatLease, ApiError> {
        let path = "/seats/lock";
        let body = SeatLockRequest {
            showtime_id,
            seats: seats.to_vec(),
        };
        let response = self
            .send(path, self.client.post(self.url(path)).json(&body))
            .await?;
        let text = response.text().await?;

        let reply = if text.trim().is_empty() {
            LockResponse::default()
        } else {
            serde_json::from_str::<LockResponse>(&text)
                .map_err(|e| ApiError::Decode(e.to_string()))?
        };

        Ok(SeatLease {
            seats: reply.seats.unwrap_or(body.seats),
            expires_at: reply.expires_at,
        })
    }

    async fn unlock_seats(
        &self,
        showtime_id: ShowtimeId,
        seats: &[SeatCode],
    ) -> Result<(), ApiError> {
        let path = "/seats/unlock";
        let body = SeatLockRequest {
            showtime_id,
            seats: seats.to_vec(),
        };
        self.send(path, self.client.post(self.url(path)).json(&body))
            .await
            .map(|_| ())
    }

    async fn process_payment(&self, request: &PaymentRequest) -> Result<PaymentReceipt, ApiError> {
        self.post_json("/payments", request).await
    }

    async fn create_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingConfirmation, ApiError> {
        self.post_json("/bookings", request).await
    }
}
