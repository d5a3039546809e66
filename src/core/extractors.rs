//! Axum extractor for validated request bodies
//!
//! `Validated<T>` deserializes a JSON body into `T` and runs its
//! `validator` rules before the handler sees it.
//!
//! ```rust,ignore
//! pub async fn create_event(
//!     auth: AuthContext,
//!     Validated(payload): Validated<EventCreate>,
//! ) -> ManagerResult<Json<Event>> {
//!     // payload passed every range and format check
//! }
//! ```

use crate::core::error::{ManagerError, ValidationError};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON body that deserialized and passed validation
#[derive(Debug, Clone)]
pub struct Validated<T>(pub T);

impl<T> Validated<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Validated<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequest<S> for Validated<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ManagerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(payload) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_to_error)?;

        payload.validate()?;
        Ok(Validated(payload))
    }
}

/// Map a JSON body rejection: malformed JSON is 400, a shape mismatch 422
pub fn rejection_to_error(rejection: JsonRejection) -> ManagerError {
    match rejection {
        // Well-formed JSON that does not fit the payload type
        JsonRejection::JsonDataError(e) => ManagerError::Validation(ValidationError::FieldError {
            field: "body".to_string(),
            message: e.body_text(),
        }),
        other => ManagerError::Validation(ValidationError::InvalidJson {
            message: other.body_text(),
        }),
    }
}
