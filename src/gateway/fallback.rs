//! Sequential model fallback: try each model identifier once, in order.

use std::fmt;
use std::future::Future;

use tracing::{info, warn};

use crate::error::StudioError;

const PAYMENT_REQUIRED: u16 = 402;
const TOO_MANY_REQUESTS: u16 = 429;

/// Why a single attempt against one model did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    Status { status: u16, message: Option<String> },
    MissingPayload(String),
    Transport(String),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status {
                status,
                message: Some(message),
            } => write!(f, "Erro da API: {status} ({message})"),
            Self::Status {
                status,
                message: None,
            } => write!(f, "Erro da API: {status}"),
            Self::MissingPayload(reason) => f.write_str(reason),
            Self::Transport(reason) => write!(f, "falha de conexão com o gateway: {reason}"),
        }
    }
}

impl AttemptFailure {
    fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Success<T> {
    pub model: String,
    pub value: T,
}

/// Runs `attempt` against each model until one succeeds.
///
/// Every failure, 402 and 429 included, moves on to the next model. When the
/// list runs out, a 402 seen on any attempt surfaces as
/// [`StudioError::PaymentRequired`], a trailing 429 as
/// [`StudioError::RateLimited`], and anything else as
/// [`StudioError::GenerationFailed`]. The last reason is carried along.
pub async fn run_with_fallback<T, F, Fut>(
    models: &[String],
    mut attempt: F,
) -> Result<Success<T>, StudioError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, AttemptFailure>>,
{
    if models.is_empty() {
        return Err(StudioError::Config("no model identifiers configured".into()));
    }

    let mut last_failure: Option<AttemptFailure> = None;
    let mut payment_required = false;
    for (index, model) in models.iter().enumerate() {
        info!(model = %model, attempt = index + 1, "trying model");
        match attempt(model.clone()).await {
            Ok(value) => {
                info!(model = %model, "model succeeded");
                return Ok(Success {
                    model: model.clone(),
                    value,
                });
            }
            Err(failure) => {
                warn!(model = %model, error = %failure, "model attempt failed");
                payment_required |= failure.status() == Some(PAYMENT_REQUIRED);
                last_failure = Some(failure);
            }
        }
    }

    match last_failure {
        Some(failure) if payment_required => {
            warn!(last_error = %failure, "credits exhausted on at least one model");
            Err(StudioError::PaymentRequired)
        }
        Some(failure) if failure.status() == Some(TOO_MANY_REQUESTS) => {
            Err(StudioError::RateLimited {
                last_error: failure.to_string(),
            })
        }
        Some(failure) => Err(StudioError::GenerationFailed {
            attempts: models.len(),
            last_error: failure.to_string(),
        }),
        None => Err(StudioError::Internal("fallback ended without an attempt".into())),
    }
}
