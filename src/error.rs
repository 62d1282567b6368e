use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rmcp::ErrorData as McpError;
use serde::Serialize;
use serde_json::Value;

pub type StudioResult<T> = Result<T, StudioError>;

/// Every failure a studio operation can surface to a caller.
///
/// The categories mirror what the UI distinguishes: credits, rate limits,
/// rejected input and everything else.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Conteúdo inadequado detectado. Por favor, remova referências a nudez do prompt.")]
    ContentBlocked { term: String },
    #[error("Usuário não autenticado")]
    Unauthorized,
    #[error("Créditos insuficientes. Adicione créditos em Settings -> Workspace -> Usage.")]
    PaymentRequired,
    #[error("Limite de requisições excedido. Tente novamente em alguns minutos.")]
    RateLimited { last_error: String },
    #[error("{last_error}")]
    GenerationFailed { attempts: usize, last_error: String },
    #[error("{0} não encontrado")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl StudioError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::ContentBlocked { .. } => "content_blocked",
            Self::Unauthorized => "unauthorized",
            Self::PaymentRequired => "payment_required",
            Self::RateLimited { .. } => "rate_limited",
            Self::GenerationFailed { .. } => "generation_failed",
            Self::NotFound(_) => "not_found",
            Self::Store(_) => "store",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::ContentBlocked { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::GenerationFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("json: {err}"))
    }
}

impl From<std::io::Error> for StudioError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(format!("io: {err}"))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

impl IntoResponse for StudioError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::RateLimited { last_error } = &self {
            tracing::warn!(kind = self.kind(), last_error = %last_error, "request rate limited");
        } else if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        } else {
            tracing::warn!(kind = self.kind(), error = %self, "request rejected");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StudioError> for McpError {
    fn from(err: StudioError) -> Self {
        let data = Some(Value::String(err.kind().to_string()));
        match err {
            StudioError::InvalidInput(_)
            | StudioError::ContentBlocked { .. }
            | StudioError::NotFound(_) => McpError::invalid_params(err.to_string(), data),
            _ => McpError::internal_error(err.to_string(), data),
        }
    }
}
