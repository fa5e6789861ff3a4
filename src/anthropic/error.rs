//! Erros do cliente da API Anthropic e sua classificação para o pipeline.
//!
//! [`AnthropicError`] descreve o que deu errado na chamada HTTP;
//! `From<AnthropicError> for GenerationError` decide se vale a pena
//! tentar de novo.

use thiserror::Error;

use crate::error::GenerationError;

/// Erros que podem ocorrer ao interagir com a API da Anthropic.
#[derive(Debug, Error)]
pub enum AnthropicError {
    /// O servidor retornou HTTP 429.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Qualquer outro status HTTP de erro, com o corpo da resposta.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Falha de rede ou de decodificação (DNS, conexão, timeout, JSON).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl From<AnthropicError> for GenerationError {
    /// 429 carrega o `retry-after` do servidor; 408, 5xx (incluindo 529
    /// "overloaded") e falhas de rede são transitórios; os demais 4xx indicam
    /// prompt ou credencial inválidos.
    fn from(err: AnthropicError) -> Self {
        match &err {
            AnthropicError::RateLimited { retry_after_ms } => GenerationError::Throttled {
                retry_after_ms: *retry_after_ms,
            },
            AnthropicError::NetworkError(_) => GenerationError::Retryable(err.to_string()),
            AnthropicError::ApiError { status, .. } if *status == 408 || *status >= 500 => {
                GenerationError::Retryable(err.to_string())
            }
            AnthropicError::ApiError { .. } => GenerationError::Fatal(err.to_string()),
        }
    }
}
