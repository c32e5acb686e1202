//! Tipos de erro para o cliente do serviço de geração de diagramas.
//!
//! Define [`GeneratorError`] com variantes para erros da API, timeout e
//! falhas de rede. Usa `thiserror` para derivar `Display` e `Error`
//! automaticamente a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao chamar o serviço de geração.
///
/// A classificação importa para o retry: somente falhas da classe timeout
/// ([`is_timeout`](GeneratorError::is_timeout)) são retentadas — um erro
/// lógico do serviço falharia de novo com a mesma entrada.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Erro retornado pela API (ex.: 422 requisito inválido, 500 erro interno).
    /// Contém o código de status HTTP e a mensagem do corpo da resposta.
    #[error("generator API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// A requisição excedeu o limite de tempo do cliente HTTP.
    #[error("generation request timed out")]
    Timeout,

    /// Falha de rede subjacente (DNS, conexão recusada).
    /// Encapsula o erro original do `reqwest` via `#[from]`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// O corpo da resposta não pôde ser interpretado.
    #[error("failed to parse generator response: {0}")]
    Parse(String),
}

impl GeneratorError {
    /// Whether this failure is timeout-class and therefore retryable.
    pub fn is_timeout(&self) -> bool {
        match self {
            GeneratorError::Timeout => true,
            GeneratorError::Network(e) => e.is_timeout(),
            _ => false,
        }
    }
}
