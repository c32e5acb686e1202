//! Configuração do TRACO carregada a partir de `traco.toml`.
//!
//! A struct [`TracoConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis — os defaults de
//! retry/timeout devem casar com os deployments existentes e não podem mudar.
//! A variável de ambiente `TRACO_API_KEY` tem precedência sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::status::RetryPolicy;

/// Configuração de nível superior carregada de `traco.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TracoConfig {
    /// URL base do serviço externo de geração de diagramas.
    #[serde(default = "default_generator_url")]
    pub generator_url: String,

    /// Chave de API do serviço de geração.
    #[serde(default)]
    pub api_key: String,

    /// Máximo de retentativas antes de marcar um job como falho.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Teto de uma tentativa de geração, em segundos.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Espera fixa antes de reexecutar uma tentativa, em segundos.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    /// Capacidade da fila de callbacks.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_generator_url() -> String {
    "https://generator.internal.traco.dev".to_string()
}

// Valores de interoperabilidade: 3 retentativas, 60s de timeout, 5s de backoff.
fn default_max_retries() -> u32 {
    3
}

fn default_attempt_timeout_secs() -> u64 {
    60
}

fn default_retry_backoff_secs() -> u64 {
    5
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for TracoConfig {
    fn default() -> Self {
        Self {
            generator_url: default_generator_url(),
            api_key: String::new(),
            max_retries: default_max_retries(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl TracoConfig {
    /// Carrega a configuração de `traco.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("traco.toml"))
    }

    /// Carrega a configuração do caminho fornecido.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<TracoConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para a chave API.
        if let Ok(key) = std::env::var("TRACO_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }

        Ok(config)
    }

    /// Política de retry/timeout derivada da configuração.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
        }
    }
}
