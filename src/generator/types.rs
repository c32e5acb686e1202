//! Tipos de dados para requisições e respostas do serviço de geração de diagramas.
//!
//! Todas as structs derivam `Serialize` e `Deserialize` para conversão JSON.
//! Os campos são renomeados para `camelCase` conforme o formato de wire do
//! serviço de geração.

use serde::{Deserialize, Serialize};

/// Corpo da requisição para o endpoint `/generate` do serviço de geração.
///
/// Identifica o requisito a ser diagramado e o dono da requisição. O serviço
/// é idempotente para o mesmo par — reexecutar com a mesma entrada produz o
/// mesmo diagrama.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Identificador do requisito (o job).
    pub job_id: String,
    /// Identificador da conta dona do requisito.
    pub owner_id: String,
}

/// Resposta retornada pelo endpoint `/generate` em caso de sucesso.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// Código-fonte do diagrama gerado.
    pub diagram: String,
    /// Formato do diagrama (ex.: "mermaid", "plantuml").
    pub format: String,
}
