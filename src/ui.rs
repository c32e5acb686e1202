//! Interface de terminal do TRACO — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`JobProgress`] acompanha visualmente
//! um job de geração no terminal enquanto o worker o processa.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::query::StatusView;
use crate::status::JobStatus;

/// Indicador visual de progresso para um job de geração no terminal.
///
/// Exibe um spinner animado durante a geração e mensagens coloridas para
/// sucesso (verde), falha (vermelho) e retentativa (amarelo).
pub struct JobProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para mensagens de retentativa.
    yellow: Style,
}

impl JobProgress {
    /// Inicia o spinner com o identificador do requisito.
    pub fn start(requirement: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("pending: {requirement}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a mensagem do spinner com o status e o progresso atuais.
    pub fn update(&self, view: &StatusView) {
        self.pb
            .set_message(format!("{} {}%: {}", view.status, view.progress, view.job_id));
    }

    /// Exibe uma mensagem de retentativa com o número da tentativa.
    #[allow(dead_code)]
    pub fn retry(&self, attempt: u32, max: u32) {
        self.pb.println(format!(
            "  {} Retry {attempt}/{max}: attempt timed out",
            self.yellow.apply_to("↻")
        ));
    }

    /// Encerra o spinner sinalizando um job travado além do orçamento de
    /// retentativas — caso para intervenção manual.
    pub fn stall(&self) {
        self.pb.finish_and_clear();
        println!(
            "  {} Job stalled past the retry budget, manual intervention required",
            self.yellow.apply_to("!")
        );
    }

    /// Finaliza o spinner e exibe o desfecho do job.
    ///
    /// Sucesso é mostrado em verde com checkmark; falha em vermelho com X.
    pub fn complete(&self, view: &StatusView) {
        self.pb.finish_and_clear();
        match view.status {
            JobStatus::Failed => {
                let reason = view.error.as_deref().unwrap_or("unknown failure");
                println!("  {} Generation failed: {reason}", self.red.apply_to("✗"));
            }
            _ => {
                println!("  {} Diagram generated", self.green.apply_to("✓"));
            }
        }
    }
}

/// Imprime a projeção de status formatada em JSON com estilo colorido.
pub fn print_status(view: &StatusView) {
    let style = match view.status {
        JobStatus::Completed => Style::new().green().bold(),
        JobStatus::Failed => Style::new().red().bold(),
        _ => Style::new().yellow(),
    };
    println!();
    println!("{}", style.apply_to("─── Generation Status ───"));
    println!("{}", serde_json::to_string_pretty(view).unwrap_or_default());
}
