//! Interface de terminal do LessonForge: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`JobProgress`] acompanha visualmente
//! a execução de um job no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state_machine::{Job, JobState, JobView};

/// Indicador visual de progresso para a execução de um job no terminal.
///
/// Exibe um spinner animado durante o processamento e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e avisos (amarelo).
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    /// Inicia o spinner com o tema do job.
    pub fn start(topic: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("PENDING: {topic}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a mensagem do spinner com o estado e o progresso do job.
    pub fn update(&self, job: &Job) {
        self.pb.set_message(status_line(job));
    }

    /// Finaliza o spinner e exibe o resultado de cada tipo de conteúdo.
    pub fn complete(&self, view: &JobView) {
        self.pb.finish_and_clear();
        match view.state {
            JobState::Completed => {
                println!("  {} Job {} completed", self.green.apply_to("✓"), view.id);
            }
            JobState::Failed => {
                let reason = view.failure.as_deref().unwrap_or("unknown failure");
                println!("  {} Job {} failed: {reason}", self.red.apply_to("✗"), view.id);
            }
            state => println!("  {} Job {} is {state}", self.yellow.apply_to("…"), view.id),
        }
        for (content_type, artifact) in &view.results {
            println!(
                "    {} {content_type}: quality {:.2} after {} attempt(s)",
                self.green.apply_to("•"),
                artifact.quality.composite,
                artifact.attempt_count
            );
        }
        for error in &view.errors {
            println!(
                "    {} {}: {}",
                self.yellow.apply_to("•"),
                error.content_type,
                error.reason
            );
        }
    }

    /// Imprime a visão do job formatada em JSON com estilo colorido.
    pub fn print_view(&self, view: &JobView) {
        print_view(view);
    }
}

/// Imprime a visão do job sem spinner (usado por `status`).
pub fn print_view(view: &JobView) {
    let style = match view.state {
        JobState::Completed => Style::new().green().bold(),
        JobState::Failed => Style::new().red().bold(),
        _ => Style::new().yellow(),
    };
    println!();
    println!("{}", style.apply_to(format!("─── Job {} ({}) ───", view.id, view.state)));
    println!("{}", serde_json::to_string_pretty(view).unwrap_or_default());
}

fn status_line(job: &Job) -> String {
    let requested = job.request.content_types.len();
    let settled = job
        .request
        .content_types
        .iter()
        .filter(|ct| job.is_settled(**ct))
        .count();
    let outline = if job.outline.is_some() { "outline ready" } else { "outline pending" };
    format!(
        "{}: {} ({outline}, {settled}/{requested} settled)",
        job.state, job.request.topic
    )
}
