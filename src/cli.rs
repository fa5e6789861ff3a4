//! Interface de linha de comando do LessonForge baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (serve, run, status)
//! e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// LessonForge: gera material didático a partir de um esboço mestre, com
/// avaliação de qualidade por tipo de conteúdo.
#[derive(Debug, Parser)]
#[command(name = "lessonforge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./lessonforge.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita logs de depuração.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sobe a API HTTP e o pool de workers.
    Serve {
        /// Endereço de escuta; sobrescreve `server.bind`.
        #[arg(long)]
        bind: Option<String>,

        /// Número de workers; sobrescreve `pipeline.workers`.
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Cria um job e o processa neste processo, mostrando o resultado.
    Run {
        /// Tema da aula.
        topic: String,

        /// Público-alvo (elementary, middle_school, high_school, ...).
        #[arg(long, short, default_value = "high_school")]
        audience: String,

        /// Tipos de conteúdo, separados por vírgula.
        #[arg(long = "types", short = 't', value_delimiter = ',', default_value = "study_guide")]
        content_types: Vec<String>,
    },

    /// Mostra o estado de um job gravado no diretório de dados.
    Status {
        /// Identificador retornado na criação do job.
        job_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from([
            "lessonforge",
            "run",
            "Photosynthesis",
            "--audience",
            "middle_school",
            "--types",
            "study_guide,flashcards",
        ]);
        match cli.command {
            Command::Run {
                topic,
                audience,
                content_types,
            } => {
                assert_eq!(topic, "Photosynthesis");
                assert_eq!(audience, "middle_school");
                assert_eq!(content_types, vec!["study_guide", "flashcards"]);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn run_defaults() {
        let cli = Cli::parse_from(["lessonforge", "run", "Cells"]);
        match cli.command {
            Command::Run {
                audience,
                content_types,
                ..
            } => {
                assert_eq!(audience, "high_school");
                assert_eq!(content_types, vec!["study_guide"]);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "lessonforge",
            "--config",
            "custom.toml",
            "--verbose",
            "serve",
            "--workers",
            "2",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(
            cli.command,
            Command::Serve {
                bind: None,
                workers: Some(2)
            }
        ));
    }

    #[test]
    fn cli_parses_status_subcommand() {
        let cli = Cli::parse_from(["lessonforge", "status", "abc-123"]);
        assert!(matches!(cli.command, Command::Status { job_id } if job_id == "abc-123"));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
