//! Configuração do LessonForge carregada a partir de `lessonforge.toml`.
//!
//! A struct [`ForgeConfig`] contém todos os parâmetros configuráveis,
//! agrupados nas seções `retry`, `pipeline`, `quality` e `server`.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `ANTHROPIC_API_KEY` tem precedência sobre o arquivo.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::content::ContentType;
use crate::generation::RetryPolicy;
use crate::orchestrator::PipelineSettings;
use crate::quality::{DEFAULT_FACTUAL_FLOOR, DEFAULT_THRESHOLD, HeuristicAssessor, QualityGate, Weights};

/// Nome do arquivo procurado no diretório atual quando `--config` não é usado.
pub const DEFAULT_CONFIG_FILE: &str = "lessonforge.toml";

/// Configuração de nível superior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Chave da API Anthropic.
    pub api_key: String,
    /// Identificador do modelo usado em todas as gerações.
    pub model: String,
    /// Diretório onde os registros de jobs são gravados.
    pub data_dir: PathBuf,
    pub retry: RetryPolicy,
    pub pipeline: PipelineConfig,
    pub quality: QualityConfig,
    pub server: ServerConfig,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            data_dir: PathBuf::from("lessonforge-data"),
            retry: RetryPolicy::default(),
            pipeline: PipelineConfig::default(),
            quality: QualityConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Seção `[pipeline]`: concorrência, prazos e cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Número de workers consumindo a fila.
    pub workers: usize,
    /// Unidades de geração simultâneas por job.
    pub max_concurrency: usize,
    /// Rodadas de geração e avaliação por tipo de conteúdo.
    pub max_quality_attempts: u32,
    /// Chamadas simultâneas ao provedor, somando todos os jobs.
    pub global_generation_limit: usize,
    pub job_deadline_secs: u64,
    pub cache_ttl_secs: u64,
    /// Tempo até uma entrega não confirmada voltar para a fila.
    pub visibility_timeout_secs: u64,
    /// Timeout de cada requisição HTTP ao provedor.
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_concurrency: 8,
            max_quality_attempts: 3,
            global_generation_limit: 16,
            job_deadline_secs: 900,
            cache_ttl_secs: 86_400,
            visibility_timeout_secs: 1_200,
            request_timeout_secs: 120,
        }
    }
}

/// Seção `[quality]`: limiares e pesos da avaliação.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub default_threshold: f64,
    /// Piso de precisão factual, independente da nota composta.
    pub factual_floor: f64,
    /// Limiar por tipo de conteúdo, ex.: `quiz = 0.75`.
    pub thresholds: BTreeMap<ContentType, f64>,
    /// Pesos por tipo de conteúdo; normalizados para somar 1.0.
    pub weights: BTreeMap<ContentType, Weights>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            factual_floor: DEFAULT_FACTUAL_FLOOR,
            thresholds: BTreeMap::new(),
            weights: BTreeMap::new(),
        }
    }
}

/// Seção `[server]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Endereço de escuta da API HTTP.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ForgeConfig {
    /// Carrega a configuração de `path`, ou de `lessonforge.toml` no diretório
    /// atual. Usa valores padrão se o arquivo padrão não existir; um caminho
    /// explícito inexistente é erro.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        let config = config.with_api_key_override(std::env::var("ANTHROPIC_API_KEY").ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// A chave vinda do ambiente tem precedência sobre a do arquivo.
    pub fn with_api_key_override(mut self, env_key: Option<String>) -> Self {
        if let Some(key) = env_key
            && !key.is_empty()
        {
            self.api_key = key;
        }
        self
    }

    /// Rejeita combinações que deixariam o pipeline inconsistente.
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.quality.default_threshold) {
            bail!("quality.default_threshold must be within [0, 1]");
        }
        if !unit.contains(&self.quality.factual_floor) {
            bail!("quality.factual_floor must be within [0, 1]");
        }
        if let Some((ct, t)) = self.quality.thresholds.iter().find(|(_, t)| !unit.contains(*t)) {
            bail!("quality.thresholds.{ct} = {t} is outside [0, 1]");
        }
        if self.pipeline.max_quality_attempts == 0 {
            bail!("pipeline.max_quality_attempts must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.pipeline.visibility_timeout_secs <= self.pipeline.job_deadline_secs {
            bail!("pipeline.visibility_timeout_secs must exceed pipeline.job_deadline_secs");
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        let job_deadline = Duration::from_secs(self.pipeline.job_deadline_secs);
        PipelineSettings {
            max_quality_attempts: self.pipeline.max_quality_attempts,
            max_concurrency: self.pipeline.max_concurrency,
            cache_ttl: Duration::from_secs(self.pipeline.cache_ttl_secs),
            job_deadline,
            lease_ttl: job_deadline + Duration::from_secs(60),
            retry: self.retry.clone(),
        }
    }

    pub fn quality_gate(&self) -> QualityGate {
        QualityGate {
            default_threshold: self.quality.default_threshold,
            thresholds: self.quality.thresholds.clone(),
            factual_floor: self.quality.factual_floor,
        }
    }

    pub fn assessor(&self) -> HeuristicAssessor {
        HeuristicAssessor::new(self.quality.weights.clone(), self.quality.factual_floor)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.visibility_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.request_timeout_secs)
    }
}
