//! Configuração do pubflow carregada a partir de `pubflow.toml`.
//!
//! A struct [`PubflowConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `PUBFLOW_WEBHOOK_URL` e `PUBFLOW_STORAGE_ROOT`
//! têm precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::collaborators::{LogSink, NotificationSink, WebhookNotifier};
use crate::storage::{BlobStore, FsBlobStore, MemoryBlobStore, StorageTiers, TierUrls};

pub const DEFAULT_CONFIG_FILE: &str = "pubflow.toml";

/// Configuração de nível superior carregada de `pubflow.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PubflowConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub workflows: WorkflowsConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Nível de log usado quando `RUST_LOG` não está definido.
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Fs,
}

/// Backend de armazenamento e URLs CDN de cada camada.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Diretório raiz do backend `fs`.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    #[serde(default = "default_private_cdn")]
    pub private_cdn: String,

    #[serde(default = "default_public_cdn")]
    pub public_cdn: String,
}

/// Workflows extras e nomes exigidos pela aplicação.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowsConfig {
    /// Nomes de workflows que precisam estar registrados.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Arquivos TOML ou JSON com definições de workflow.
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

// Valor padrão para a raiz do armazenamento: "./storage".
fn default_storage_root() -> PathBuf {
    PathBuf::from("storage")
}

fn default_private_cdn() -> String {
    "https://prv.cdn.localhost".to_string()
}

fn default_public_cdn() -> String {
    "https://cdn.localhost".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_storage_root(),
            private_cdn: default_private_cdn(),
            public_cdn: default_public_cdn(),
        }
    }
}

impl PubflowConfig {
    /// Carrega a configuração de `path`, ou de `pubflow.toml` no diretório
    /// atual. Usa valores padrão se o arquivo padrão não existir; um caminho
    /// explícito inexistente é erro.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Variáveis de ambiente têm precedência sobre o arquivo de configuração.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("PUBFLOW_WEBHOOK_URL")
            && !url.is_empty()
        {
            self.notifications.webhook_url = Some(url);
        }
        if let Some(root) = lookup("PUBFLOW_STORAGE_ROOT")
            && !root.is_empty()
        {
            self.storage.root = PathBuf::from(root);
        }
    }

    /// Monta as camadas de armazenamento com o backend configurado.
    pub fn storage_tiers(&self) -> StorageTiers {
        let backend: Arc<dyn BlobStore> = match self.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryBlobStore::new()),
            StorageBackend::Fs => Arc::new(FsBlobStore::new(self.storage.root.clone())),
        };
        StorageTiers::new(
            backend,
            TierUrls::new(&self.storage.private_cdn, &self.storage.public_cdn),
        )
    }

    /// Webhook quando configurado; caso contrário, notificações vão para o log.
    pub fn notifier(&self) -> Result<Arc<dyn NotificationSink>> {
        Ok(match &self.notifications.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url)?),
            None => Arc::new(LogSink),
        })
    }
}
