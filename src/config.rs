//! Configuração do cliente carregada a partir de `sefaz.toml`.
//!
//! A struct [`Configuracao`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `SEFAZ_SENHA_CERTIFICADO` tem precedência sobre o arquivo.
//!
//! O instante em que a SEFAZ ficou inacessível é compartilhado por todos os
//! clones de uma mesma configuração: enquanto a janela não expira, nenhum
//! envio (exceto CFe/SAT) chega a ser tentado.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Result;
use serde::Deserialize;

use crate::banco::EntradaServico;
use crate::task::Ambiente;

const ARQUIVO_PADRAO: &str = "sefaz.toml";

/// Configuração de nível superior carregada de `sefaz.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Configuracao {
    /// Ambiente usado nas requisições montadas a partir da configuração.
    #[serde(default)]
    pub ambiente: Ambiente,

    /// Sigla da UF do emitente, usada na busca dos endereços dos serviços.
    #[serde(default)]
    pub uf: String,

    /// CNPJ do emitente.
    #[serde(default)]
    pub cnpj: String,

    /// Tempo limite de conexão em segundos.
    #[serde(default = "default_tempo_limite")]
    pub tempo_limite: u64,

    /// Segundos em que os envios ficam suspensos após uma falha de rede.
    #[serde(default = "default_janela_offline")]
    pub janela_offline: i64,

    /// Endereço base do equipamento SAT.
    #[serde(default)]
    pub sat_url: Option<String>,

    /// Caminho do certificado digital A1 (PKCS#12).
    #[serde(default)]
    pub certificado: Option<PathBuf>,

    #[serde(default)]
    pub senha_certificado: String,

    /// Tabela de endereços dos serviços.
    #[serde(default)]
    pub servicos: Vec<EntradaServico>,

    // Instante (epoch em segundos) da última falha de rede; 0 quando online.
    #[serde(skip)]
    pub(crate) offline: Arc<AtomicI64>,
}

// Valor padrão para o tempo limite: 4 segundos.
fn default_tempo_limite() -> u64 {
    4
}

// Valor padrão para a janela offline: 180 segundos.
fn default_janela_offline() -> i64 {
    180
}

impl Default for Configuracao {
    fn default() -> Self {
        Self {
            ambiente: Ambiente::default(),
            uf: String::new(),
            cnpj: String::new(),
            tempo_limite: default_tempo_limite(),
            janela_offline: default_janela_offline(),
            sat_url: None,
            certificado: None,
            senha_certificado: String::new(),
            servicos: Vec::new(),
            offline: Arc::default(),
        }
    }
}

impl Configuracao {
    /// Carrega a configuração de `sefaz.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(ARQUIVO_PADRAO))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<Configuracao>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para a senha do certificado.
        if let Ok(senha) = std::env::var("SEFAZ_SENHA_CERTIFICADO")
            && !senha.is_empty()
        {
            config.senha_certificado = senha;
        }

        Ok(config)
    }

    /// Tempo limite total de uma requisição: 1,5 vez o de conexão.
    pub fn tempo_limite_total(&self) -> u64 {
        (self.tempo_limite * 3).div_ceil(2)
    }

    /// Marca a SEFAZ como inacessível a partir de `instante` (epoch em segundos).
    pub fn set_offline(&self, instante: i64) {
        self.offline.store(instante, Ordering::SeqCst);
    }

    pub fn set_online(&self) {
        self.offline.store(0, Ordering::SeqCst);
    }

    pub fn offline_desde(&self) -> Option<i64> {
        match self.offline.load(Ordering::SeqCst) {
            0 => None,
            instante => Some(instante),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.is_offline_em(chrono::Utc::now().timestamp())
    }

    /// Verdadeiro enquanto `agora < offline + janela_offline`.
    pub fn is_offline_em(&self, agora: i64) -> bool {
        self.offline_desde()
            .is_some_and(|desde| agora < desde + self.janela_offline)
    }
}
