//! Interface de linha de comando do `nfe-sefaz` baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (consulta, recibo,
//! id-inutilizacao, servicos) e flags globais (--config, --ambiente, --json,
//! --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use nfe_sefaz::Modelo;
use nfe_sefaz::task::Ambiente;

/// Consultas à SEFAZ de documentos fiscais eletrônicos.
#[derive(Debug, Parser)]
#[command(name = "nfe-sefaz", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Arquivo de configuração (padrão: `sefaz.toml` no diretório atual).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Sobrescreve o ambiente da configuração.
    #[arg(long, global = true)]
    pub ambiente: Option<AmbienteArg>,

    /// Imprime o resultado em JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Ambiente aceito pela CLI, mapeado para [`Ambiente`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AmbienteArg {
    Producao,
    Homologacao,
}

impl From<AmbienteArg> for Ambiente {
    fn from(arg: AmbienteArg) -> Self {
        match arg {
            AmbienteArg::Producao => Ambiente::Producao,
            AmbienteArg::Homologacao => Ambiente::Homologacao,
        }
    }
}

/// Modelo de documento aceito pela CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeloArg {
    Nfe,
    Nfce,
}

impl From<ModeloArg> for Modelo {
    fn from(arg: ModeloArg) -> Self {
        match arg {
            ModeloArg::Nfe => Modelo::Nfe,
            ModeloArg::Nfce => Modelo::Nfce,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Consulta a situação de uma nota pela chave de acesso.
    Consulta {
        /// Chave de acesso com 44 dígitos.
        chave: String,
    },

    /// Consulta o resultado de um lote pelo número do recibo.
    Recibo {
        /// Número do recibo (`nRec`).
        numero: String,

        #[arg(long, value_enum, default_value_t = ModeloArg::Nfce)]
        modelo: ModeloArg,
    },

    /// Calcula o identificador de uma inutilização sem acessar a rede.
    IdInutilizacao {
        /// Sigla da UF do emitente.
        uf: String,
        /// Ano com quatro dígitos.
        ano: u16,
        /// CNPJ do emitente.
        cnpj: String,
        #[arg(value_enum)]
        modelo: ModeloArg,
        serie: u32,
        inicio: u32,
        fim: u32,
    },

    /// Lista os endereços de serviço da configuração.
    Servicos,
}
