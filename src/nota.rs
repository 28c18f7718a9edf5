//! Documento fiscal a ser autorizado.
//!
//! O modelo de dados completo da nota e a geração do seu XML ficam fora deste
//! crate; [`Nota`] carrega apenas o que o fluxo de autorização lê e altera, e
//! o XML vem de um [`Gerador`] fornecido pelo chamador.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::SefazError;
use crate::task::{Ambiente, Protocolo};
use crate::xml::{self, NS_NFE};

/// Versão do leiaute da NFe/NFCe.
pub const VERSAO: &str = "4.00";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modelo {
    #[default]
    Nfe,
    Nfce,
    /// Cupom fiscal eletrônico emitido por equipamento SAT.
    Cfe,
}

impl Modelo {
    /// Código `mod` do leiaute.
    pub fn codigo(&self) -> u8 {
        match self {
            Modelo::Nfe => 55,
            Modelo::Cfe => 59,
            Modelo::Nfce => 65,
        }
    }

    pub fn from_codigo(codigo: &str) -> Result<Self, SefazError> {
        match codigo.trim() {
            "55" => Ok(Modelo::Nfe),
            "59" => Ok(Modelo::Cfe),
            "65" => Ok(Modelo::Nfce),
            outro => Err(SefazError::Formato(format!("modelo \"{outro}\" inválido"))),
        }
    }

    /// Tag assinada do documento.
    pub fn tag_assinada(&self) -> &'static str {
        match self {
            Modelo::Cfe => "infCFe",
            _ => "infNFe",
        }
    }

    pub fn esquema(&self) -> String {
        match self {
            Modelo::Cfe => "CfeDadosVendas_v0.07.xsd".to_string(),
            _ => format!("nfe_v{VERSAO}.xsd"),
        }
    }
}

impl fmt::Display for Modelo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modelo::Nfe => write!(f, "nfe"),
            Modelo::Nfce => write!(f, "nfce"),
            Modelo::Cfe => write!(f, "cfe"),
        }
    }
}

/// Forma de emissão (`tpEmis`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emissao {
    #[default]
    Normal,
    Contingencia,
}

impl Emissao {
    pub fn codigo(&self) -> &'static str {
        match self {
            Emissao::Normal => "1",
            Emissao::Contingencia => "9",
        }
    }
}

impl fmt::Display for Emissao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emissao::Normal => write!(f, "normal"),
            Emissao::Contingencia => write!(f, "contingencia"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nota {
    /// Chave de acesso com 44 dígitos.
    pub id: String,
    pub modelo: Modelo,
    pub emissao: Emissao,
    pub ambiente: Ambiente,
    pub serie: u32,
    pub numero: u32,
    /// CNPJ do emitente.
    pub cnpj: String,
    /// Sigla da UF do emitente.
    pub uf: String,
    /// Motivo da contingência ou do cancelamento.
    pub justificativa: Option<String>,
    pub data_contingencia: Option<DateTime<FixedOffset>>,
    pub protocolo: Option<Protocolo>,
}

impl Nota {
    /// Anexa o protocolo de autorização ao XML assinado, gerando o `nfeProc`.
    pub fn add_protocolo(&self, xml_assinado: &str) -> Result<String, SefazError> {
        let protocolo = self.protocolo.as_ref().ok_or_else(|| {
            SefazError::Tarefa(format!("a nota \"{}\" não possui protocolo", self.id))
        })?;
        let conteudo = format!(
            "{}{}",
            xml::sem_declaracao(xml_assinado),
            protocolo.get_node().to_xml()
        );
        Ok(xml::envolver(
            "nfeProc",
            &[("xmlns", NS_NFE), ("versao", VERSAO)],
            &conteudo,
        ))
    }
}

/// Gera o XML (ainda não assinado) de uma nota.
pub trait Gerador {
    fn gerar(&self, nota: &Nota) -> Result<String, SefazError>;
}
