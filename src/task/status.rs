use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SefazError;
use crate::util;
use crate::xml::Elemento;

/// Ambiente de destino das requisições.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ambiente {
    Producao,
    #[default]
    Homologacao,
}

impl Ambiente {
    /// Código `tpAmb` do leiaute.
    pub fn codigo(&self) -> &'static str {
        match self {
            Ambiente::Producao => "1",
            Ambiente::Homologacao => "2",
        }
    }

    pub fn from_codigo(codigo: &str) -> Result<Self, SefazError> {
        match codigo.trim() {
            "1" => Ok(Ambiente::Producao),
            "2" => Ok(Ambiente::Homologacao),
            outro => Err(SefazError::Formato(format!("ambiente \"{outro}\" inválido"))),
        }
    }
}

impl fmt::Display for Ambiente {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ambiente::Producao => write!(f, "producao"),
            Ambiente::Homologacao => write!(f, "homologacao"),
        }
    }
}

/// Cabeçalho comum a toda resposta da SEFAZ.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub ambiente: Ambiente,
    /// Versão do aplicativo que processou a requisição (`verAplic`).
    pub versao: Option<String>,
    /// Código `cStat`, sempre com três dígitos.
    pub status: Option<String>,
    pub motivo: Option<String>,
    /// Código IBGE da UF.
    pub uf: Option<u8>,
}

impl Status {
    pub fn new(status: &str, motivo: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            motivo: Some(motivo.to_string()),
            ..Default::default()
        }
    }

    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or_default()
    }

    pub fn motivo(&self) -> &str {
        self.motivo.as_deref().unwrap_or_default()
    }

    /// Aceita a sigla (`PR`) ou o código IBGE (`41`).
    pub fn set_uf(&mut self, uf: &str) -> Result<(), SefazError> {
        self.uf = Some(util::codigo_uf(uf)?);
        Ok(())
    }

    /// Preenche os campos a partir de `elemento`; só `cStat` é obrigatório.
    pub fn load_node(&mut self, elemento: &Elemento) -> Result<(), SefazError> {
        let status = elemento.exigir("cStat", "Status")?;
        if status.len() != 3 || !status.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SefazError::Formato(format!("cStat \"{status}\" inválido")));
        }
        if let Some(tp_amb) = elemento.valor("tpAmb") {
            self.ambiente = Ambiente::from_codigo(tp_amb)?;
        }
        self.status = Some(status.to_string());
        self.versao = elemento.valor("verAplic").map(str::to_string);
        self.motivo = elemento.valor("xMotivo").map(str::to_string);
        self.uf = elemento.valor("cUF").map(util::codigo_uf).transpose()?;
        Ok(())
    }

    pub fn get_node(&self, nome: &str) -> Elemento {
        self.escrever(Elemento::novo(nome))
    }

    pub(crate) fn escrever(&self, elemento: Elemento) -> Elemento {
        elemento
            .folha("tpAmb", self.ambiente.codigo())
            .folha_opcional("verAplic", self.versao.as_deref())
            .folha_opcional("cStat", self.status.as_deref())
            .folha_opcional("xMotivo", self.motivo.as_deref())
            .folha_opcional("cUF", self.uf)
    }
}
