//! Tipos de erro do cliente SEFAZ.
//!
//! [`SefazError`] separa as quatro famílias de falha que o orquestrador
//! precisa distinguir: XML inválido, falha de rede sem envio, requisição
//! enviada sem resultado conhecido e rejeição da aplicação.

use thiserror::Error;

use crate::transporte::TransporteError;

#[derive(Debug, Error)]
pub enum SefazError {
    /// O XML de saída não passou no esquema. Contém todas as mensagens.
    #[error("XML inválido: {}", .0.join("; "))]
    Validacao(Vec<String>),

    /// A requisição certamente não foi entregue.
    #[error("falha de conexão com a SEFAZ: {0}")]
    Rede(String),

    /// A requisição partiu mas não completou; o resultado é desconhecido.
    #[error("requisição incompleta, situação desconhecida: {0}")]
    Incompleta(String),

    #[error("rejeição [{status}]: {motivo}")]
    Rejeicao { status: String, motivo: String },

    #[error("tag \"{tag}\" do campo \"{campo}\" não encontrada")]
    TagAusente { tag: String, campo: String },

    #[error("a ação \"{servico}\" não é suportada no estado \"{uf}\"")]
    ServicoNaoSuportado { servico: String, uf: String },

    #[error("{0}")]
    Tarefa(String),

    #[error("falha na assinatura: {0}")]
    Assinatura(String),

    #[error("certificado inválido: {0}")]
    Certificado(String),

    #[error("XML malformado: {0}")]
    Xml(String),

    #[error("valor inválido: {0}")]
    Formato(String),
}

impl SefazError {
    pub fn tag_ausente(tag: &str, campo: &str) -> Self {
        SefazError::TagAusente {
            tag: tag.to_string(),
            campo: campo.to_string(),
        }
    }

    /// Verdadeiro quando não se sabe se a SEFAZ recebeu o documento.
    pub fn is_incompleta(&self) -> bool {
        matches!(self, SefazError::Incompleta(_))
    }

    /// Verdadeiro quando o documento certamente não foi entregue.
    pub fn is_rede(&self) -> bool {
        matches!(self, SefazError::Rede(_))
    }
}

impl From<TransporteError> for SefazError {
    fn from(err: TransporteError) -> Self {
        match err {
            TransporteError::NaoEnviado(msg) => SefazError::Rede(msg),
            TransporteError::Incompleto(msg) => SefazError::Incompleta(msg),
        }
    }
}

impl From<quick_xml::Error> for SefazError {
    fn from(err: quick_xml::Error) -> Self {
        SefazError::Xml(err.to_string())
    }
}
