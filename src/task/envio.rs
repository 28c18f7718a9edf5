//! Resolução do endereço de um serviço e envio de uma requisição.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::status::Ambiente;
use crate::assinador::Assinador;
use crate::banco::{Banco, InformacaoServico};
use crate::config::Configuracao;
use crate::error::SefazError;
use crate::nota::{Emissao, Modelo};
use crate::transporte::Transporte;
use crate::xml::{self, Elemento};

/// Serviços oferecidos pelas SEFAZ e pelo SAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Servico {
    Inutilizacao,
    Protocolo,
    Status,
    Cadastro,
    Autorizacao,
    Retorno,
    Recepcao,
    Confirmacao,
    Evento,
    Destinadas,
    Download,
}

impl Servico {
    /// Nome usado na tabela de serviços e no caminho do SAT.
    pub fn nome(&self) -> &'static str {
        match self {
            Servico::Inutilizacao => "inutilizacao",
            Servico::Protocolo => "protocolo",
            Servico::Status => "status",
            Servico::Cadastro => "cadastro",
            Servico::Autorizacao => "autorizacao",
            Servico::Retorno => "retorno",
            Servico::Recepcao => "recepcao",
            Servico::Confirmacao => "confirmacao",
            Servico::Evento => "evento",
            Servico::Destinadas => "destinadas",
            Servico::Download => "download",
        }
    }

    /// Nome do WSDL, que compõe o namespace de `nfeDadosMsg`.
    pub fn wsdl(&self) -> &'static str {
        match self {
            Servico::Inutilizacao => "NFeInutilizacao4",
            Servico::Protocolo => "NFeConsultaProtocolo4",
            Servico::Status => "NFeStatusServico4",
            Servico::Cadastro => "CadConsultaCadastro4",
            Servico::Autorizacao => "NFeAutorizacao4",
            Servico::Retorno => "NFeRetAutorizacao4",
            Servico::Recepcao | Servico::Confirmacao | Servico::Evento => "NFeRecepcaoEvento4",
            Servico::Destinadas | Servico::Download => "NFeDistribuicaoDFe",
        }
    }
}

impl fmt::Display for Servico {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nome())
    }
}

/// Colaboradores compartilhados por todas as requisições.
pub struct Servicos<T> {
    pub configuracao: Configuracao,
    pub transporte: T,
    pub banco: Box<dyn Banco>,
    pub assinador: Box<dyn Assinador>,
}

impl<T: Transporte> Servicos<T> {
    pub fn new(
        configuracao: Configuracao,
        transporte: T,
        banco: Box<dyn Banco>,
        assinador: Box<dyn Assinador>,
    ) -> Self {
        Self {
            configuracao,
            transporte,
            banco,
            assinador,
        }
    }

    pub fn validar(&self, xml: &str, esquema: &str) -> Result<(), SefazError> {
        self.assinador.validar(xml, esquema)
    }
}

/// Intenção de envio: um serviço, para um ambiente, modelo e emissão.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envio {
    pub servico: Servico,
    pub ambiente: Ambiente,
    pub modelo: Modelo,
    pub emissao: Emissao,
    pub conteudo: String,
}

impl Envio {
    pub fn new(servico: Servico, ambiente: Ambiente, modelo: Modelo, conteudo: String) -> Self {
        Self {
            servico,
            ambiente,
            modelo,
            emissao: Emissao::Normal,
            conteudo,
        }
    }

    pub fn com_emissao(mut self, emissao: Emissao) -> Self {
        self.emissao = emissao;
        self
    }

    fn is_sat(&self) -> bool {
        self.modelo == Modelo::Cfe
    }

    /// Corpo `nfeDadosMsg` com o namespace do WSDL do serviço.
    pub fn get_node(&self) -> String {
        let namespace = format!("http://www.portalfiscal.inf.br/nfe/wsdl/{}", self.servico.wsdl());
        xml::envolver(
            "nfeDadosMsg",
            &[("xmlns", namespace.as_str())],
            xml::sem_declaracao(&self.conteudo),
        )
    }

    pub fn servico_info(&self, sv: &Servicos<impl Transporte>) -> Result<InformacaoServico, SefazError> {
        let uf = &sv.configuracao.uf;
        let mut info = sv
            .banco
            .informacao_servico(self.emissao, uf, self.modelo, self.ambiente)?;
        info.remove(&self.servico)
            .ok_or_else(|| SefazError::ServicoNaoSuportado {
                servico: self.servico.to_string(),
                uf: uf.clone(),
            })
    }

    /// Envia a requisição e devolve o conteúdo da resposta.
    ///
    /// Falha sem tentar a conexão enquanto a configuração estiver offline,
    /// exceto para o SAT. Qualquer falha de rede marca a configuração como
    /// offline a partir de agora.
    pub async fn envia(&self, sv: &Servicos<impl Transporte>) -> Result<Elemento, SefazError> {
        let config = &sv.configuracao;
        let sat = self.is_sat();
        if !sat && config.is_offline() {
            return Err(SefazError::Rede(
                "operação offline, sem conexão com a internet".into(),
            ));
        }

        let (url, corpo) = if sat {
            let base = config.sat_url.as_deref().ok_or_else(|| SefazError::ServicoNaoSuportado {
                servico: self.servico.to_string(),
                uf: "SAT".into(),
            })?;
            (
                format!("{}/{}", base.trim_end_matches('/'), self.servico.nome()),
                self.conteudo.clone(),
            )
        } else {
            if !sv.assinador.certificado_valido() {
                return Err(SefazError::Certificado("certificado vencido ou ausente".into()));
            }
            let info = self.servico_info(sv)?;
            debug!(servico = %self.servico, url = %info.url, versao = %info.versao, "serviço resolvido");
            (info.url, self.get_node())
        };

        debug!(servico = %self.servico, bytes = corpo.len(), "enviando requisição");
        match sv.transporte.post(&url, &corpo, sat).await {
            Ok(resposta) => Ok(resposta),
            Err(err) => {
                config.set_offline(chrono::Utc::now().timestamp());
                warn!(servico = %self.servico, %url, erro = %err, "falha de rede, modo offline ativado");
                Err(err.into())
            }
        }
    }
}
