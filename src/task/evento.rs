//! Eventos vinculados a uma nota já autorizada; hoje apenas o cancelamento.
//!
//! O pedido ([`EventoRequest`]) e o resultado ([`EventoResult`]) são tipos
//! distintos, ligados somente por [`EventoRequest::envia`].

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::envio::{Envio, Servico, Servicos};
use super::retorno::{Retorno, codigos};
use super::status::Ambiente;
use crate::error::SefazError;
use crate::nota::{Modelo, Nota};
use crate::transporte::Transporte;
use crate::util;
use crate::xml::{self, Elemento, NS_NFE};

/// Versão do leiaute de eventos.
pub const VERSAO_EVENTO: &str = "1.00";

/// Código `tpEvento` do cancelamento.
pub const TIPO_CANCELAMENTO: &str = "110111";

/// Pedido de registro de um evento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventoRequest {
    pub ambiente: Ambiente,
    pub modelo: Modelo,
    /// Código IBGE do órgão destino; quando ausente vem da chave.
    pub orgao: Option<u8>,
    /// CNPJ ou CPF do autor.
    pub identificador: String,
    pub chave: String,
    /// Data do evento; quando ausente usa o momento da montagem.
    pub data: Option<DateTime<FixedOffset>>,
    pub tipo: String,
    pub sequencia: u32,
    pub descricao: String,
    /// Protocolo de autorização da nota (`nProt`).
    pub numero: String,
    pub justificativa: String,
    pub email: Option<String>,
    /// Identificador do lote (`idLote`).
    pub lote: u64,
}

impl Default for EventoRequest {
    fn default() -> Self {
        Self {
            ambiente: Ambiente::default(),
            modelo: Modelo::default(),
            orgao: None,
            identificador: String::new(),
            chave: String::new(),
            data: None,
            tipo: TIPO_CANCELAMENTO.to_string(),
            sequencia: 1,
            descricao: "Cancelamento".to_string(),
            numero: String::new(),
            justificativa: String::new(),
            email: None,
            lote: 1,
        }
    }
}

impl EventoRequest {
    pub const TAG_ASSINADA: &'static str = "infEvento";
    pub const ESQUEMA: &'static str = "envEventoCancNFe_v1.00.xsd";

    /// Cancelamento da nota com o protocolo e a justificativa dela.
    pub fn cancelamento(nota: &Nota) -> Self {
        let mut evento = Self::default();
        evento.copiar_nota(nota);
        evento
    }

    /// Copia da nota os campos de identificação.
    pub fn copiar_nota(&mut self, nota: &Nota) {
        self.ambiente = nota.ambiente;
        self.modelo = nota.modelo;
        self.chave = nota.id.clone();
        self.identificador = nota.cnpj.clone();
        if let Some(numero) = nota.protocolo.as_ref().and_then(|p| p.numero.clone()) {
            self.numero = numero;
        }
        if let Some(justificativa) = &nota.justificativa {
            self.justificativa = justificativa.clone();
        }
    }

    /// `ID` + tipo + chave + sequência com dois dígitos.
    pub fn get_id(&self) -> String {
        format!("ID{}{}{:02}", self.tipo, self.chave, self.sequencia)
    }

    pub fn orgao(&self) -> Result<u8, SefazError> {
        if let Some(orgao) = self.orgao {
            return Ok(orgao);
        }
        self.chave
            .get(..2)
            .and_then(|uf| uf.parse().ok())
            .ok_or_else(|| SefazError::Formato(format!("chave \"{}\" sem código de UF", self.chave)))
    }

    pub fn get_node(&self) -> Result<Elemento, SefazError> {
        let autor = if self.identificador.len() == 11 { "CPF" } else { "CNPJ" };
        let data = self.data.unwrap_or_else(util::agora);
        let detalhe = Elemento::novo("detEvento")
            .atributo("versao", VERSAO_EVENTO)
            .folha("descEvento", &self.descricao)
            .folha("nProt", &self.numero)
            .folha("xJust", &self.justificativa);
        let info = Elemento::novo(Self::TAG_ASSINADA)
            .atributo("Id", self.get_id())
            .folha("cOrgao", self.orgao()?)
            .folha("tpAmb", self.ambiente.codigo())
            .folha(autor, &self.identificador)
            .folha("chNFe", &self.chave)
            .folha("dhEvento", util::formatar_data(&data))
            .folha("tpEvento", &self.tipo)
            .folha("nSeqEvento", self.sequencia)
            .folha("verEvento", VERSAO_EVENTO)
            .filho(detalhe);
        let evento = Elemento::novo("evento")
            .atributo("xmlns", NS_NFE)
            .atributo("versao", VERSAO_EVENTO)
            .filho(info);
        Ok(Elemento::novo("envEvento")
            .atributo("xmlns", NS_NFE)
            .atributo("versao", VERSAO_EVENTO)
            .folha("idLote", self.lote)
            .filho(evento))
    }

    /// Assina, valida e envia o evento, devolvendo o lote e o detalhe do
    /// registro. O resultado sempre é devolvido; quem chama confere
    /// [`EventoResult::is_cancelado`].
    pub async fn envia(&self, sv: &Servicos<impl Transporte>) -> Result<EventoResult, SefazError> {
        let xml = self.get_node()?.to_xml();
        let assinado = sv.assinador.assinar(&xml, Self::TAG_ASSINADA)?;
        sv.validar(&assinado, Self::ESQUEMA)?;
        let resposta = Envio::new(Servico::Evento, self.ambiente, self.modelo, assinado.clone())
            .envia(sv)
            .await?;

        let mut lote = Retorno::default();
        lote.load_node(&resposta)?;
        let informacao = match resposta.buscar("retEvento").and_then(|r| r.buscar("infEvento")) {
            Some(info) => EventoInfo::load_node(info)?,
            None => EventoInfo {
                retorno: lote.clone(),
                chave: self.chave.clone(),
                tipo: self.tipo.clone(),
                sequencia: Some(self.sequencia),
                ..Default::default()
            },
        };

        let documento = if informacao.is_cancelado() {
            info!(chave = %self.chave, protocolo = ?informacao.numero, "cancelamento registrado");
            Some(self.add_informacao(&assinado, &informacao)?)
        } else {
            None
        };
        Ok(EventoResult {
            lote,
            informacao,
            documento,
        })
    }

    /// `procEventoNFe` com o evento assinado e o `retEvento`.
    pub fn add_informacao(&self, assinado: &str, informacao: &EventoInfo) -> Result<String, SefazError> {
        let evento = xml::extrair(assinado, "evento")
            .ok_or_else(|| SefazError::tag_ausente("evento", "Evento"))?;
        let conteudo = format!("{evento}{}", informacao.get_node().to_xml());
        Ok(xml::envolver(
            "procEventoNFe",
            &[("xmlns", NS_NFE), ("versao", VERSAO_EVENTO)],
            &conteudo,
        ))
    }
}

/// Detalhe de um evento registrado (`retEvento/infEvento`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventoInfo {
    #[serde(flatten)]
    pub retorno: Retorno,
    pub id: Option<String>,
    pub orgao: Option<u8>,
    pub chave: String,
    pub tipo: String,
    pub descricao: Option<String>,
    pub sequencia: Option<u32>,
    /// Data de registro (`dhRegEvento`).
    pub data: Option<DateTime<FixedOffset>>,
    pub numero: Option<String>,
    /// Documento do destinatário.
    pub identificador: Option<String>,
    pub email: Option<String>,
}

impl EventoInfo {
    pub fn is_cancelado(&self) -> bool {
        codigos::EVENTO_CANCELADO.contains(&self.retorno.status())
    }

    pub fn load_node(elemento: &Elemento) -> Result<Self, SefazError> {
        let mut retorno = Retorno::default();
        retorno.load_node(elemento)?;
        let numero = |tag: &str| -> Result<Option<u32>, SefazError> {
            elemento
                .valor(tag)
                .map(|v| {
                    v.trim()
                        .parse()
                        .map_err(|_| SefazError::Formato(format!("{tag} \"{v}\" inválido")))
                })
                .transpose()
        };
        Ok(Self {
            id: elemento.attr("Id").map(str::to_string),
            orgao: numero("cOrgao")?.and_then(|o| u8::try_from(o).ok()),
            chave: elemento.valor("chNFe").unwrap_or_default().to_string(),
            tipo: elemento.valor("tpEvento").unwrap_or_default().to_string(),
            descricao: elemento.valor("xEvento").map(str::to_string),
            sequencia: numero("nSeqEvento")?,
            data: elemento.valor("dhRegEvento").map(util::parse_data).transpose()?,
            numero: elemento.valor("nProt").map(str::to_string),
            identificador: elemento
                .valor("CNPJDest")
                .or_else(|| elemento.valor("CPFDest"))
                .map(str::to_string),
            email: elemento.valor("emailDest").map(str::to_string),
            retorno,
        })
    }

    /// `retEvento` na ordem do leiaute.
    pub fn get_node(&self) -> Elemento {
        let status = &self.retorno.status;
        let destino = self.identificador.as_deref().map(|doc| {
            if doc.len() == 11 { ("CPFDest", doc) } else { ("CNPJDest", doc) }
        });
        let mut info = Elemento::novo("infEvento");
        if let Some(id) = &self.id {
            info = info.atributo("Id", id);
        }
        info = info
            .folha("tpAmb", status.ambiente.codigo())
            .folha_opcional("verAplic", status.versao.as_deref())
            .folha_opcional("cOrgao", self.orgao)
            .folha_opcional("cStat", status.status.as_deref())
            .folha_opcional("xMotivo", status.motivo.as_deref())
            .folha("chNFe", &self.chave)
            .folha("tpEvento", &self.tipo)
            .folha_opcional("xEvento", self.descricao.as_deref())
            .folha_opcional("nSeqEvento", self.sequencia);
        if let Some((tag, doc)) = destino {
            info = info.folha(tag, doc);
        }
        info = info
            .folha_opcional("emailDest", self.email.as_deref())
            .folha_opcional("dhRegEvento", self.data.as_ref().map(util::formatar_data))
            .folha_opcional("nProt", self.numero.as_deref());
        Elemento::novo("retEvento")
            .atributo("versao", VERSAO_EVENTO)
            .filho(info)
    }
}

/// Resultado do envio de um evento.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventoResult {
    /// Cabeçalho do lote (`retEnvEvento`).
    pub lote: Retorno,
    pub informacao: EventoInfo,
    /// `procEventoNFe` para arquivo, quando o evento foi registrado.
    pub documento: Option<String>,
}

impl EventoResult {
    /// Lote de eventos processado (128).
    pub fn is_processado(&self) -> bool {
        codigos::EVENTO_PROCESSADO.contains(&self.lote.status())
    }

    pub fn is_cancelado(&self) -> bool {
        self.informacao.is_cancelado()
    }
}
