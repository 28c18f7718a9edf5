//! Inutilização de uma faixa de numeração nunca emitida.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::envio::{Envio, Servico, Servicos};
use super::retorno::{Retorno, codigos};
use crate::error::SefazError;
use crate::nota::{Modelo, VERSAO};
use crate::transporte::Transporte;
use crate::util;
use crate::xml::{self, Elemento, NS_NFE};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inutilizacao {
    /// Cabeçalho; `retorno.status.uf` guarda o código da UF do pedido.
    #[serde(flatten)]
    pub retorno: Retorno,
    /// Identificador devolvido pela SEFAZ, quando houver.
    pub id: Option<String>,
    /// Ano com quatro dígitos; o leiaute usa os dois últimos.
    pub ano: u16,
    pub cnpj: String,
    pub modelo: Modelo,
    pub serie: u32,
    pub inicio: u32,
    #[serde(rename = "final")]
    pub fim: u32,
    pub justificativa: String,
    /// Número do protocolo de inutilização (`nProt`).
    pub numero: Option<String>,
}

impl Inutilizacao {
    pub const TAG_ASSINADA: &'static str = "infInut";
    pub const ESQUEMA: &'static str = "inutNFe_v4.00.xsd";

    pub fn is_inutilizado(&self) -> bool {
        codigos::INUTILIZADO.contains(&self.retorno.status())
    }

    fn uf(&self) -> Result<u8, SefazError> {
        self.retorno
            .status
            .uf
            .ok_or_else(|| SefazError::Tarefa("UF da inutilização não informada".into()))
    }

    /// Os 41 dígitos do identificador: UF, ano, CNPJ, modelo, série, início e fim.
    pub fn gerar_id(&self) -> Result<String, SefazError> {
        if self.cnpj.len() != 14 || !self.cnpj.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SefazError::Formato(format!("CNPJ \"{}\" inválido", self.cnpj)));
        }
        Ok(format!(
            "{:02}{:02}{}{:02}{:03}{:09}{:09}",
            self.uf()?,
            self.ano % 100,
            self.cnpj,
            self.modelo.codigo(),
            self.serie,
            self.inicio,
            self.fim
        ))
    }

    pub fn get_id(&self) -> Result<String, SefazError> {
        Ok(format!("ID{}", self.gerar_id()?))
    }

    /// Dígito verificador módulo 11 de [`gerar_id`](Self::gerar_id).
    pub fn digito(&self) -> Result<u32, SefazError> {
        Ok(util::get_dac(&self.gerar_id()?))
    }

    fn validar_faixa(&self) -> Result<(), SefazError> {
        if self.inicio > self.fim {
            return Err(SefazError::Formato(format!(
                "faixa de inutilização invertida: {} a {}",
                self.inicio, self.fim
            )));
        }
        Ok(())
    }

    /// Pedido `inutNFe`.
    pub fn get_node(&self) -> Result<Elemento, SefazError> {
        let info = Elemento::novo(Self::TAG_ASSINADA)
            .atributo("Id", self.get_id()?)
            .folha("tpAmb", self.retorno.status.ambiente.codigo())
            .folha("xServ", "INUTILIZAR")
            .folha("cUF", self.uf()?)
            .folha("ano", format!("{:02}", self.ano % 100))
            .folha("CNPJ", &self.cnpj)
            .folha("mod", self.modelo.codigo())
            .folha("serie", self.serie)
            .folha("nNFIni", self.inicio)
            .folha("nNFFin", self.fim)
            .folha("xJust", &self.justificativa);
        Ok(Elemento::novo("inutNFe")
            .atributo("xmlns", NS_NFE)
            .atributo("versao", VERSAO)
            .filho(info))
    }

    /// Envia o pedido e devolve a inutilização registrada junto com o
    /// `procInutNFe` para arquivo. Qualquer código fora de 102/563 é rejeição.
    pub async fn envia(
        &self,
        sv: &Servicos<impl Transporte>,
    ) -> Result<(Inutilizacao, String), SefazError> {
        self.validar_faixa()?;
        let xml = self.get_node()?.to_xml();
        let assinado = sv.assinador.assinar(&xml, Self::TAG_ASSINADA)?;
        sv.validar(&assinado, Self::ESQUEMA)?;
        let resposta = Envio::new(
            Servico::Inutilizacao,
            self.retorno.status.ambiente,
            self.modelo,
            assinado.clone(),
        )
        .envia(sv)
        .await?;

        let info = resposta.buscar(Self::TAG_ASSINADA).unwrap_or(&resposta);
        let mut registrada = self.clone();
        registrada.retorno.load_node(info)?;
        if registrada.retorno.status.uf.is_none() {
            registrada.retorno.status.uf = self.retorno.status.uf;
        }
        if !registrada.is_inutilizado() {
            return Err(registrada.retorno.rejeicao());
        }
        registrada.id = info.attr("Id").map(str::to_string);
        registrada.numero = info.valor("nProt").map(str::to_string);
        info!(
            serie = registrada.serie,
            inicio = registrada.inicio,
            fim = registrada.fim,
            protocolo = ?registrada.numero,
            "numeração inutilizada"
        );

        let documento = registrada.add_informacao(&assinado)?;
        Ok((registrada, documento))
    }

    /// `retInutNFe` montado campo a campo: status da resposta, faixa do
    /// pedido e protocolo, sem `Id`, `xServ` nem `xJust`.
    pub fn get_retorno_node(&self) -> Result<Elemento, SefazError> {
        let status = &self.retorno.status;
        let info = Elemento::novo(Self::TAG_ASSINADA)
            .folha("tpAmb", status.ambiente.codigo())
            .folha_opcional("verAplic", status.versao.as_deref())
            .folha_opcional("cStat", status.status.as_deref())
            .folha_opcional("xMotivo", status.motivo.as_deref())
            .folha("cUF", self.uf()?)
            .folha("ano", format!("{:02}", self.ano % 100))
            .folha("CNPJ", &self.cnpj)
            .folha("mod", self.modelo.codigo())
            .folha("serie", self.serie)
            .folha("nNFIni", self.inicio)
            .folha("nNFFin", self.fim)
            .folha_opcional(
                "dhRecbto",
                self.retorno.data_recebimento.as_ref().map(util::formatar_data),
            )
            .folha_opcional("nProt", self.numero.as_deref());
        Ok(Elemento::novo("retInutNFe")
            .atributo("versao", VERSAO)
            .filho(info))
    }

    /// `procInutNFe` com o pedido assinado e o retorno.
    pub fn add_informacao(&self, assinado: &str) -> Result<String, SefazError> {
        let pedido = xml::extrair(assinado, "inutNFe")
            .ok_or_else(|| SefazError::tag_ausente("inutNFe", "Inutilizacao"))?;
        let conteudo = format!("{pedido}{}", self.get_retorno_node()?.to_xml());
        Ok(xml::envolver(
            "procInutNFe",
            &[("xmlns", NS_NFE), ("versao", VERSAO)],
            &conteudo,
        ))
    }
}
