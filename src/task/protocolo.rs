use serde::{Deserialize, Serialize};

use super::retorno::Retorno;
use crate::error::SefazError;
use crate::nota::VERSAO;
use crate::util;
use crate::xml::Elemento;

/// Protocolo de autorização, denegação ou rejeição de uma nota.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocolo {
    #[serde(flatten)]
    pub retorno: Retorno,
    /// Chave de acesso com 44 dígitos.
    pub chave: String,
    /// Digest do XML autorizado (`digVal`).
    pub validacao: Option<String>,
    /// Número do protocolo (`nProt`).
    pub numero: Option<String>,
    pub mensagem: Option<String>,
    pub codigo: Option<String>,
}

impl Protocolo {
    pub const TAG_INFO: &'static str = "infProt";

    /// Lê o primeiro `infProt` de `elemento`.
    pub fn load_node(elemento: &Elemento) -> Result<Self, SefazError> {
        let info = elemento
            .buscar(Self::TAG_INFO)
            .ok_or_else(|| SefazError::tag_ausente(Self::TAG_INFO, "Protocolo"))?;
        let mut retorno = Retorno::default();
        retorno.load_node(info)?;
        Ok(Self {
            retorno,
            chave: info.exigir("chNFe", "Chave")?.to_string(),
            validacao: info.valor("digVal").map(str::to_string),
            numero: info.valor("nProt").map(str::to_string),
            mensagem: info.valor("xMsg").map(str::to_string),
            codigo: info.valor("cMsg").map(str::to_string),
        })
    }

    /// `protNFe` na ordem do leiaute.
    pub fn get_node(&self) -> Elemento {
        let status = &self.retorno.status;
        let info = Elemento::novo(Self::TAG_INFO)
            .folha("tpAmb", status.ambiente.codigo())
            .folha_opcional("verAplic", status.versao.as_deref())
            .folha("chNFe", &self.chave)
            .folha_opcional(
                "dhRecbto",
                self.retorno.data_recebimento.as_ref().map(util::formatar_data),
            )
            .folha_opcional("nProt", self.numero.as_deref())
            .folha_opcional("digVal", self.validacao.as_deref())
            .folha_opcional("cStat", status.status.as_deref())
            .folha_opcional("xMotivo", status.motivo.as_deref())
            .folha_opcional("cMsg", self.codigo.as_deref())
            .folha_opcional("xMsg", self.mensagem.as_deref());
        Elemento::novo("protNFe").atributo("versao", VERSAO).filho(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Ambiente;

    const PROT: &str = r#"<protNFe versao="4.00"><infProt Id="ID141170000000001">
        <tpAmb>2</tpAmb><verAplic>PR-v4_4_9</verAplic>
        <chNFe>41170608380787000176650010000000811000000815</chNFe>
        <dhRecbto>2017-06-30T14:02:11-03:00</dhRecbto><nProt>141170000000001</nProt>
        <digVal>bm9uZQ==</digVal><cStat>100</cStat><xMotivo>Autorizado o uso da NF-e</xMotivo>
        </infProt></protNFe>"#;

    #[test]
    fn load_node_reads_protocol() {
        let protocolo = Protocolo::load_node(&Elemento::parse(PROT).unwrap()).unwrap();
        assert!(protocolo.retorno.is_autorizado());
        assert_eq!(protocolo.retorno.status.ambiente, Ambiente::Homologacao);
        assert_eq!(protocolo.chave, "41170608380787000176650010000000811000000815");
        assert_eq!(protocolo.numero.as_deref(), Some("141170000000001"));
        assert_eq!(protocolo.validacao.as_deref(), Some("bm9uZQ=="));
        assert!(protocolo.mensagem.is_none());
    }

    #[test]
    fn load_node_requires_access_key() {
        let xml = "<protNFe><infProt><cStat>100</cStat></infProt></protNFe>";
        let err = Protocolo::load_node(&Elemento::parse(xml).unwrap()).unwrap_err();
        assert!(matches!(err, SefazError::TagAusente { ref tag, .. } if tag == "chNFe"));
    }

    #[test]
    fn load_node_requires_info_block() {
        let xml = "<retConsSitNFe><cStat>100</cStat></retConsSitNFe>";
        assert!(Protocolo::load_node(&Elemento::parse(xml).unwrap()).is_err());
    }

    #[test]
    fn get_node_is_readable_again() {
        let original = Protocolo::load_node(&Elemento::parse(PROT).unwrap()).unwrap();
        let xml = original.get_node().to_xml();
        assert!(xml.starts_with(r#"<protNFe versao="4.00"><infProt><tpAmb>2</tpAmb>"#));
        let lido = Protocolo::load_node(&Elemento::parse(&xml).unwrap()).unwrap();
        assert_eq!(lido, original);
    }

    #[test]
    fn json_roundtrip() {
        let original = Protocolo::load_node(&Elemento::parse(PROT).unwrap()).unwrap();
        let json = serde_json::to_string(&original).unwrap();
        let lido: Protocolo = serde_json::from_str(&json).unwrap();
        assert_eq!(lido, original);
    }
}
