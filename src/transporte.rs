//! Transporte HTTP das requisições para a SEFAZ e para o SAT.
//!
//! O [`HttpTransporte`] envolve o corpo em um envelope SOAP 1.2 (exceto para
//! o SAT), envia com o certificado do cliente e distingue duas falhas:
//! [`TransporteError::NaoEnviado`] quando a requisição certamente não chegou
//! e [`TransporteError::Incompleto`] quando ela partiu mas a resposta não foi
//! obtida.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Identity, StatusCode};
use thiserror::Error;

use crate::config::Configuracao;
use crate::error::SefazError;
use crate::xml::Elemento;

const SOAP_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

#[derive(Debug, Error)]
pub enum TransporteError {
    /// Conexão recusada, DNS, TLS, HTTP 4xx ou 503.
    #[error("requisição não enviada: {0}")]
    NaoEnviado(String),

    /// Tempo esgotado, corpo ilegível ou outro erro do servidor depois do envio.
    #[error("requisição incompleta: {0}")]
    Incompleto(String),
}

#[allow(async_fn_in_trait)]
pub trait Transporte {
    /// Envia `corpo` para `url` e devolve o conteúdo da resposta.
    async fn post(&self, url: &str, corpo: &str, sat: bool) -> Result<Elemento, TransporteError>;
}

pub struct HttpTransporte {
    client: Client,
}

impl HttpTransporte {
    pub fn new(config: &Configuracao) -> Result<Self, SefazError> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(config.tempo_limite))
            .timeout(Duration::from_secs(config.tempo_limite_total()));

        if let Some(caminho) = &config.certificado {
            let der = std::fs::read(caminho)
                .map_err(|e| SefazError::Certificado(format!("{}: {e}", caminho.display())))?;
            let identidade = Identity::from_pkcs12_der(&der, &config.senha_certificado)
                .map_err(|e| SefazError::Certificado(e.to_string()))?;
            builder = builder.identity(identidade);
        }

        let client = builder
            .build()
            .map_err(|e| SefazError::Certificado(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transporte for HttpTransporte {
    async fn post(&self, url: &str, corpo: &str, sat: bool) -> Result<Elemento, TransporteError> {
        let (corpo, tipo) = if sat {
            (corpo.to_string(), "application/xml; charset=utf-8")
        } else {
            (envelope(corpo), "application/soap+xml; charset=utf-8")
        };

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, tipo)
            .body(corpo)
            .send()
            .await
            .map_err(classificar)?;

        let status = response.status();
        if !status.is_success() {
            let motivo = format!("HTTP {} em {url}", status.as_u16());
            return Err(classificar_status(status, motivo));
        }

        let texto = response
            .text()
            .await
            .map_err(|e| TransporteError::Incompleto(e.to_string()))?;
        let raiz = Elemento::parse(&texto)
            .map_err(|e| TransporteError::Incompleto(format!("resposta ilegível: {e}")))?;
        Ok(desembrulhar(raiz))
    }
}

fn classificar(err: reqwest::Error) -> TransporteError {
    if err.is_connect() || err.is_builder() {
        TransporteError::NaoEnviado(err.to_string())
    } else {
        TransporteError::Incompleto(err.to_string())
    }
}

// 4xx e 503 recusam a requisição antes de processá-la; qualquer outro erro
// do servidor deixa o resultado desconhecido.
fn classificar_status(status: StatusCode, motivo: String) -> TransporteError {
    if status.is_client_error() || status == StatusCode::SERVICE_UNAVAILABLE {
        TransporteError::NaoEnviado(motivo)
    } else {
        TransporteError::Incompleto(motivo)
    }
}

pub fn envelope(corpo: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <soap12:Envelope xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\" xmlns:soap12=\"{SOAP_NS}\">\
         <soap12:Body>{corpo}</soap12:Body></soap12:Envelope>"
    )
}

/// Primeiro elemento dentro do `Body`; respostas sem envelope voltam inteiras.
fn desembrulhar(raiz: Elemento) -> Elemento {
    if let Some(conteudo) = raiz.buscar("Body").and_then(Elemento::primeiro_filho) {
        return conteudo.clone();
    }
    raiz
}
