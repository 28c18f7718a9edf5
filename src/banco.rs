//! Consulta de endereços de serviço e persistência de notas e tarefas.
//!
//! [`Banco`] resolve, para uma combinação de emissão, UF, modelo e ambiente,
//! o mapa de serviços disponíveis com URL e versão. [`BancoEstatico`] atende
//! essa consulta a partir da tabela `[[servicos]]` da configuração.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::SefazError;
use crate::nota::{Emissao, Modelo, Nota};
use crate::task::{Ambiente, Servico, Tarefa};
use crate::util;

/// Endereço e versão de um serviço.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InformacaoServico {
    pub url: String,
    pub versao: String,
}

/// Linha da tabela de serviços.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntradaServico {
    #[serde(default)]
    pub emissao: Emissao,
    pub uf: String,
    pub modelo: Modelo,
    pub ambiente: Ambiente,
    pub servico: Servico,
    pub url: String,
    pub versao: String,
}

pub trait Banco {
    fn informacao_servico(
        &self,
        emissao: Emissao,
        uf: &str,
        modelo: Modelo,
        ambiente: Ambiente,
    ) -> Result<HashMap<Servico, InformacaoServico>, SefazError>;

    fn codigo_estado(&self, uf: &str) -> Result<u8, SefazError> {
        util::codigo_uf(uf)
    }

    fn codigo_municipio(&self, nome: &str, uf: &str) -> Result<u32, SefazError>;
}

/// Fonte das notas e tarefas processadas em lote.
pub trait Persistencia {
    fn notas_abertas(&self) -> Result<Vec<Nota>, SefazError>;
    fn notas_pendentes(&self) -> Result<Vec<Tarefa>, SefazError>;
    fn notas_tarefas(&self) -> Result<Vec<Tarefa>, SefazError>;
}

/// Município conhecido pelo [`BancoEstatico`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Municipio {
    pub nome: String,
    pub uf: String,
    pub codigo: u32,
}

#[derive(Debug, Clone, Default)]
pub struct BancoEstatico {
    servicos: Vec<EntradaServico>,
    municipios: Vec<Municipio>,
}

impl BancoEstatico {
    pub fn new(servicos: Vec<EntradaServico>) -> Self {
        Self {
            servicos,
            municipios: Vec::new(),
        }
    }

    pub fn com_municipios(mut self, municipios: Vec<Municipio>) -> Self {
        self.municipios = municipios;
        self
    }
}

impl Banco for BancoEstatico {
    fn informacao_servico(
        &self,
        emissao: Emissao,
        uf: &str,
        modelo: Modelo,
        ambiente: Ambiente,
    ) -> Result<HashMap<Servico, InformacaoServico>, SefazError> {
        Ok(self
            .servicos
            .iter()
            .filter(|e| {
                e.emissao == emissao
                    && e.modelo == modelo
                    && e.ambiente == ambiente
                    && e.uf.eq_ignore_ascii_case(uf)
            })
            .map(|e| {
                (
                    e.servico,
                    InformacaoServico {
                        url: e.url.clone(),
                        versao: e.versao.clone(),
                    },
                )
            })
            .collect())
    }

    fn codigo_municipio(&self, nome: &str, uf: &str) -> Result<u32, SefazError> {
        self.municipios
            .iter()
            .find(|m| m.uf.eq_ignore_ascii_case(uf) && m.nome.eq_ignore_ascii_case(nome))
            .map(|m| m.codigo)
            .ok_or_else(|| {
                SefazError::Formato(format!("município \"{nome}\" não encontrado em \"{uf}\""))
            })
    }
}
