//! Cliente de autorização, consulta e eventos de documentos fiscais
//! eletrônicos (NFe, NFCe e CFe/SAT) junto à SEFAZ.
//!
//! O núcleo está em [`task`], com uma resposta por tipo de serviço, e em
//! [`sefaz`], que percorre lotes de notas e tarefas e avisa um [`Ouvinte`]
//! a cada passo. Geração do XML, assinatura, consulta de endereços e
//! transporte são colaboradores injetados por [`task::Servicos`].

pub mod assinador;
pub mod banco;
pub mod config;
pub mod error;
pub mod nota;
pub mod sefaz;
pub mod task;
pub mod transporte;
pub mod util;
pub mod xml;

#[cfg(test)]
mod testes;

pub use config::Configuracao;
pub use error::SefazError;
pub use nota::{Emissao, Gerador, Modelo, Nota};
pub use sefaz::{Ouvinte, OuvinteLog, Processamento, Sefaz};
