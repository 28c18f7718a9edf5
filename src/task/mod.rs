//! Requisições aos serviços da SEFAZ e interpretação das respostas.
//!
//! Cada tipo de resposta carrega um [`Retorno`] comum; a interpretação de uma
//! chamada resulta em uma variante de [`Resposta`].

pub mod autorizacao;
pub mod envio;
pub mod evento;
pub mod inutilizacao;
pub mod protocolo;
pub mod recibo;
pub mod resposta;
pub mod retorno;
pub mod situacao;
pub mod status;
pub mod tarefa;

pub use autorizacao::Autorizacao;
pub use envio::{Envio, Servico, Servicos};
pub use evento::{EventoInfo, EventoRequest, EventoResult};
pub use inutilizacao::Inutilizacao;
pub use protocolo::Protocolo;
pub use recibo::Recibo;
pub use resposta::Resposta;
pub use retorno::{Desfecho, Retorno, codigos};
pub use situacao::Situacao;
pub use status::{Ambiente, Status};
pub use tarefa::{Acao, Agente, Tarefa};
