//! # fabula-core — Extração de Atributos de Armas
//!
//! Este crate extrai atributos estruturados de armas (números de série e
//! calibres) de narrativas livres de ocorrências ("fabulas"), ancorados nas
//! menções a armas encontradas por um modelo NER.
//!
//! ## Arquitetura
//!
//! O núcleo é um motor de regras declarativo. Os dados fluem por estágios
//! independentes:
//!
//! 1.  **Documento** ([`document`], [`tokenizer`]): tokens com offsets em
//!     caracteres e os spans de entidade vindos do reconhecedor.
//! 2.  **Padrões** ([`pattern`]): tabelas de predicados de token, como dados.
//! 3.  **Compilação** ([`compiler`]): regexes compilados uma vez, dicas de
//!     extração removidas, padrões inválidos descartados.
//! 4.  **Janelas** ([`window`]): para cada entidade, `±W` tokens de contexto.
//! 5.  **Casamento** ([`matcher`]): todas as correspondências de todos os padrões.
//! 6.  **Valor** ([`extract`]): corta os marcadores ou aplica o regex auxiliar.
//! 7.  **Resolução** ([`resolve`]): o conjunto final, sem sobreposições.
//!
//! O [`Extractor`] reúne tudo num contexto imutável, compartilhável entre
//! threads. Em volta do núcleo ficam o reconhecedor de entidades
//! ([`recognizer`]), as estatísticas persistidas ([`stats`]) e a
//! configuração ([`config`]).
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use fabula_core::{EntityRecognizer, Extractor, LexiconRecognizer};
//!
//! let recognizer = LexiconRecognizer::new();
//! let extractor = Extractor::default();
//!
//! let doc = recognizer.recognize("Вилучено пістолет ПМ № АБ 123456, калібр 9 мм").unwrap();
//! let analysis = extractor.analyze(&doc);
//!
//! assert_eq!(analysis.entities[0].1, "WEAPON_FIREARM");
//! assert_eq!(analysis.serial_numbers[0].value, "АБ 123456");
//! assert_eq!(analysis.calibers[0].value, "9");
//! ```

pub mod compiler;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod pattern;
pub mod recognizer;
pub mod resolve;
pub mod stats;
pub mod tokenizer;
pub mod window;

pub use config::{EngineConfig, ServiceConfig};
pub use document::{Document, EntitySpan};
pub use engine::{DocumentAnalysis, ExtractedAttribute, Extractor};
pub use error::{CompileError, ConfigError, ExtractionError, PatternLoadError, RecognizeError, StatsError};
pub use pattern::{AttributeKind, PatternId, PatternTable};
pub use recognizer::{EntityRecognizer, LexiconRecognizer};
pub use stats::{StatsManager, StatsSnapshot};
pub use tokenizer::{tokenize, Token};
