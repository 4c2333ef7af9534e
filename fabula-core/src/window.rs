//! # Janelas de Contexto
//!
//! Números de série e calibres só interessam perto de uma menção de arma. Para
//! cada entidade, a busca roda numa janela simétrica de `radius` tokens de cada
//! lado do span, cortada nos limites do documento:
//!
//! ```text
//! start = max(0, ent.start_token - radius)
//! end   = min(len, ent.end_token + radius)
//! ```
//!
//! Isso troca um pouco de *recall* por precisão e limita o custo a
//! `O(entidades × radius)` em vez de `O(tamanho do documento)`.

use crate::compiler::CompiledTable;
use crate::document::{Document, EntitySpan};
use crate::matcher::{find_matches, RawMatch};

/// Intervalo semiaberto de tokens do documento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub fn around(entity: &EntitySpan, doc_len: usize, radius: usize) -> Self {
        let start = entity.start_token.saturating_sub(radius).min(doc_len);
        let end = entity.end_token.saturating_add(radius).min(doc_len);
        Self { start, end: end.max(start) }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Roda o matcher na janela da entidade e devolve as correspondências já em
/// índices absolutos de token.
pub fn window_matches(doc: &Document, entity: &EntitySpan, table: &CompiledTable, radius: usize) -> Vec<RawMatch> {
    let window = Window::around(entity, doc.len(), radius);
    let mut matches = find_matches(&doc.tokens[window.start..window.end], table);
    for m in &mut matches {
        m.start += window.start;
        m.end += window.start;
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::pattern::serial_number_table;

    fn entity(start_token: usize, end_token: usize) -> EntitySpan {
        EntitySpan {
            text: String::new(),
            label: "WEAPON_FIREARM".into(),
            start_token,
            end_token,
            start_char: 0,
            end_char: 0,
        }
    }

    #[test]
    fn test_window_is_clamped_to_document() {
        assert_eq!(Window::around(&entity(2, 3), 10, 25), Window { start: 0, end: 10 });
        assert_eq!(Window::around(&entity(40, 41), 100, 25), Window { start: 15, end: 66 });
        assert_eq!(Window::around(&entity(98, 100), 100, 5), Window { start: 93, end: 100 });
    }

    #[test]
    fn test_zero_radius_covers_only_the_entity() {
        let window = Window::around(&entity(3, 5), 10, 0);
        assert_eq!(window, Window { start: 3, end: 5 });
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_matches_translated_to_absolute_indices() {
        let doc = Document::from_text("a b c пістолет № 123 d e f g").with_entity(3, 4, "WEAPON_FIREARM");
        let compiled = compile(&serial_number_table());
        let matches = window_matches(&doc, &doc.entities[0], &compiled, 2);
        assert!(!matches.is_empty());
        assert!(matches.iter().all(|m| m.start == 4 && m.end == 6));
    }

    #[test]
    fn test_match_outside_window_is_not_seen() {
        let doc = Document::from_text("№ 123 x x x x пістолет").with_entity(6, 7, "WEAPON_FIREARM");
        let compiled = compile(&serial_number_table());
        assert!(window_matches(&doc, &doc.entities[0], &compiled, 2).is_empty());
        assert!(!window_matches(&doc, &doc.entities[0], &compiled, 6).is_empty());
    }
}
