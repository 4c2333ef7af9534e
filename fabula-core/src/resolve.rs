//! # Resolução de Sobreposições
//!
//! Os padrões são redundantes de propósito (com e sem `:` opcional, token único
//! e prefixo+sufixo), então a mesma menção costuma gerar vários candidatos.
//! Esta etapa reduz os candidatos de uma janela a um conjunto sem sobreposição:
//!
//! 1. ordena por `(início, -comprimento)` (ordenação estável);
//! 2. mantém o primeiro;
//! 3. para cada seguinte, compara com o **último mantido**:
//!    - mesmo início → descarta (é mais curto ou igual);
//!    - começa depois do fim do último → mantém;
//!    - termina dentro do último → descarta;
//!    - sobreposição parcial → descarta.
//!
//! Uma varredura só, `O(n log n)` pela ordenação.

use crate::extract::Candidate;

/// Conjunto final, sem sobreposição, de uma janela. A ordem de saída é por início.
pub fn resolve_overlaps(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by_key(|c| (c.start_char, std::cmp::Reverse(c.char_len())));

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        // mesmo início, aninhado ou parcial: o último mantido vence
        let keep = match kept.last() {
            None => true,
            Some(last) => candidate.start_char != last.start_char && candidate.start_char >= last.end_char,
        };
        if keep {
            kept.push(candidate);
        }
    }
    kept
}
