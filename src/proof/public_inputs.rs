//! Proof Public Inputs
//!
//! Encodes a question (and optionally the claimant) into field elements for
//! the verifier. The template half is fixed when the question is added and
//! never depends on who answers; the claimant is appended at answer time.
//!
//! Layout: `[qid_hi, qid_lo, tier, module, claimant?]`

use serde::{Deserialize, Serialize};

use crate::core::field::{FieldElement, FIELD_BYTES};
use crate::core::identity::{Address, QuestionId};

/// Elements in a question template.
pub const TEMPLATE_ELEMENT_COUNT: usize = 4;

/// Number of public inputs for a given binding mode.
pub const fn public_input_count(bind_claimant: bool) -> usize {
    if bind_claimant {
        TEMPLATE_ELEMENT_COUNT + 1
    } else {
        TEMPLATE_ELEMENT_COUNT
    }
}

/// Player-independent part of the public inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionTemplate {
    /// High 16 bytes of the question id.
    pub question_hi: FieldElement,
    /// Low 16 bytes of the question id.
    pub question_lo: FieldElement,
    /// Difficulty tier.
    pub tier: FieldElement,
    /// Module the question belongs to.
    pub module: FieldElement,
}

impl QuestionTemplate {
    /// Derive the template for a question stored in `module`.
    ///
    /// Every element is at most 160 bits wide, so the template is always
    /// canonical in the scalar field.
    pub fn derive(module: &Address, id: &QuestionId, tier: u8) -> Self {
        let (hi, lo) = id.halves();
        Self {
            question_hi: embed(&hi),
            question_lo: embed(&lo),
            tier: FieldElement::from_u64(tier as u64),
            module: address_element(module),
        }
    }

    /// Elements in layout order.
    pub fn to_array(&self) -> [FieldElement; TEMPLATE_ELEMENT_COUNT] {
        [self.question_hi, self.question_lo, self.tier, self.module]
    }
}

/// Full public-input vector for one answer attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPublicInputs {
    /// Question template.
    pub template: QuestionTemplate,
    /// Claimant binding, if enabled.
    pub claimant: Option<FieldElement>,
}

impl QuestionPublicInputs {
    /// Inputs without claimant binding.
    pub fn unbound(template: QuestionTemplate) -> Self {
        Self { template, claimant: None }
    }

    /// Inputs bound to the answering player.
    pub fn bound(template: QuestionTemplate, claimant: &Address) -> Self {
        Self {
            template,
            claimant: Some(address_element(claimant)),
        }
    }

    /// Number of field elements.
    pub fn len(&self) -> usize {
        public_input_count(self.claimant.is_some())
    }

    /// Never empty; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Flatten to the verifier's input vector.
    pub fn to_field_elements(&self) -> Vec<FieldElement> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.template.to_array());
        if let Some(claimant) = self.claimant {
            out.push(claimant);
        }
        out
    }

    /// Serialize to bytes (32 bytes per element, big-endian).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_field_elements()
            .iter()
            .flat_map(|e| e.0)
            .collect()
    }

    /// Deserialize from bytes produced by `to_bytes`.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let elements: Vec<FieldElement> = data
            .chunks_exact(FIELD_BYTES)
            .filter_map(FieldElement::from_be_slice)
            .collect();
        if data.len() % FIELD_BYTES != 0 {
            return None;
        }

        let template = QuestionTemplate {
            question_hi: *elements.first()?,
            question_lo: *elements.get(1)?,
            tier: *elements.get(2)?,
            module: *elements.get(3)?,
        };
        match elements.len() {
            TEMPLATE_ELEMENT_COUNT => Some(Self::unbound(template)),
            n if n == TEMPLATE_ELEMENT_COUNT + 1 => Some(Self {
                template,
                claimant: Some(elements[TEMPLATE_ELEMENT_COUNT]),
            }),
            _ => None,
        }
    }
}

/// Embed an address as a 160-bit field element.
pub fn address_element(address: &Address) -> FieldElement {
    embed(address.as_bytes())
}

fn embed(bytes: &[u8]) -> FieldElement {
    // Callers only pass 16 or 20 byte slices
    FieldElement::from_be_slice(bytes).unwrap_or(FieldElement::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> Address {
        Address::new([0xAB; 20])
    }

    #[test]
    fn test_template_layout() {
        let id = QuestionId::from_label("sieve-1").unwrap();
        let template = QuestionTemplate::derive(&module(), &id, 3);

        let (hi, lo) = id.halves();
        assert_eq!(&template.question_hi.0[16..], &hi);
        assert_eq!(&template.question_lo.0[16..], &lo);
        assert_eq!(template.tier, FieldElement::from_u64(3));
        assert_eq!(&template.module.0[12..], module().as_bytes());

        for element in template.to_array() {
            assert!(element.is_canonical_scalar());
        }
    }

    #[test]
    fn test_template_is_deterministic_and_distinct() {
        let a = QuestionId::from_label("a").unwrap();
        let b = QuestionId::from_label("b").unwrap();

        assert_eq!(
            QuestionTemplate::derive(&module(), &a, 1),
            QuestionTemplate::derive(&module(), &a, 1)
        );
        assert_ne!(
            QuestionTemplate::derive(&module(), &a, 1),
            QuestionTemplate::derive(&module(), &b, 1)
        );
        assert_ne!(
            QuestionTemplate::derive(&module(), &a, 1),
            QuestionTemplate::derive(&Address::new([1; 20]), &a, 1)
        );
    }

    #[test]
    fn test_claimant_binding() {
        let id = QuestionId::from_label("q").unwrap();
        let template = QuestionTemplate::derive(&module(), &id, 0);

        let unbound = QuestionPublicInputs::unbound(template);
        assert_eq!(unbound.len(), 4);
        assert_eq!(unbound.to_field_elements().len(), 4);

        let x = QuestionPublicInputs::bound(template, &Address::new([1; 20]));
        let y = QuestionPublicInputs::bound(template, &Address::new([2; 20]));
        assert_eq!(x.len(), 5);
        assert_ne!(x.to_field_elements(), y.to_field_elements());
        assert_eq!(x.to_field_elements()[..4], y.to_field_elements()[..4]);
    }

    #[test]
    fn test_bytes_layout() {
        let id = QuestionId::from_label("q").unwrap();
        let inputs = QuestionPublicInputs::bound(
            QuestionTemplate::derive(&module(), &id, 2),
            &Address::new([7; 20]),
        );
        let bytes = inputs.to_bytes();
        assert_eq!(bytes.len(), 5 * FIELD_BYTES);
        assert_eq!(QuestionPublicInputs::from_bytes(&bytes), Some(inputs));

        assert_eq!(QuestionPublicInputs::from_bytes(&bytes[..3 * FIELD_BYTES]), None);
        assert_eq!(QuestionPublicInputs::from_bytes(&bytes[..10]), None);
    }
}
