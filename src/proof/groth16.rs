//! Groth16 Proof Shape
//!
//! The game never does curve arithmetic; it only carries proof points from
//! the wire to the verifier and rejects coordinates that cannot belong to
//! BN254 at all.

use serde::{Deserialize, Serialize};

use crate::core::field::FieldElement;

/// Affine G1 point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct G1Point {
    /// X coordinate.
    pub x: FieldElement,
    /// Y coordinate.
    pub y: FieldElement,
}

impl G1Point {
    /// Point at `(x, y)`.
    pub fn new(x: FieldElement, y: FieldElement) -> Self {
        Self { x, y }
    }

    /// The all-zero encoding (point at infinity).
    pub fn is_zero(&self) -> bool {
        self.x.is_zero() && self.y.is_zero()
    }

    fn coordinates(&self) -> [FieldElement; 2] {
        [self.x, self.y]
    }
}

/// Affine G2 point; each coordinate is an Fp2 element `[c0, c1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct G2Point {
    /// X coordinate.
    pub x: [FieldElement; 2],
    /// Y coordinate.
    pub y: [FieldElement; 2],
}

impl G2Point {
    /// Point at `(x, y)`.
    pub fn new(x: [FieldElement; 2], y: [FieldElement; 2]) -> Self {
        Self { x, y }
    }

    fn coordinates(&self) -> [FieldElement; 4] {
        [self.x[0], self.x[1], self.y[0], self.y[1]]
    }
}

/// Proof components `(A, B, C)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Groth16Proof {
    /// `A` in G1.
    pub a: G1Point,
    /// `B` in G2.
    pub b: G2Point,
    /// `C` in G1.
    pub c: G1Point,
}

impl Groth16Proof {
    /// Build from the flat call surface:
    /// `proofA: [x, y]`, `proofB: [[x0, x1], [y0, y1]]`, `proofC: [x, y]`.
    pub fn from_wire(
        a: [FieldElement; 2],
        b: [[FieldElement; 2]; 2],
        c: [FieldElement; 2],
    ) -> Self {
        Self {
            a: G1Point::new(a[0], a[1]),
            b: G2Point::new(b[0], b[1]),
            c: G1Point::new(c[0], c[1]),
        }
    }

    /// Flatten back to the call surface.
    pub fn to_wire(&self) -> ([FieldElement; 2], [[FieldElement; 2]; 2], [FieldElement; 2]) {
        (
            self.a.coordinates(),
            [self.b.x, self.b.y],
            self.c.coordinates(),
        )
    }

    /// Name of the first coordinate at or above the base-field modulus.
    pub fn first_non_canonical(&self) -> Option<&'static str> {
        const NAMES: [&str; 8] = ["a.x", "a.y", "b.x0", "b.x1", "b.y0", "b.y1", "c.x", "c.y"];

        self.a.coordinates()
            .into_iter()
            .chain(self.b.coordinates())
            .chain(self.c.coordinates())
            .zip(NAMES)
            .find(|(coord, _)| !coord.is_canonical_base())
            .map(|(_, name)| name)
    }

    /// Are all coordinates below the base-field modulus?
    pub fn is_well_formed(&self) -> bool {
        self.first_non_canonical().is_none()
    }

    /// Bytes fed to commitments over the proof (A then B).
    pub(crate) fn ab_bytes(&self) -> Vec<u8> {
        self.a.coordinates()
            .into_iter()
            .chain(self.b.coordinates())
            .flat_map(|e| e.0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::BN254_BASE_MODULUS;

    fn fe(n: u64) -> FieldElement {
        FieldElement::from_u64(n)
    }

    #[test]
    fn test_wire_layout() {
        let proof = Groth16Proof::from_wire(
            [fe(1), fe(2)],
            [[fe(3), fe(4)], [fe(5), fe(6)]],
            [fe(7), fe(8)],
        );
        assert_eq!(proof.a, G1Point::new(fe(1), fe(2)));
        assert_eq!(proof.b.x, [fe(3), fe(4)]);
        assert_eq!(proof.b.y, [fe(5), fe(6)]);
        assert_eq!(proof.c, G1Point::new(fe(7), fe(8)));

        let (a, b, c) = proof.to_wire();
        assert_eq!(Groth16Proof::from_wire(a, b, c), proof);
    }

    #[test]
    fn test_non_canonical_coordinate_reported() {
        let mut proof = Groth16Proof::from_wire(
            [fe(1), fe(2)],
            [[fe(3), fe(4)], [fe(5), fe(6)]],
            [fe(7), fe(8)],
        );
        assert!(proof.is_well_formed());

        proof.b.y[1] = FieldElement::new(BN254_BASE_MODULUS);
        assert_eq!(proof.first_non_canonical(), Some("b.y1"));

        proof.a.x = FieldElement::new([0xff; 32]);
        assert_eq!(proof.first_non_canonical(), Some("a.x"));
    }

    #[test]
    fn test_json_shape() {
        let proof = Groth16Proof::default();
        let json = serde_json::to_value(proof).unwrap();
        assert!(json["a"]["x"].is_string());
        assert_eq!(json["b"]["x"].as_array().unwrap().len(), 2);
        assert!(proof.a.is_zero());
    }
}
