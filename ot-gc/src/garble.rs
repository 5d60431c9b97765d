//! Yao garbling over [`crate::circuit::Circuit`]: free-XOR (and free
//! NOT) plus a classic point-and-permute four-row table for AND gates.
//! This is the textbook construction rather than the half-gates
//! optimisation — simpler to get right without a test run, at the cost
//! of two extra ciphertexts per AND gate.

use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::circuit::{Circuit, Gate};

pub const LABEL_LEN: usize = 16;
pub type Label = [u8; LABEL_LEN];

fn xor(a: Label, b: Label) -> Label {
    let mut out = [0u8; LABEL_LEN];
    for i in 0..LABEL_LEN {
        out[i] = a[i] ^ b[i];
    }
    out
}

fn lsb(label: &Label) -> usize {
    (label[0] & 1) as usize
}

fn gate_pad(a: &Label, b: &Label, gate_index: usize) -> Label {
    let digest = Sha256::new_with_prefix(b"ot-gc/garble/and-gate")
        .chain_update((gate_index as u64).to_be_bytes())
        .chain_update(a)
        .chain_update(b)
        .finalize();
    let mut out = [0u8; LABEL_LEN];
    out.copy_from_slice(&digest[..LABEL_LEN]);
    out
}

fn random_label(rng: &mut (impl RngCore + CryptoRng)) -> Label {
    let mut out = [0u8; LABEL_LEN];
    rng.fill_bytes(&mut out);
    out
}

/// Holds the garbler's private wire labels; [`Garbler::garbled_circuit`]
/// yields the half that's safe to publish.
pub struct Garbler {
    circuit: Circuit,
    delta: Label,
    zero_labels: Vec<Label>,
    tables: Vec<Option<[Label; 4]>>,
}

impl Garbler {
    pub fn new(circuit: Circuit, rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let mut delta = random_label(rng);
        delta[0] |= 1; // free-XOR requires delta's LSB set

        let mut zero_labels = vec![[0u8; LABEL_LEN]; circuit.num_wires()];
        for label in zero_labels.iter_mut().take(circuit.num_inputs) {
            *label = random_label(rng);
        }

        let mut tables = Vec::with_capacity(circuit.gates.len());
        for (i, gate) in circuit.gates.iter().enumerate() {
            let wire = circuit.num_inputs + i;
            match *gate {
                Gate::Xor(a, b) => {
                    zero_labels[wire] = xor(zero_labels[a], zero_labels[b]);
                    tables.push(None);
                }
                Gate::Inv(a) => {
                    // Free NOT: wire c reuses a's two labels with meaning flipped.
                    zero_labels[wire] = xor(zero_labels[a], delta);
                    tables.push(None);
                }
                Gate::And(a, b) => {
                    zero_labels[wire] = random_label(rng);
                    let c0 = zero_labels[wire];
                    let c1 = xor(c0, delta);

                    let a0 = zero_labels[a];
                    let a1 = xor(a0, delta);
                    let b0 = zero_labels[b];
                    let b1 = xor(b0, delta);

                    let mut table = [[0u8; LABEL_LEN]; 4];
                    for (label_a, real_a) in [(a0, false), (a1, true)] {
                        for (label_b, real_b) in [(b0, false), (b1, true)] {
                            let row = lsb(&label_a) * 2 + lsb(&label_b);
                            let real_c = real_a && real_b;
                            let c_label = if real_c { c1 } else { c0 };
                            table[row] = xor(c_label, gate_pad(&label_a, &label_b, i));
                        }
                    }
                    tables.push(Some(table));
                }
            }
        }

        Self {
            circuit,
            delta,
            zero_labels,
            tables,
        }
    }

    /// The pair of labels for wire `wire`, `(label_for_0, label_for_1)`.
    pub fn wire_labels(&self, wire: usize) -> (Label, Label) {
        let zero = self.zero_labels[wire];
        (zero, xor(zero, self.delta))
    }

    /// Picks the label matching a known input bit, for input wires this
    /// party owns directly (no OT needed).
    pub fn input_label(&self, wire: usize, bit: bool) -> Label {
        let (zero, one) = self.wire_labels(wire);
        if bit {
            one
        } else {
            zero
        }
    }

    /// The public garbled circuit: AND-gate tables and output decoding.
    /// Input-wire and intermediate labels stay private to the garbler.
    pub fn garbled_circuit(&self) -> GarbledCircuit {
        let output_decoding = self
            .circuit
            .outputs
            .iter()
            .map(|&w| self.wire_labels(w))
            .collect();
        GarbledCircuit {
            circuit: self.circuit.clone(),
            tables: self.tables.clone(),
            output_decoding,
        }
    }
}

/// The transcript an evaluator needs: circuit topology, AND-gate tables,
/// and the output-wire label pairs used to decode the final result.
#[derive(Clone)]
pub struct GarbledCircuit {
    circuit: Circuit,
    tables: Vec<Option<[Label; 4]>>,
    output_decoding: Vec<(Label, Label)>,
}

impl GarbledCircuit {
    /// Evaluate with one label per input wire (obtained out of band: the
    /// garbler's own inputs directly, the evaluator's via OT).
    pub fn evaluate(&self, input_labels: &[Label]) -> Result<EvaluatedCircuit, GarbleError> {
        if input_labels.len() != self.circuit.num_inputs {
            return Err(GarbleError::WrongInputCount {
                expected: self.circuit.num_inputs,
                got: input_labels.len(),
            });
        }

        let mut active = vec![[0u8; LABEL_LEN]; self.circuit.num_wires()];
        active[..self.circuit.num_inputs].copy_from_slice(input_labels);

        for (i, gate) in self.circuit.gates.iter().enumerate() {
            let wire = self.circuit.num_inputs + i;
            active[wire] = match *gate {
                Gate::Xor(a, b) => xor(active[a], active[b]),
                Gate::Inv(a) => active[a],
                Gate::And(a, b) => {
                    let table = self.tables[i].ok_or(GarbleError::MissingTable(i))?;
                    let row = lsb(&active[a]) * 2 + lsb(&active[b]);
                    xor(table[row], gate_pad(&active[a], &active[b], i))
                }
            };
        }

        let labels = self
            .circuit
            .outputs
            .iter()
            .map(|&w| active[w])
            .collect();
        Ok(EvaluatedCircuit { labels })
    }

    /// Maps each evaluated output label back to its boolean value.
    pub fn decode(&self, evaluated: &EvaluatedCircuit) -> Result<Vec<bool>, GarbleError> {
        evaluated
            .labels
            .iter()
            .zip(&self.output_decoding)
            .map(|(label, (zero, one))| {
                if label == zero {
                    Ok(false)
                } else if label == one {
                    Ok(true)
                } else {
                    Err(GarbleError::UndecodableOutput)
                }
            })
            .collect()
    }
}

/// Output wire labels produced by [`GarbledCircuit::evaluate`].
pub struct EvaluatedCircuit {
    labels: Vec<Label>,
}

#[derive(Debug, Error)]
pub enum GarbleError {
    #[error("circuit expects {expected} input labels, got {got}")]
    WrongInputCount { expected: usize, got: usize },
    #[error("gate {0} has no garbled table")]
    MissingTable(usize),
    #[error("output label matches neither decoding entry")]
    UndecodableOutput,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;

    fn and_xor_not_circuit() -> Circuit {
        let mut c = Circuit::new(2);
        let and_wire = c.push_gate(Gate::And(0, 1));
        let not_wire = c.push_gate(Gate::Inv(0));
        let out_wire = c.push_gate(Gate::Xor(and_wire, not_wire));
        c.set_outputs(vec![out_wire]);
        c
    }

    #[test]
    fn garbled_evaluation_matches_plaintext() {
        let mut rng = rand_dev::DevRng::new();
        let circuit = and_xor_not_circuit();

        for a in [false, true] {
            for b in [false, true] {
                let garbler = Garbler::new(circuit.clone(), &mut rng);
                let gc = garbler.garbled_circuit();

                let inputs = [
                    garbler.input_label(0, a),
                    garbler.input_label(1, b),
                ];
                let evaluated = gc.evaluate(&inputs).unwrap();
                let decoded = gc.decode(&evaluated).unwrap();

                assert_eq!(decoded, circuit.evaluate(&[a, b]));
            }
        }
    }
}
