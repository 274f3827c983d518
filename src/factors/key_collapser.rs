//! Folds per-slot Schur blocks into a Hessian over unique keys.
//!
//! Each view owns two parameter slots (body pose, extrinsic pose), so m views give 2m slots
//! while the factor may only touch n ≤ 2m distinct keys. Slot blocks are summed onto the
//! blocks of their keys:
//!
//! - a slot's own diagonal block goes to its key's diagonal block
//! - an off-diagonal pair whose two slots share a key adds `B + Bᵀ` to that key's diagonal
//! - any other pair is summed onto the pair of keys, transposed when the keys are in
//!   reverse unique order
//!
//! The linear term and the constant are folded the same way onto the trailing block.

use crate::core::key::Key;
use crate::error::{SmartFactorError, SmartFactorResult};
use crate::factors::{POSE_DIM, VIEW_DIM};
use crate::linalg::schur::SchurAccumulator;
use crate::linalg::symmetric_block::SymmetricBlockMatrix;
use nalgebra::{Matrix1, SMatrix, SVector};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct KeyCollapser {
    /// Unique index of every slot, `[body₀, ext₀, body₁, ext₁, …]`
    slot_to_unique: Vec<usize>,
    matrix: SymmetricBlockMatrix,
}

impl KeyCollapser {
    /// Map every slot key to its position in `unique_keys`.
    ///
    /// # Errors
    /// [`SmartFactorError::KeyNotFound`] if a slot key is absent from `unique_keys`.
    pub fn new(slot_keys: &[Key], unique_keys: &[Key]) -> SmartFactorResult<Self> {
        let key_to_unique: BTreeMap<Key, usize> = unique_keys
            .iter()
            .enumerate()
            .map(|(index, &key)| (key, index))
            .collect();

        let slot_to_unique = slot_keys
            .iter()
            .map(|key| {
                key_to_unique
                    .get(key)
                    .copied()
                    .ok_or(SmartFactorError::KeyNotFound(*key))
            })
            .collect::<SmartFactorResult<Vec<_>>>()?;

        let mut dims = vec![POSE_DIM; unique_keys.len()];
        dims.push(1);

        Ok(KeyCollapser {
            slot_to_unique,
            matrix: SymmetricBlockMatrix::new(dims),
        })
    }

    /// Number of unique keys.
    pub fn n_keys(&self) -> usize {
        self.matrix.n_blocks() - 1
    }

    pub fn into_matrix(self) -> SymmetricBlockMatrix {
        self.matrix
    }

    fn unique(&self, slot: usize) -> SmartFactorResult<usize> {
        self.slot_to_unique.get(slot).copied().ok_or_else(|| {
            SmartFactorError::size_mismatch("parameter slots", slot + 1, self.slot_to_unique.len())
        })
    }

    /// Fold the 6×6 block of slot pair (a, b), a ≤ b.
    fn fold_slot_block(
        &mut self,
        a: usize,
        b: usize,
        block: &SMatrix<f64, POSE_DIM, POSE_DIM>,
    ) -> SmartFactorResult<()> {
        let (ua, ub) = (self.unique(a)?, self.unique(b)?);
        if a == b {
            self.matrix.update_diagonal_block(ua, block)
        } else if ua == ub {
            self.matrix
                .update_diagonal_block(ua, &(block + block.transpose()))
        } else {
            self.matrix.update_off_diagonal_block(ua, ub, block)
        }
    }
}

impl SchurAccumulator<VIEW_DIM> for KeyCollapser {
    fn add_pair(
        &mut self,
        i: usize,
        j: usize,
        block: &SMatrix<f64, VIEW_DIM, VIEW_DIM>,
    ) -> SmartFactorResult<()> {
        for a_local in 0..2 {
            // Within a diagonal view block only the upper slot pairs are independent.
            let b_start = if i == j { a_local } else { 0 };
            for b_local in b_start..2 {
                let sub_block = block
                    .fixed_view::<POSE_DIM, POSE_DIM>(a_local * POSE_DIM, b_local * POSE_DIM)
                    .into_owned();
                self.fold_slot_block(2 * i + a_local, 2 * j + b_local, &sub_block)?;
            }
        }
        Ok(())
    }

    fn add_linear(&mut self, i: usize, term: &SVector<f64, VIEW_DIM>) -> SmartFactorResult<()> {
        let last = self.n_keys();
        for a_local in 0..2 {
            let unique = self.unique(2 * i + a_local)?;
            let sub_term = term.fixed_rows::<POSE_DIM>(a_local * POSE_DIM).into_owned();
            self.matrix.update_off_diagonal_block(unique, last, &sub_term)?;
        }
        Ok(())
    }

    fn add_constant(&mut self, constant: f64) -> SmartFactorResult<()> {
        let last = self.n_keys();
        self.matrix
            .update_diagonal_block(last, &Matrix1::new(constant))
    }
}
