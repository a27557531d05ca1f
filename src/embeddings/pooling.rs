//! Pooling and normalization of token-level model output.

use ndarray::{s, Array2, ArrayView2, ArrayView3};

/// Apply mean pooling with attention mask.
///
/// `hidden` is `[batch, seq, hidden]`, `mask` is `[batch, seq]`. Rows with
/// no unmasked tokens pool to zeros.
#[must_use]
pub fn mean_pool(hidden: ArrayView3<'_, f32>, mask: ArrayView2<'_, i64>) -> Array2<f32> {
    let (batch, seq_len, hidden_size) = hidden.dim();
    let seq_len = seq_len.min(mask.ncols());
    let mut pooled = Array2::<f32>::zeros((batch, hidden_size));

    for b in 0..batch.min(mask.nrows()) {
        let mut row = pooled.row_mut(b);
        let mut count = 0.0f32;
        for t in 0..seq_len {
            if mask[[b, t]] != 0 {
                row += &hidden.slice(s![b, t, ..]);
                count += 1.0;
            }
        }
        if count > 0.0 {
            row /= count;
        }
    }

    pooled
}

/// Take the first (`[CLS]`) token of every sequence.
#[must_use]
pub fn cls_pool(hidden: ArrayView3<'_, f32>) -> Array2<f32> {
    hidden.slice(s![.., 0, ..]).to_owned()
}

/// L2-normalize every row in place. Zero rows are left alone.
pub fn l2_normalize(rows: &mut Array2<f32>) {
    for mut row in rows.rows_mut() {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row /= norm;
        }
    }
}
