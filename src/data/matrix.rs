use ndarray::{Array2, ArrayView1, Axis};
use std::collections::HashMap;

use crate::data::{Label, first_duplicate};
use crate::error::{ModulonError, Result};

/// Dense matrix with labeled rows and columns.
///
/// The weight matrix is `LabeledMatrix<String, ModuleName>` (genes × iModulons), the
/// activity matrix `LabeledMatrix<ModuleName, String>` (iModulons × samples) and the
/// expression matrices `LabeledMatrix<String, String>` (genes × samples).
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix<R, C, T = f64> {
    rows: Vec<R>,
    cols: Vec<C>,
    values: Array2<T>,
}

impl<R, C, T> LabeledMatrix<R, C, T>
where
    R: Label,
    C: Label,
    T: Clone,
{
    pub fn new(rows: Vec<R>, cols: Vec<C>, values: Array2<T>) -> Result<Self> {
        if values.nrows() != rows.len() || values.ncols() != cols.len() {
            return Err(ModulonError::schema(format!(
                "matrix has shape {:?} but {} row labels and {} column labels",
                values.shape(),
                rows.len(),
                cols.len()
            )));
        }
        Ok(LabeledMatrix { rows, cols, values })
    }

    /// Assembles a matrix whose shape is already known to match its labels.
    pub(crate) fn from_parts(rows: Vec<R>, cols: Vec<C>, values: Array2<T>) -> Self {
        debug_assert_eq!(values.dim(), (rows.len(), cols.len()));
        LabeledMatrix { rows, cols, values }
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn cols(&self) -> &[C] {
        &self.cols
    }

    pub fn values(&self) -> &Array2<T> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub fn column(&self, j: usize) -> ArrayView1<'_, T> {
        self.values.column(j)
    }

    pub fn get(&self, row: &R, col: &C) -> Option<&T> {
        let i = self.row_position(row)?;
        let j = self.col_position(col)?;
        self.values.get((i, j))
    }

    pub fn row_position(&self, label: &R) -> Option<usize> {
        self.rows.iter().position(|r| r == label)
    }

    pub fn col_position(&self, label: &C) -> Option<usize> {
        self.cols.iter().position(|c| c == label)
    }

    pub fn first_duplicate_row(&self) -> Option<&R> {
        first_duplicate(&self.rows)
    }

    pub fn first_duplicate_col(&self) -> Option<&C> {
        first_duplicate(&self.cols)
    }

    /// Replaces the row labels without moving any data.
    pub fn relabel_rows(&mut self, rows: Vec<R>) -> Result<()> {
        if rows.len() != self.rows.len() {
            return Err(ModulonError::schema(format!(
                "expected {} row labels, got {}",
                self.rows.len(),
                rows.len()
            )));
        }
        self.rows = rows;
        Ok(())
    }

    /// Replaces the column labels without moving any data.
    pub fn relabel_cols(&mut self, cols: Vec<C>) -> Result<()> {
        if cols.len() != self.cols.len() {
            return Err(ModulonError::schema(format!(
                "expected {} column labels, got {}",
                self.cols.len(),
                cols.len()
            )));
        }
        self.cols = cols;
        Ok(())
    }

    /// Permutes the rows so that they follow `order`, which must hold every row label exactly once.
    pub fn reorder_rows(&self, order: &[R]) -> Result<Self> {
        let positions = permutation(&self.rows, order, "row")?;
        Ok(LabeledMatrix {
            rows: order.to_vec(),
            cols: self.cols.clone(),
            values: self.values.select(Axis(0), &positions),
        })
    }

    /// Permutes the columns so that they follow `order`, which must hold every column label exactly once.
    pub fn reorder_cols(&self, order: &[C]) -> Result<Self> {
        let positions = permutation(&self.cols, order, "column")?;
        Ok(LabeledMatrix {
            rows: self.rows.clone(),
            cols: order.to_vec(),
            values: self.values.select(Axis(1), &positions),
        })
    }
}

fn permutation<L: Label>(current: &[L], order: &[L], axis: &str) -> Result<Vec<usize>> {
    if order.len() != current.len() {
        return Err(ModulonError::schema(format!(
            "cannot reorder {} {} labels into {} labels",
            current.len(),
            axis,
            order.len()
        )));
    }
    let lookup: HashMap<&L, usize> = current.iter().enumerate().map(|(i, l)| (l, i)).collect();
    let mut used = vec![false; current.len()];
    let mut positions = Vec::with_capacity(order.len());
    for label in order {
        match lookup.get(label) {
            Some(&i) if !used[i] => {
                used[i] = true;
                positions.push(i);
            }
            Some(_) => {
                return Err(ModulonError::schema(format!(
                    "{} label {} appears twice in the new order",
                    axis, label
                )));
            }
            None => {
                return Err(ModulonError::schema(format!("unknown {} label {}", axis, label)));
            }
        }
    }
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ModuleName;
    use ndarray::array;

    fn weights() -> LabeledMatrix<String, ModuleName> {
        LabeledMatrix::new(
            vec!["g1".into(), "g2".into(), "g3".into()],
            vec![ModuleName::Index(0), ModuleName::Index(1)],
            array![[0.1, -0.4], [0.9, 0.0], [-0.3, 0.2]],
        )
        .unwrap()
    }

    #[test]
    fn shape_mismatch_is_a_schema_error() {
        let result: Result<LabeledMatrix<String, String>> = LabeledMatrix::new(
            vec!["g1".into()],
            vec!["s1".into(), "s2".into()],
            array![[1.0, 2.0, 3.0]],
        );
        assert!(matches!(result, Err(ModulonError::Schema(_))));
    }

    #[test]
    fn reorder_rows_moves_values() {
        let m = weights();
        let order: Vec<String> = vec!["g3".into(), "g1".into(), "g2".into()];
        let reordered = m.reorder_rows(&order).unwrap();
        assert_eq!(reordered.rows(), order.as_slice());
        assert_eq!(reordered.get(&"g2".to_string(), &ModuleName::Index(0)), Some(&0.9));
        assert_eq!(reordered.values()[[0, 1]], 0.2);
    }

    #[test]
    fn reorder_rejects_unknown_labels() {
        let m = weights();
        let order: Vec<String> = vec!["g3".into(), "g1".into(), "g9".into()];
        assert!(m.reorder_rows(&order).is_err());
        let twice: Vec<String> = vec!["g3".into(), "g3".into(), "g1".into()];
        assert!(m.reorder_rows(&twice).is_err());
    }

    #[test]
    fn relabel_keeps_data_in_place() {
        let mut m = weights();
        m.relabel_cols(vec!["iM1".into(), ModuleName::Index(1)]).unwrap();
        let j = m.col_position(&ModuleName::from("iM1")).unwrap();
        assert_eq!(m.column(j).to_vec(), vec![0.1, 0.9, -0.3]);
        assert!(m.relabel_cols(vec![ModuleName::Index(0)]).is_err());
    }
}
