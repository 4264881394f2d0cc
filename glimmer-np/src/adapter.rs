use std::path::Path;

use crate::{Element, NpArray, NpyError};

/// Builds a 2-D array row by row without knowing the final dimensions in
/// advance.
///
/// The power and register-bank dumpers append one value (or slice) at a time
/// to the current row and call [`NpAdapter::next_row`] between traces; on
/// save the ragged rows are zero-padded to the longest one and written as a
/// rectangular `.npy` matrix. A trailing empty row, the natural end state of
/// a dumper that calls `next_row` after its last trace, is dropped.
#[derive(Clone, Debug)]
pub struct NpAdapter<T: Element> {
    rows: Vec<Vec<T>>,
    current: usize,
    max_len: usize,
}

impl<T: Element> NpAdapter<T> {
    /// Create an adapter expecting around `expected_rows` rows.
    pub fn new(expected_rows: usize) -> Self {
        Self { rows: vec![Vec::new(); expected_rows.max(1)], current: 0, max_len: 0 }
    }

    /// Append one value to the current row.
    pub fn append(&mut self, v: T) {
        if let Some(row) = self.rows.get_mut(self.current) {
            row.push(v);
        }
    }

    /// Append a slice of values to the current row.
    pub fn append_slice(&mut self, vs: &[T]) {
        if let Some(row) = self.rows.get_mut(self.current) {
            row.extend_from_slice(vs);
        }
    }

    /// Close the current row and move to the next one.
    pub fn next_row(&mut self) {
        self.max_len = self.max_len.max(self.rows[self.current].len());
        self.current += 1;
        if self.current == self.rows.len() {
            self.rows.push(Vec::new());
        }
        self.rows[self.current].reserve(self.max_len);
    }

    /// Rectangularise the accumulated rows into an array, zero-padding short
    /// rows and dropping a trailing empty one.
    pub fn to_array(&self) -> NpArray<T> {
        let mut nrows = self.rows.len();
        if nrows > 0 && self.rows[nrows - 1].is_empty() {
            nrows -= 1;
        }
        let mut data = Vec::with_capacity(nrows * self.max_len);
        for row in &self.rows[..nrows] {
            data.extend_from_slice(row);
            data.extend(std::iter::repeat(T::default()).take(self.max_len - row.len()));
        }
        NpArray::from_vec(data, nrows, self.max_len)
    }

    /// Save the accumulated rows to `path` in `.npy` format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), NpyError> {
        self.to_array().save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_rows_are_zero_padded() {
        let mut a = NpAdapter::<f64>::new(2);
        a.append(1.0);
        a.append(2.0);
        a.next_row();
        a.append(3.0);
        a.next_row();

        let m = a.to_array();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 2);
        assert_eq!(m.get(0, 0), 1.0);
        assert_eq!(m.get(0, 1), 2.0);
        assert_eq!(m.get(1, 0), 3.0);
        assert_eq!(m.get(1, 1), 0.0);
    }

    #[test]
    fn trailing_empty_row_is_dropped() {
        let mut a = NpAdapter::<u64>::new(2);
        a.append_slice(&[1, 2, 3]);
        a.next_row();
        a.append_slice(&[4, 5, 6]);
        a.next_row();

        let m = a.to_array();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 3);
        assert_eq!(m.as_slice(), &[1, 2, 3, 4, 5, 6]);
    }
}
