use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Range, Sub, SubAssign};
use std::path::Path;

use crate::npy;
use crate::ops::{Accumulate, Collector, Max, MaxAbs, Mean, MeanWithVar, Min, MinAbs};
use crate::{Element, NpyError};

/// The axis along which an operation works.
///
/// A fold along [`Axis::Row`] produces one result per row; extending along
/// [`Axis::Row`] grows each row (i.e. appends columns), while extending along
/// [`Axis::Column`] appends rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Work along each row.
    Row,
    /// Work along each column.
    Column,
}

/// A dense, row-major 2-D matrix of a single numeric element type.
///
/// An array is either *good* or carries an error string (set by the
/// file-reading constructors); an errored array must not be used for
/// computation and callers are expected to check [`NpArray::good`] after any
/// I/O. Shape violations are programming errors and are asserted.
#[derive(Clone, Debug)]
pub struct NpArray<T: Element> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
    err: Option<String>,
}

impl<T: Element> Default for NpArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> PartialEq for NpArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.cols == other.cols && self.data == other.data
    }
}

impl<T: Element> NpArray<T> {
    /// An empty 0×0 array.
    pub fn new() -> Self {
        Self { data: Vec::new(), rows: 0, cols: 0, err: None }
    }

    /// A `rows`×`cols` array with default-initialised contents.
    pub fn with_shape(rows: usize, cols: usize) -> Self {
        Self { data: vec![T::default(); rows * cols], rows, cols, err: None }
    }

    /// Build an array from a flat row-major buffer.
    ///
    /// # Panics
    /// Panics if `data.len() != rows * cols`.
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Self {
        assert_eq!(data.len(), rows * cols, "buffer length does not match the shape");
        Self { data, rows, cols, err: None }
    }

    /// Build an array from per-row vectors; short rows are padded with the
    /// default value up to the longest row.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Self {
        let nrows = rows.len();
        let ncols = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut data = Vec::with_capacity(nrows * ncols);
        for row in &rows {
            data.extend_from_slice(row);
            data.extend(std::iter::repeat(T::default()).take(ncols - row.len()));
        }
        Self { data, rows: nrows, cols: ncols, err: None }
    }

    /// A `rows`×`cols` array of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::with_shape(rows, cols)
    }

    /// A `rows`×`cols` array of ones.
    pub fn ones(rows: usize, cols: usize) -> Self {
        let mut a = Self::with_shape(rows, cols);
        a.fill(T::from_u64(1));
        a
    }

    /// The `dim`×`dim` identity.
    pub fn identity(dim: usize) -> Self {
        let mut a = Self::zeros(dim, dim);
        for i in 0..dim {
            a[(i, i)] = T::from_u64(1);
        }
        a
    }

    /// Read an array from a `.npy` file. On failure the returned array is
    /// empty and carries the diagnostic in [`NpArray::error`].
    pub fn read<P: AsRef<Path>>(path: P) -> Self {
        match npy::read_file::<T>(path.as_ref()) {
            Ok(a) => a,
            Err(e) => Self::errored(e),
        }
    }

    /// Read a `.npy` file of any of the ten legal element types and cast each
    /// element to `T`. Narrowing casts may truncate.
    pub fn read_as<P: AsRef<Path>>(path: P) -> Self {
        match npy::read_file_as::<T>(path.as_ref()) {
            Ok(a) => a,
            Err(e) => Self::errored(e),
        }
    }

    /// Read several `.npy` files and concatenate them along `axis`. All files
    /// must hold the element type `T` and agree on the dimension
    /// perpendicular to `axis`.
    pub fn concat_files<P: AsRef<Path>>(paths: &[P], axis: Axis) -> Self {
        let mut result: Option<NpArray<T>> = None;
        for path in paths {
            let a = Self::read(path);
            if !a.good() {
                return a;
            }
            match &mut result {
                None => result = Some(a),
                Some(r) => {
                    let matches = match axis {
                        Axis::Row => r.rows == a.rows,
                        Axis::Column => r.cols == a.cols,
                    };
                    if !matches {
                        return Self::errored(NpyError::Header(
                            "matrices to concatenate disagree on the perpendicular dimension"
                                .into(),
                        ));
                    }
                    r.extend(&a, axis);
                }
            }
        }
        result.unwrap_or_default()
    }

    /// Save this array to `path` in the `.npy` v1 format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), NpyError> {
        npy::write_file(self, path.as_ref())
    }

    /// Write this array to `w` in the `.npy` v1 format.
    pub fn write_npy<W: std::io::Write>(&self, w: &mut W) -> Result<(), NpyError> {
        npy::write_array(self, w)
    }

    /// Read an array in the `.npy` v1 format from `r`.
    pub fn read_npy_from<R: std::io::Read>(r: &mut R) -> Result<Self, NpyError> {
        npy::read_array(r)
    }

    fn errored(e: NpyError) -> Self {
        let mut a = Self::new();
        a.err = Some(e.to_string());
        a
    }

    /// Is this array usable (no pending error)?
    pub fn good(&self) -> bool {
        self.err.is_none()
    }

    /// The diagnostic string, when the array is in the error state.
    pub fn error(&self) -> Option<&str> {
        self.err.as_deref()
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.rows * self.cols
    }

    /// Element width in bytes.
    pub fn element_size(&self) -> usize {
        T::SIZE
    }

    /// Does this array contain no element?
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    #[inline]
    fn at(&self, row: usize, col: usize) -> T {
        self.data[row * self.cols + col]
    }

    /// The element at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> T {
        assert!(row < self.rows, "row is out of range");
        assert!(col < self.cols, "column is out of range");
        self.at(row, col)
    }

    /// Set the element at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, v: T) {
        assert!(row < self.rows, "row is out of range");
        assert!(col < self.cols, "column is out of range");
        self.data[row * self.cols + col] = v;
    }

    /// Set every element to `v`.
    pub fn fill(&mut self, v: T) -> &mut Self {
        self.data.fill(v);
        self
    }

    /// A non-owning view of row `row`, usable as a resettable cursor.
    pub fn row(&self, row: usize) -> RowView<'_, T> {
        RowView { arr: self, row, init: row }
    }

    /// The raw row-major element slice.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Insert `n` default-initialised rows before row `at`.
    pub fn insert_rows(&mut self, at: usize, n: usize) -> &mut Self {
        assert!(at <= self.rows, "insertion point is out of range");
        let pos = at * self.cols;
        self.data.splice(pos..pos, std::iter::repeat(T::default()).take(n * self.cols));
        self.rows += n;
        self
    }

    /// Insert one default-initialised row before row `at`.
    pub fn insert_row(&mut self, at: usize) -> &mut Self {
        self.insert_rows(at, 1)
    }

    /// Insert `n` default-initialised columns before column `at`.
    pub fn insert_columns(&mut self, at: usize, n: usize) -> &mut Self {
        assert!(at <= self.cols, "insertion point is out of range");
        let new_cols = self.cols + n;
        let mut data = Vec::with_capacity(self.rows * new_cols);
        for r in 0..self.rows {
            let start = r * self.cols;
            data.extend_from_slice(&self.data[start..start + at]);
            data.extend(std::iter::repeat(T::default()).take(n));
            data.extend_from_slice(&self.data[start + at..start + self.cols]);
        }
        self.data = data;
        self.cols = new_cols;
        self
    }

    /// Insert one default-initialised column before column `at`.
    pub fn insert_column(&mut self, at: usize) -> &mut Self {
        self.insert_columns(at, 1)
    }

    /// Concatenate `other` onto this array along `axis`: extending along
    /// [`Axis::Row`] appends `other`'s columns to each row (row counts must
    /// match); extending along [`Axis::Column`] appends `other`'s rows
    /// (column counts must match).
    pub fn extend(&mut self, other: &NpArray<T>, axis: Axis) -> &mut Self {
        assert!(self.good(), "can not extend an array in the error state");
        assert!(other.good(), "can not extend from an array in the error state");
        match axis {
            Axis::Row => {
                assert_eq!(self.rows, other.rows, "row counts do not match for extend");
                let new_cols = self.cols + other.cols;
                let mut data = Vec::with_capacity(self.rows * new_cols);
                for r in 0..self.rows {
                    let s = r * self.cols;
                    data.extend_from_slice(&self.data[s..s + self.cols]);
                    let o = r * other.cols;
                    data.extend_from_slice(&other.data[o..o + other.cols]);
                }
                self.data = data;
                self.cols = new_cols;
            }
            Axis::Column => {
                assert_eq!(self.cols, other.cols, "column counts do not match for extend");
                self.data.extend_from_slice(&other.data);
                self.rows += other.rows;
            }
        }
        self
    }

    /// Gather the rows (resp. columns) named by `indices`, in the order the
    /// indices are supplied.
    pub fn extract(&self, axis: Axis, indices: &[usize]) -> NpArray<T> {
        if indices.is_empty() {
            return NpArray::new();
        }
        match axis {
            Axis::Row => {
                let mut out = NpArray::with_shape(indices.len(), self.cols);
                for (r, &i) in indices.iter().enumerate() {
                    for c in 0..self.cols {
                        out.set(r, c, self.get(i, c));
                    }
                }
                out
            }
            Axis::Column => {
                let mut out = NpArray::with_shape(self.rows, indices.len());
                for (c, &i) in indices.iter().enumerate() {
                    for r in 0..self.rows {
                        out.set(r, c, self.get(r, i));
                    }
                }
                out
            }
        }
    }

    /// Resize to `rows`×`cols`. The storage is reallocated (and the contents
    /// are unspecified) whenever the total element count changes.
    pub fn resize(&mut self, rows: usize, cols: usize) -> &mut Self {
        if rows * cols != self.data.len() {
            self.data = vec![T::default(); rows * cols];
        }
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// Reinterpret each element as `size_of::<T>() / size_of::<U>()`
    /// consecutive elements of the smaller type `U`, scaling the column count
    /// accordingly. The byte content is unchanged (little-endian order).
    ///
    /// # Panics
    /// Panics unless `U` is strictly smaller than `T` and divides it.
    pub fn view_as<U: Element>(self) -> NpArray<U> {
        assert!(U::SIZE < T::SIZE, "the new element view must be smaller than the original");
        assert!(T::SIZE % U::SIZE == 0, "element size is not a multiple of the new element size");
        let scale = T::SIZE / U::SIZE;
        let mut bytes = Vec::with_capacity(self.data.len() * T::SIZE);
        for v in &self.data {
            v.write_le(&mut bytes);
        }
        let data = bytes.chunks_exact(U::SIZE).map(U::from_le).collect();
        NpArray { data, rows: self.rows, cols: self.cols * scale, err: self.err }
    }

    /// Feed every element to `op`, in row-major order.
    pub fn foreach<C: Collector<T>>(&self, mut op: C) -> C {
        for r in 0..self.rows {
            for c in 0..self.cols {
                op.update(self.at(r, c), r, c);
            }
        }
        op
    }

    /// Feed every element of row (resp. column) `i` to `op`.
    pub fn foreach_at<C: Collector<T>>(&self, mut op: C, axis: Axis, i: usize) -> C {
        match axis {
            Axis::Row => {
                assert!(i < self.rows, "row is out of range");
                for c in 0..self.cols {
                    op.update(self.at(i, c), i, c);
                }
            }
            Axis::Column => {
                assert!(i < self.cols, "column is out of range");
                for r in 0..self.rows {
                    op.update(self.at(r, i), r, i);
                }
            }
        }
        op
    }

    /// Feed every element of the rows (resp. columns) in `range` to `op`.
    pub fn foreach_in<C: Collector<T>>(&self, mut op: C, axis: Axis, range: Range<usize>) -> C {
        self.check_range(axis, &range);
        match axis {
            Axis::Row => {
                for r in range {
                    for c in 0..self.cols {
                        op.update(self.at(r, c), r, c);
                    }
                }
            }
            Axis::Column => {
                for r in 0..self.rows {
                    for c in range.clone() {
                        op.update(self.at(r, c), r, c);
                    }
                }
            }
        }
        op
    }

    fn check_range(&self, axis: Axis, range: &Range<usize>) {
        assert!(range.start <= range.end, "range end must not precede its start");
        let limit = match axis {
            Axis::Row => self.rows,
            Axis::Column => self.cols,
        };
        assert!(range.start <= limit && range.end <= limit, "range is out of bounds");
    }

    /// Run one clone of `proto` per row (resp. column) in `range` and return
    /// the collectors.
    pub fn fold_in<C: Collector<T>>(&self, proto: C, axis: Axis, range: Range<usize>) -> Vec<C> {
        self.check_range(axis, &range);
        let mut ops = vec![proto; range.len()];
        match axis {
            Axis::Row => {
                for r in range.clone() {
                    for c in 0..self.cols {
                        ops[r - range.start].update(self.at(r, c), r, c);
                    }
                }
            }
            Axis::Column => {
                for r in 0..self.rows {
                    for c in range.clone() {
                        ops[c - range.start].update(self.at(r, c), r, c);
                    }
                }
            }
        }
        ops
    }

    /// Run one clone of `proto` per row (resp. column) and return the
    /// collectors.
    pub fn fold<C: Collector<T>>(&self, proto: C, axis: Axis) -> Vec<C> {
        let end = match axis {
            Axis::Row => self.rows,
            Axis::Column => self.cols,
        };
        self.fold_in(proto, axis, 0..end)
    }

    fn values_of<C: Collector<T>>(ops: Vec<C>) -> NpArray<C::Value>
    where
        C::Value: Element,
    {
        if ops.is_empty() {
            return NpArray::new();
        }
        let data: Vec<C::Value> = ops.iter().map(Collector::value).collect();
        let cols = data.len();
        NpArray::from_vec(data, 1, cols)
    }

    /// Do all elements satisfy `pred`? `false` for an empty array.
    pub fn all(&self, pred: impl Fn(T) -> bool) -> bool {
        !self.is_empty() && self.data.iter().all(|&v| pred(v))
    }

    /// Do all elements of row (resp. column) `i` satisfy `pred`?
    pub fn all_at(&self, axis: Axis, i: usize, pred: impl Fn(T) -> bool) -> bool {
        self.count_at(axis, i, pred)
            == match axis {
                Axis::Row => self.cols,
                Axis::Column => self.rows,
            }
    }

    /// Do all elements of the rows (resp. columns) in `range` satisfy `pred`?
    /// `false` for an empty range.
    pub fn all_in(&self, axis: Axis, range: Range<usize>, pred: impl Fn(T) -> bool) -> bool {
        if range.is_empty() {
            return false;
        }
        let lanes = range.len();
        self.count_in(axis, range, pred)
            == lanes
                * match axis {
                    Axis::Row => self.cols,
                    Axis::Column => self.rows,
                }
    }

    /// Does any element satisfy `pred`?
    pub fn any(&self, pred: impl Fn(T) -> bool) -> bool {
        self.data.iter().any(|&v| pred(v))
    }

    /// Does any element of row (resp. column) `i` satisfy `pred`?
    pub fn any_at(&self, axis: Axis, i: usize, pred: impl Fn(T) -> bool) -> bool {
        self.count_at(axis, i, pred) != 0
    }

    /// Does any element of the rows (resp. columns) in `range` satisfy
    /// `pred`?
    pub fn any_in(&self, axis: Axis, range: Range<usize>, pred: impl Fn(T) -> bool) -> bool {
        self.count_in(axis, range, pred) != 0
    }

    /// Does no element satisfy `pred`? `false` for an empty array.
    pub fn none(&self, pred: impl Fn(T) -> bool) -> bool {
        !self.is_empty() && !self.any(pred)
    }

    /// Does no element of row (resp. column) `i` satisfy `pred`?
    pub fn none_at(&self, axis: Axis, i: usize, pred: impl Fn(T) -> bool) -> bool {
        self.count_at(axis, i, pred) == 0
    }

    /// Does no element of the rows (resp. columns) in `range` satisfy `pred`?
    /// `false` for an empty range.
    pub fn none_in(&self, axis: Axis, range: Range<usize>, pred: impl Fn(T) -> bool) -> bool {
        !range.is_empty() && self.count_in(axis, range, pred) == 0
    }

    /// How many elements satisfy `pred`?
    pub fn count(&self, pred: impl Fn(T) -> bool) -> usize {
        self.data.iter().filter(|&&v| pred(v)).count()
    }

    /// How many elements of row (resp. column) `i` satisfy `pred`?
    pub fn count_at(&self, axis: Axis, i: usize, pred: impl Fn(T) -> bool) -> usize {
        match axis {
            Axis::Row => {
                assert!(i < self.rows, "row is out of range");
                (0..self.cols).filter(|&c| pred(self.at(i, c))).count()
            }
            Axis::Column => {
                assert!(i < self.cols, "column is out of range");
                (0..self.rows).filter(|&r| pred(self.at(r, i))).count()
            }
        }
    }

    /// How many elements of the rows (resp. columns) in `range` satisfy
    /// `pred`?
    pub fn count_in(&self, axis: Axis, range: Range<usize>, pred: impl Fn(T) -> bool) -> usize {
        self.check_range(axis, &range);
        match axis {
            Axis::Row => range
                .map(|r| (0..self.cols).filter(|&c| pred(self.at(r, c))).count())
                .sum(),
            Axis::Column => (0..self.rows)
                .map(|r| range.clone().filter(|&c| pred(self.at(r, c))).count())
                .sum(),
        }
    }

    /// Sum of row (resp. column) `i`, in the element type.
    pub fn sum_at(&self, axis: Axis, i: usize) -> T {
        self.foreach_at(Accumulate::default(), axis, i).value()
    }

    /// Per-lane sums over the rows (resp. columns) in `range`, as a 1-row
    /// array.
    pub fn sum_in(&self, axis: Axis, range: Range<usize>) -> NpArray<T> {
        Self::values_of(self.fold_in(Accumulate::default(), axis, range))
    }

    /// Per-lane sums along `axis`, as a 1-row array.
    pub fn sum(&self, axis: Axis) -> NpArray<T> {
        Self::values_of(self.fold(Accumulate::default(), axis))
    }

    /// Mean of row (resp. column) `i`.
    pub fn mean_at(&self, axis: Axis, i: usize) -> f64 {
        let op = self.foreach_at(Mean::default(), axis, i);
        Collector::<T>::value(&op)
    }

    /// Per-lane means over the rows (resp. columns) in `range`, as a 1-row
    /// array.
    pub fn mean_in(&self, axis: Axis, range: Range<usize>) -> NpArray<f64> {
        Self::values_of(self.fold_in(Mean::default(), axis, range))
    }

    /// Per-lane means along `axis`, as a 1-row array.
    pub fn mean(&self, axis: Axis) -> NpArray<f64> {
        Self::values_of(self.fold(Mean::default(), axis))
    }

    /// Mean, variance (with `ddof` delta degrees of freedom) and standard
    /// deviation of row (resp. column) `i`.
    pub fn mean_with_var_at(&self, axis: Axis, i: usize, ddof: usize) -> (f64, f64, f64) {
        let op = self.foreach_at(MeanWithVar::default(), axis, i);
        (Collector::<T>::value(&op), op.var(ddof), op.stddev())
    }

    /// Per-lane mean, variance and standard deviation over the rows (resp.
    /// columns) in `range`, each as a 1-row array.
    pub fn mean_with_var_in(
        &self,
        axis: Axis,
        range: Range<usize>,
        ddof: usize,
    ) -> (NpArray<f64>, NpArray<f64>, NpArray<f64>) {
        let ops = self.fold_in(MeanWithVar::default(), axis, range);
        let n = ops.len();
        let mut mean = NpArray::with_shape(1, n);
        let mut var = NpArray::with_shape(1, n);
        let mut stddev = NpArray::with_shape(1, n);
        for (i, op) in ops.iter().enumerate() {
            mean.set(0, i, Collector::<T>::value(op));
            var.set(0, i, op.var(ddof));
            stddev.set(0, i, op.stddev());
        }
        (mean, var, stddev)
    }

    /// Per-lane mean, variance and standard deviation along `axis`.
    pub fn mean_with_var(
        &self,
        axis: Axis,
        ddof: usize,
    ) -> (NpArray<f64>, NpArray<f64>, NpArray<f64>) {
        let end = match axis {
            Axis::Row => self.rows,
            Axis::Column => self.cols,
        };
        self.mean_with_var_in(axis, 0..end, ddof)
    }

    /// Replace every element with `f(element)`.
    pub fn apply(&mut self, f: impl Fn(T) -> T) -> &mut Self {
        for v in &mut self.data {
            *v = f(*v);
        }
        self
    }

    /// Replace every element with its absolute value.
    pub fn abs(&mut self) -> &mut Self {
        self.apply(T::abs_value)
    }

    /// Negate every element (wrapping for the integer types).
    pub fn negate(&mut self) -> &mut Self {
        self.apply(T::neg_value)
    }

    /// Replace every element with its natural logarithm.
    pub fn ln(&mut self) -> &mut Self {
        self.apply(|v| T::from_f64(v.to_f64().ln()))
    }

    /// Replace every element with its square root.
    pub fn sqrt(&mut self) -> &mut Self {
        self.apply(|v| T::from_f64(v.to_f64().sqrt()))
    }

    /// Replace every element with `|element - rhs|`.
    pub fn absdiff(&mut self, rhs: T) -> &mut Self {
        self.apply(|v| v.absdiff(rhs))
    }

    /// Replace every element with `|element - rhs element|`, with
    /// broadcasting.
    pub fn absdiff_with(&mut self, rhs: &NpArray<T>) -> &mut Self {
        self.apply_with(rhs, T::absdiff)
    }

    /// Replace every element with `f(element, rhs)`.
    pub fn apply_scalar(&mut self, rhs: T, f: impl Fn(T, T) -> T) -> &mut Self {
        self.apply(|v| f(v, rhs))
    }

    /// Element-wise `f(self, rhs)` with broadcasting along size-1 axes.
    ///
    /// Each operand is a matrix, a column vector (`cols == 1`), a row vector
    /// (`rows == 1`) or a scalar (1×1). A row vector can not be combined with
    /// a column vector (no outer-product semantics). When the operation
    /// widens this array's shape, the storage is reallocated to match.
    pub fn apply_with(&mut self, rhs: &NpArray<T>, f: impl Fn(T, T) -> T) -> &mut Self {
        assert!(
            self.rows == rhs.rows || self.rows == 1 || rhs.rows == 1,
            "row counts must match or one of them must be 1"
        );
        assert!(
            self.cols == rhs.cols || self.cols == 1 || rhs.cols == 1,
            "column counts must match or one of them must be 1"
        );
        let k = (usize::from(self.rows == 1) << 3)
            | (usize::from(self.cols == 1) << 2)
            | (usize::from(rhs.rows == 1) << 1)
            | usize::from(rhs.cols == 1);
        match k {
            // this: matrix, rhs: matrix.
            0x0 => {
                for r in 0..self.rows {
                    for c in 0..self.cols {
                        let v = f(self.at(r, c), rhs.at(r, c));
                        self.data[r * self.cols + c] = v;
                    }
                }
            }
            // this: matrix, rhs: column.
            0x1 => {
                for r in 0..self.rows {
                    for c in 0..self.cols {
                        let v = f(self.at(r, c), rhs.at(r, 0));
                        self.data[r * self.cols + c] = v;
                    }
                }
            }
            // this: matrix, rhs: row.
            0x2 => {
                for r in 0..self.rows {
                    for c in 0..self.cols {
                        let v = f(self.at(r, c), rhs.at(0, c));
                        self.data[r * self.cols + c] = v;
                    }
                }
            }
            // this: matrix, rhs: scalar.
            0x3 => {
                let s = rhs.at(0, 0);
                for v in &mut self.data {
                    *v = f(*v, s);
                }
            }
            // this: column, rhs: matrix -> widen to matrix.
            0x4 => {
                let lhs = std::mem::replace(self, rhs.clone());
                for r in 0..self.rows {
                    for c in 0..self.cols {
                        let v = f(lhs.at(r, 0), self.at(r, c));
                        self.data[r * self.cols + c] = v;
                    }
                }
            }
            // this: column, rhs: column.
            0x5 => {
                for r in 0..self.rows {
                    let v = f(self.at(r, 0), rhs.at(r, 0));
                    self.data[r] = v;
                }
            }
            // this: column, rhs: row or this: row, rhs: column.
            0x6 | 0x9 => {
                panic!("can not combine a single row with a single column")
            }
            // this: column, rhs: scalar.
            0x7 => {
                let s = rhs.at(0, 0);
                for r in 0..self.rows {
                    let v = f(self.at(r, 0), s);
                    self.data[r] = v;
                }
            }
            // this: row, rhs: matrix -> widen to matrix.
            0x8 => {
                let lhs = std::mem::replace(self, rhs.clone());
                for r in 0..self.rows {
                    for c in 0..self.cols {
                        let v = f(lhs.at(0, c), self.at(r, c));
                        self.data[r * self.cols + c] = v;
                    }
                }
            }
            // this: row, rhs: row.
            0xa => {
                for c in 0..self.cols {
                    let v = f(self.at(0, c), rhs.at(0, c));
                    self.data[c] = v;
                }
            }
            // this: row, rhs: scalar.
            0xb => {
                let s = rhs.at(0, 0);
                for c in 0..self.cols {
                    let v = f(self.at(0, c), s);
                    self.data[c] = v;
                }
            }
            // this: scalar, rhs: matrix / column / row -> take rhs's shape.
            0xc | 0xd | 0xe => {
                let s = self.at(0, 0);
                *self = rhs.clone();
                for v in &mut self.data {
                    *v = f(s, *v);
                }
            }
            // this: scalar, rhs: scalar.
            0xf => {
                let v = f(self.at(0, 0), rhs.at(0, 0));
                self.data[0] = v;
            }
            _ => unreachable!(),
        }
        self
    }
}

macro_rules! collector_api {
    ($(#[$doc:meta])* $name:ident, $name_at:ident, $name_in:ident,
     $name_loc:ident, $name_loc_at:ident, $name_loc_in:ident, $op:ident) => {
        impl<T: Element> NpArray<T> {
            $(#[$doc])*
            pub fn $name(&self) -> T {
                self.foreach($op::default()).value()
            }

            /// As the whole-array form, restricted to row (resp. column) `i`.
            pub fn $name_at(&self, axis: Axis, i: usize) -> T {
                self.foreach_at($op::default(), axis, i).value()
            }

            /// As the whole-array form, restricted to the rows (resp.
            /// columns) in `range`.
            pub fn $name_in(&self, axis: Axis, range: Range<usize>) -> T {
                self.foreach_in($op::default(), axis, range).value()
            }

            /// As the whole-array form, also returning the `(row, col)` where
            /// the result was found (first match in row-major order).
            pub fn $name_loc(&self) -> (T, usize, usize) {
                let op = self.foreach($op::default());
                let (r, c) = op.location().expect("empty array has no extremum");
                (op.value(), r, c)
            }

            /// Value and location over row (resp. column) `i`.
            pub fn $name_loc_at(&self, axis: Axis, i: usize) -> (T, usize, usize) {
                let op = self.foreach_at($op::default(), axis, i);
                let (r, c) = op.location().expect("empty array has no extremum");
                (op.value(), r, c)
            }

            /// Value and location over the rows (resp. columns) in `range`.
            pub fn $name_loc_in(&self, axis: Axis, range: Range<usize>) -> (T, usize, usize) {
                let op = self.foreach_in($op::default(), axis, range);
                let (r, c) = op.location().expect("empty array has no extremum");
                (op.value(), r, c)
            }
        }
    };
}

collector_api!(
    /// The minimum element.
    min, min_at, min_in, min_loc, min_loc_at, min_loc_in, Min
);
collector_api!(
    /// The maximum element. Ties keep the first cell in row-major order.
    max, max_at, max_in, max_loc, max_loc_at, max_loc_in, Max
);
collector_api!(
    /// The minimum absolute value.
    min_abs, min_abs_at, min_abs_in, min_abs_loc, min_abs_loc_at, min_abs_loc_in, MinAbs
);
collector_api!(
    /// The maximum absolute value.
    max_abs, max_abs_at, max_abs_in, max_abs_loc, max_abs_loc_at, max_abs_loc_in, MaxAbs
);

impl<T: Element> Index<(usize, usize)> for NpArray<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(row < self.rows, "row is out of range");
        assert!(col < self.cols, "column is out of range");
        &self.data[row * self.cols + col]
    }
}

impl<T: Element> IndexMut<(usize, usize)> for NpArray<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(row < self.rows, "row is out of range");
        assert!(col < self.cols, "column is out of range");
        &mut self.data[row * self.cols + col]
    }
}

macro_rules! arith_ops {
    ($assign:ident, $assign_fn:ident, $op:ident, $op_fn:ident, $f:expr) => {
        impl<T: Element> $assign<T> for NpArray<T> {
            fn $assign_fn(&mut self, rhs: T) {
                self.apply_scalar(rhs, $f);
            }
        }

        impl<T: Element> $assign<&NpArray<T>> for NpArray<T> {
            fn $assign_fn(&mut self, rhs: &NpArray<T>) {
                self.apply_with(rhs, $f);
            }
        }

        impl<T: Element> $op<T> for NpArray<T> {
            type Output = NpArray<T>;

            fn $op_fn(mut self, rhs: T) -> NpArray<T> {
                self.apply_scalar(rhs, $f);
                self
            }
        }

        impl<T: Element> $op<&NpArray<T>> for NpArray<T> {
            type Output = NpArray<T>;

            fn $op_fn(mut self, rhs: &NpArray<T>) -> NpArray<T> {
                self.apply_with(rhs, $f);
                self
            }
        }
    };
}

arith_ops!(AddAssign, add_assign, Add, add, |a, b| a + b);
arith_ops!(SubAssign, sub_assign, Sub, sub, |a, b| a - b);
arith_ops!(MulAssign, mul_assign, Mul, mul, |a, b| a * b);
arith_ops!(DivAssign, div_assign, Div, div, |a, b| a / b);

/// Concatenate two arrays along `axis` into a new array.
pub fn concat<T: Element>(a: &NpArray<T>, b: &NpArray<T>, axis: Axis) -> NpArray<T> {
    let mut out = a.clone();
    out.extend(b, axis);
    out
}

/// Element-wise `as`-cast of `src` into an array of element type `U`.
/// Narrowing casts may truncate.
pub fn convert<U: Element, T: Element>(src: &NpArray<T>) -> NpArray<U> {
    let mut out = NpArray::with_shape(src.rows(), src.cols());
    for r in 0..src.rows() {
        for c in 0..src.cols() {
            let v = src.get(r, c);
            // Widen through the lossless intermediate of the source kind.
            let converted = match T::DESCR.as_bytes()[0] {
                b'f' => U::from_f64(v.to_f64()),
                b'i' => U::from_i64(v.to_i64()),
                _ => U::from_u64(v.to_u64()),
            };
            out.set(r, c, converted);
        }
    }
    out
}

/// A non-owning view of one row of an [`NpArray`], usable either for indexed
/// access and iteration or as a resettable cursor that can be advanced to the
/// following rows.
#[derive(Clone, Copy, Debug)]
pub struct RowView<'a, T: Element> {
    arr: &'a NpArray<T>,
    row: usize,
    init: usize,
}

impl<'a, T: Element> RowView<'a, T> {
    /// Number of elements in the row.
    pub fn len(&self) -> usize {
        self.arr.cols()
    }

    /// Is the underlying array empty?
    pub fn is_empty(&self) -> bool {
        self.arr.is_empty()
    }

    /// The element at column `i` of the current row.
    pub fn get(&self, i: usize) -> T {
        assert!(self.row < self.arr.rows(), "row cursor is out of range");
        self.arr.get(self.row, i)
    }

    /// Iterate over the elements of the current row.
    pub fn iter(&self) -> impl Iterator<Item = T> + 'a {
        let arr = self.arr;
        let row = self.row;
        (0..arr.cols()).map(move |c| arr.get(row, c))
    }

    /// Move the cursor to the next row.
    pub fn advance(&mut self) {
        self.row += 1;
    }

    /// Rewind the cursor to the row it was created on.
    pub fn reset(&mut self) {
        self.row = self.init;
    }

    /// The row the cursor currently points at.
    pub fn current_row(&self) -> usize {
        self.row
    }

    /// Does the cursor still point inside the array?
    pub fn in_bounds(&self) -> bool {
        self.row < self.arr.rows()
    }
}

impl<T: Element> Index<usize> for RowView<'_, T> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        assert!(self.row < self.arr.rows(), "row cursor is out of range");
        &self.arr[(self.row, i)]
    }
}
