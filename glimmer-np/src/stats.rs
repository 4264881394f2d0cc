//! Statistical kernels over [`NpArray<f64>`]: Welsh and Student t-tests, the
//! "perfect" t-test that routes degenerate constant columns to the right
//! test, and Pearson correlation.
//!
//! All kernels treat rows as traces and columns as samples, and operate on a
//! half-open sample range `[b, e)`.

use std::io;

use crate::ops::{Collector, MeanWithVar};
use crate::{Axis, NpArray, RowView};

/// Assigns a trace to one of the two t-test populations, or to neither.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// The trace belongs to group 0.
    Group0,
    /// The trace belongs to group 1.
    Group1,
    /// The trace takes part in no group.
    Ignore,
}

/// Welsh t-test over the sample range `[b, e)` with pre-split groups: for
/// each sample, `(μ₀ − μ₁)/√(σ₀²/n₀ + σ₁²/n₁)` with `ddof = 1`.
///
/// Both groups must contain at least two traces.
pub fn welsh_t_test(
    b: usize,
    e: usize,
    group0: &NpArray<f64>,
    group1: &NpArray<f64>,
) -> NpArray<f64> {
    assert!(b <= e, "wrong begin / end samples");
    assert!(e <= group0.cols(), "not that many samples in group0");
    assert!(e <= group1.cols(), "not that many samples in group1");
    assert!(group0.rows() > 1, "group0 must have more than one trace");
    assert!(group1.rows() > 1, "group1 must have more than one trace");

    if b == e {
        return NpArray::new();
    }

    let (mean0, var0, _) = group0.mean_with_var_in(Axis::Column, b..e, 1);
    let (mean1, var1, _) = group1.mean_with_var_in(Axis::Column, b..e, 1);

    let mut denom = var0 / group0.rows() as f64;
    let var1 = var1 / group1.rows() as f64;
    denom += &var1;
    denom.sqrt();

    let mut tvalues = mean0;
    tvalues -= &mean1;
    tvalues /= &denom;
    tvalues
}

/// Welsh t-test for the single sample `s` with pre-split groups.
pub fn welsh_t_test_at(s: usize, group0: &NpArray<f64>, group1: &NpArray<f64>) -> f64 {
    welsh_t_test(s, s + 1, group0, group1).get(0, 0)
}

/// Welsh t-test over the sample range `[b, e)`, with the two populations
/// selected from `traces` by `classifier`.
pub fn welsh_t_test_classified(
    b: usize,
    e: usize,
    traces: &NpArray<f64>,
    classifier: &[Classification],
) -> NpArray<f64> {
    assert!(b <= e, "wrong begin / end samples");
    assert!(e <= traces.cols(), "not that many samples in the traces");
    assert!(classifier.len() >= traces.rows(), "classifier does not cover all traces");

    if b == e {
        return NpArray::new();
    }

    let mut tvalues = NpArray::with_shape(1, e - b);
    for sample in b..e {
        let mut avg = [MeanWithVar::default(), MeanWithVar::default()];
        for trace in 0..traces.rows() {
            let group = match classifier[trace] {
                Classification::Group0 => 0,
                Classification::Group1 => 1,
                Classification::Ignore => continue,
            };
            avg[group].update(traces.get(trace, sample), trace, sample);
        }

        assert!(avg[0].count() > 1, "group0 must have more than one trace");
        assert!(avg[1].count() > 1, "group1 must have more than one trace");

        let m0 = Collector::<f64>::value(&avg[0]);
        let m1 = Collector::<f64>::value(&avg[1]);
        let v0 = avg[0].var(1) / avg[0].count() as f64;
        let v1 = avg[1].var(1) / avg[1].count() as f64;
        tvalues.set(0, sample - b, (m0 - m1) / (v0 + v1).sqrt());
    }
    tvalues
}

/// Welsh t-test for the single sample `s` with classified traces.
pub fn welsh_t_test_classified_at(
    s: usize,
    traces: &NpArray<f64>,
    classifier: &[Classification],
) -> f64 {
    welsh_t_test_classified(s, s + 1, traces, classifier).get(0, 0)
}

/// Student t-test of sample `s` against the reference mean `m0`:
/// `√n·(μ − m₀)/σ` with `ddof = 1`.
pub fn student_t_test(s: usize, m0: f64, traces: &NpArray<f64>) -> f64 {
    assert!(s < traces.cols(), "out of bound sample access in the traces");

    let (m, var, _) = traces.mean_with_var_at(Axis::Column, s, 1);
    (traces.rows() as f64).sqrt() * (m - m0) / var.sqrt()
}

/// Student t-test of sample `s` against `m0`, restricted to the traces for
/// which `select` returns `true`. NaN when fewer than two traces remain.
pub fn student_t_test_where(
    s: usize,
    m0: f64,
    traces: &NpArray<f64>,
    select: impl Fn(usize) -> bool,
) -> f64 {
    assert!(s < traces.cols(), "out of bound sample access in the traces");

    let mut avg = MeanWithVar::default();
    for trace in 0..traces.rows() {
        if select(trace) {
            avg.update(traces.get(trace, s), trace, s);
        }
    }

    if avg.count() <= 1 {
        return f64::NAN;
    }

    let m = Collector::<f64>::value(&avg);
    (avg.count() as f64).sqrt() * (m - m0) / avg.var(1).sqrt()
}

/// Student t-test over the sample range `[b, e)` against the per-sample
/// reference means `m0`.
pub fn student_t_test_range(b: usize, e: usize, m0: &[f64], traces: &NpArray<f64>) -> NpArray<f64> {
    assert!(b <= e, "wrong begin / end samples");
    assert!(e <= traces.cols(), "not that many samples in the traces");
    assert!(m0.len() >= e - b, "number of reference means must match the range");

    if b == e {
        return NpArray::new();
    }

    let mut tvalues = NpArray::with_shape(1, e - b);
    for s in b..e {
        tvalues.set(0, s - b, student_t_test(s, m0[s - b], traces));
    }
    tvalues
}

/// Student t-test over `[b, e)` against per-sample means, restricted to the
/// selected traces.
pub fn student_t_test_range_where(
    b: usize,
    e: usize,
    m0: &[f64],
    traces: &NpArray<f64>,
    select: impl Fn(usize) -> bool,
) -> NpArray<f64> {
    assert!(b <= e, "wrong begin / end samples");
    assert!(e <= traces.cols(), "not that many samples in the traces");
    assert!(m0.len() >= e - b, "number of reference means must match the range");

    if b == e {
        return NpArray::new();
    }

    let mut tvalues = NpArray::with_shape(1, e - b);
    for s in b..e {
        tvalues.set(0, s - b, student_t_test_where(s, m0[s - b], traces, &select));
    }
    tvalues
}

/// How many samples each branch of the perfect t-test handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerfectStats {
    counts: [usize; 4],
}

/// The branch a perfect t-test sample was routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PerfectKind {
    /// Both groups are constant, with the same value.
    SameConstantValue,
    /// Both groups are constant, with different values.
    DifferentConstantValues,
    /// Exactly one group is constant: Student t-test.
    StudentTTest,
    /// Neither group is constant: Welsh t-test.
    WelshTTest,
}

impl PerfectStats {
    fn incr(&mut self, kind: PerfectKind) {
        self.counts[kind as usize] += 1;
    }

    /// Number of samples routed to `kind`.
    pub fn count(&self, kind: PerfectKind) -> usize {
        self.counts[kind as usize]
    }

    /// Emit the histogram in its reporting form.
    pub fn report<W: io::Write + ?Sized>(&self, w: &mut W, ntg0: usize, ntg1: usize) -> io::Result<()> {
        let ns: usize = self.counts.iter().sum();
        writeln!(w, "Num samples:{ns}\tNum traces:{ntg0}+{ntg1}")?;
        let labels = [
            ("Same constant value", PerfectKind::SameConstantValue),
            ("Different constant values", PerfectKind::DifferentConstantValues),
            ("Student t-test", PerfectKind::StudentTTest),
            ("Welsh t-test", PerfectKind::WelshTTest),
        ];
        for (label, kind) in labels {
            write!(w, "{label}: {} (", self.count(kind))?;
            if ns == 0 {
                write!(w, "-")?;
            } else {
                write!(w, "{}", 100.0 * self.count(kind) as f64 / ns as f64)?;
            }
            writeln!(w, "%)")?;
        }
        Ok(())
    }
}

/// "Perfect input" t-test over `[b, e)` with pre-split groups.
///
/// Per sample: both groups constant and equal → `0.0`; both constant but
/// different → `0.0` (counted separately — the t value is undefined there);
/// one constant → Student t-test of the varying group against the constant;
/// neither constant → Welsh. The optional writer receives the histogram of
/// the four cases.
pub fn perfect_t_test(
    b: usize,
    e: usize,
    group0: &NpArray<f64>,
    group1: &NpArray<f64>,
    report: Option<&mut dyn io::Write>,
) -> NpArray<f64> {
    assert!(b <= e, "wrong begin / end samples");
    assert!(e <= group0.cols(), "not that many samples in group0");
    assert!(group0.cols() == group1.cols(), "mismatch in number of samples");

    let mut stats = PerfectStats::default();
    let mut tvalues = NpArray::with_shape(1, e - b);

    for s in b..e {
        let g0 = group0.get(0, s);
        let g0_constant = group0.all_at(Axis::Column, s, |v| v == g0);
        let g1 = group1.get(0, s);
        let g1_constant = group1.all_at(Axis::Column, s, |v| v == g1);

        let t = match (g0_constant, g1_constant) {
            (true, true) => {
                stats.incr(if g0 == g1 {
                    PerfectKind::SameConstantValue
                } else {
                    PerfectKind::DifferentConstantValues
                });
                0.0
            }
            (true, false) => {
                stats.incr(PerfectKind::StudentTTest);
                student_t_test(s, g0, group1)
            }
            (false, true) => {
                stats.incr(PerfectKind::StudentTTest);
                student_t_test(s, g1, group0)
            }
            (false, false) => {
                stats.incr(PerfectKind::WelshTTest);
                welsh_t_test_at(s, group0, group1)
            }
        };
        tvalues.set(0, s - b, t);
    }

    if let Some(w) = report {
        let _ = stats.report(w, group0.rows(), group1.rows());
    }
    tvalues
}

/// "Perfect input" t-test over `[b, e)` with classified traces.
pub fn perfect_t_test_classified(
    b: usize,
    e: usize,
    traces: &NpArray<f64>,
    classifier: &[Classification],
    report: Option<&mut dyn io::Write>,
) -> NpArray<f64> {
    assert!(b <= e, "wrong begin / end samples");
    assert!(e <= traces.cols(), "not that many samples in the traces");

    let group0: Vec<usize> = (0..traces.rows())
        .filter(|&t| classifier[t] == Classification::Group0)
        .collect();
    let group1: Vec<usize> = (0..traces.rows())
        .filter(|&t| classifier[t] == Classification::Group1)
        .collect();

    assert!(group0.len() > 1, "not enough traces in group0");
    assert!(group1.len() > 1, "not enough traces in group1");

    let constant_over = |rows: &[usize], s: usize| -> (bool, f64) {
        let first = traces.get(rows[0], s);
        (rows.iter().all(|&r| traces.get(r, s) == first), first)
    };

    let mut stats = PerfectStats::default();
    let mut tvalues = NpArray::with_shape(1, e - b);

    for s in b..e {
        let (g0_constant, g0) = constant_over(&group0, s);
        let (g1_constant, g1) = constant_over(&group1, s);

        let t = match (g0_constant, g1_constant) {
            (true, true) => {
                stats.incr(if g0 == g1 {
                    PerfectKind::SameConstantValue
                } else {
                    PerfectKind::DifferentConstantValues
                });
                0.0
            }
            (true, false) => {
                stats.incr(PerfectKind::StudentTTest);
                student_t_test_where(s, g0, traces, |t| {
                    classifier[t] == Classification::Group1
                })
            }
            (false, true) => {
                stats.incr(PerfectKind::StudentTTest);
                student_t_test_where(s, g1, traces, |t| {
                    classifier[t] == Classification::Group0
                })
            }
            (false, false) => {
                stats.incr(PerfectKind::WelshTTest);
                welsh_t_test_classified_at(s, traces, classifier)
            }
        };
        tvalues.set(0, s - b, t);
    }

    if let Some(w) = report {
        let _ = stats.report(w, group0.len(), group1.len());
    }
    tvalues
}

/// Pearson correlation between each sample in `[b, e)` and the per-trace
/// intermediate values `ivalues`, using the single-pass
/// Σx/Σx²/Σy/Σy²/Σxy formulation.
pub fn pearson_correl(b: usize, e: usize, traces: &NpArray<f64>, ivalues: &[f64]) -> NpArray<f64> {
    assert!(b <= e, "wrong begin / end samples");
    assert!(e <= traces.cols(), "not that many samples in the traces");
    assert!(
        ivalues.len() == traces.rows(),
        "number of intermediate values does not match the number of traces"
    );

    if b == e {
        return NpArray::new();
    }

    let ntraces = traces.rows();
    let nsamples = e - b;

    let mut sum_t = vec![0.0; nsamples];
    let mut sum_t_sq = vec![0.0; nsamples];
    let mut sum_ht = vec![0.0; nsamples];
    let mut sum_h = 0.0;
    let mut sum_h_sq = 0.0;

    for t in 0..ntraces {
        let iv = ivalues[t];
        sum_h += iv;
        sum_h_sq += iv * iv;

        for s in 0..nsamples {
            let v = traces.get(t, b + s);
            sum_t[s] += v;
            sum_t_sq[s] += v * v;
            sum_ht[s] += v * iv;
        }
    }

    let n = ntraces as f64;
    let mut cvalues = NpArray::with_shape(1, nsamples);
    for s in 0..nsamples {
        let num = n * sum_ht[s] - sum_h * sum_t[s];
        let den =
            ((sum_h * sum_h - n * sum_h_sq) * (sum_t[s] * sum_t[s] - n * sum_t_sq[s])).sqrt();
        cvalues.set(0, s, num / den);
    }
    cvalues
}

/// Scan `row` with an optional decimation pattern and return the value of
/// largest magnitude together with its index. The returned value keeps its
/// sign; an empty row yields `(0.0, usize::MAX)`.
pub fn find_max(row: &RowView<'_, f64>, decimate: usize, offset: usize) -> (f64, usize) {
    assert!(decimate > 0, "decimate can not be 0");
    assert!(offset < decimate, "offset must be strictly lower than decimate");

    if row.is_empty() {
        return (0.0, usize::MAX);
    }

    let mut max_v = row.get(offset);
    let mut index = offset;

    let mut i = decimate + offset;
    while i < row.len() {
        if row.get(i).abs() > max_v.abs() {
            max_v = row.get(i);
            index = i;
        }
        i += decimate;
    }

    (max_v, index)
}
