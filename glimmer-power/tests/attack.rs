//! A miniature correlation attack, end to end: per-trace intermediate
//! values computed by the expression language, correlated against a
//! synthetic Hamming-weight leakage. The right key byte is the one whose
//! hypothesis correlates perfectly.

use std::rc::Rc;

use glimmer_np::stats::pearson_correl;
use glimmer_np::NpArray;
use glimmer_power::expr::{Context, Parser};
use glimmer_power::hamming_weight;

const KEY: u8 = 0x2b;
const NUM_TRACES: usize = 64;

// A fixed spread of plaintext bytes; variety is what the correlation needs.
fn plaintexts() -> Vec<u8> {
    (0..NUM_TRACES).map(|i| (i * 47 + 13) as u8).collect()
}

// One sample per trace: the Hamming weight of the S-box output, plus a
// plaintext-independent per-trace offset standing in for the rest of the
// device activity.
fn leakage_traces(plaintexts: &[u8]) -> NpArray<f64> {
    let samples: Vec<f64> = plaintexts
        .iter()
        .enumerate()
        .map(|(i, pt)| {
            let sbox_out = glimmer_power::expr::AES_SBOX[(pt ^ KEY) as usize];
            hamming_weight(sbox_out as u64, u64::MAX) as f64 + (i % 3) as f64 * 0.01
        })
        .collect();
    NpArray::from_vec(samples, NUM_TRACES, 1)
}

#[test]
fn correlation_recovers_the_key_byte() {
    let pts = plaintexts();
    let traces = leakage_traces(&pts);
    let pt_matrix = Rc::new(NpArray::<u8>::from_vec(pts, NUM_TRACES, 1));

    let mut ctx = Context::new();
    ctx.add_variable("pt", Rc::clone(&pt_matrix));

    let mut best_guess = 0usize;
    let mut best_corr = 0.0f64;
    for guess in 0..=255u32 {
        let expr = Parser::new(&ctx)
            .parse(&format!("aes_sbox(xor($pt[0], {guess}_u8))"))
            .expect("hypothesis must parse");

        // One intermediate value per trace: step the context row by row.
        ctx.reset();
        let mut ivalues = Vec::with_capacity(NUM_TRACES);
        for _ in 0..NUM_TRACES {
            ivalues.push(hamming_weight(expr.eval().value(), u64::MAX) as f64);
            ctx.advance();
        }

        let c = pearson_correl(0, 1, &traces, &ivalues).get(0, 0);
        if c.abs() > best_corr {
            best_corr = c.abs();
            best_guess = guess as usize;
        }
    }

    assert_eq!(best_guess, KEY as usize);
    assert!(best_corr > 0.99, "correlation of the right key is {best_corr}");
}

#[test]
fn wrong_keys_correlate_poorly() {
    let pts = plaintexts();
    let traces = leakage_traces(&pts);
    let pt_matrix = Rc::new(NpArray::<u8>::from_vec(pts, NUM_TRACES, 1));

    let mut ctx = Context::new();
    ctx.add_variable("pt", Rc::clone(&pt_matrix));

    for guess in [0x00u32, 0x13, 0xff] {
        let expr = Parser::new(&ctx)
            .parse(&format!("aes_sbox(xor($pt[0], {guess}_u8))"))
            .unwrap();
        ctx.reset();
        let mut ivalues = Vec::with_capacity(NUM_TRACES);
        for _ in 0..NUM_TRACES {
            ivalues.push(hamming_weight(expr.eval().value(), u64::MAX) as f64);
            ctx.advance();
        }
        let c = pearson_correl(0, 1, &traces, &ivalues).get(0, 0);
        assert!(c.abs() < 0.7, "guess {guess:#x} correlates at {c}");
    }
}
