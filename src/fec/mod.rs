//! Forward error correction: a (255, 249) Reed-Solomon code over GF(256).
//!
//! The codec is the outermost physical framing of a container. Each
//! codeword carries [`FEC_PAYLOAD`] data bytes plus [`FEC_PARITY`]
//! redundancy symbols computed against a fixed generator polynomial, and is
//! emitted byte-reversed. Decoding evaluates syndromes at the code's roots;
//! up to three symbol errors per codeword are located and corrected, more
//! are reported as unrecoverable.

use crate::config::{FEC_CAPACITY, FEC_PARITY, FEC_PAYLOAD};
use crate::error::{Error, Result};
use crate::stream::BlockTransform;

pub mod gf256;

use gf256 as gf;

/// Reed-Solomon encoder/decoder with the fixed container geometry.
///
/// Also the [`BlockTransform`] plugged into the stream adapters: `forward`
/// encodes one payload block, `inverse` decodes (and corrects) one raw
/// codeword, and the trailing partial block is zero-filled.
pub struct Codec {
    /// `g(x) = Π_{j=1..6}(x − α^j)`, ascending coefficients, monic.
    generator: [u8; FEC_PARITY + 1],
}

impl Codec {
    pub fn new() -> Self {
        let mut g = [0u8; FEC_PARITY + 1];
        g[0] = 1;
        for j in 1..=FEC_PARITY {
            let root = gf::alpha_pow(j);
            let mut next = [0u8; FEC_PARITY + 1];
            for i in (0..=j).rev() {
                let carry = if i > 0 { g[i - 1] } else { 0 };
                next[i] = gf::add(carry, gf::mul(root, g[i]));
            }
            g = next;
        }
        Self { generator: g }
    }

    /// Encodes one full payload block into a byte-reversed codeword.
    pub fn encode(&self, payload: &[u8]) -> [u8; FEC_CAPACITY] {
        debug_assert_eq!(payload.len(), FEC_PAYLOAD);

        let mut cw = [0u8; FEC_CAPACITY];
        cw[FEC_PARITY..].copy_from_slice(payload);

        // Remainder of the shifted message polynomial modulo g(x); the
        // parity symbols land in the low-degree coefficients.
        let mut rem = cw;
        for i in (FEC_PARITY..FEC_CAPACITY).rev() {
            let coef = rem[i];
            if coef != 0 {
                for (j, &gj) in self.generator.iter().enumerate() {
                    rem[i - FEC_PARITY + j] ^= gf::mul(gj, coef);
                }
            }
        }
        cw[..FEC_PARITY].copy_from_slice(&rem[..FEC_PARITY]);

        let mut out = [0u8; FEC_CAPACITY];
        for (i, &b) in cw.iter().rev().enumerate() {
            out[i] = b;
        }
        out
    }

    /// Decodes one raw codeword, correcting up to
    /// [`crate::config::FEC_MAX_ERRORS`] symbol errors. Returns
    /// [`Error::Unrecoverable`] when the block is too damaged to trust.
    pub fn decode(&self, block: &[u8]) -> Result<[u8; FEC_PAYLOAD]> {
        debug_assert_eq!(block.len(), FEC_CAPACITY);

        let mut cw = [0u8; FEC_CAPACITY];
        for (i, &b) in block.iter().rev().enumerate() {
            cw[i] = b;
        }

        let mut synd = [0u8; FEC_PARITY];
        for (j, s) in synd.iter_mut().enumerate() {
            *s = gf::poly_eval(&cw, gf::alpha_pow(j + 1));
        }

        if synd.iter().all(|&s| s == 0) {
            return Ok(Self::payload_of(&cw));
        }

        let locator = Self::locator_polynomial(&synd)?;
        let positions = Self::chien_search(&locator)?;
        let magnitudes = Self::solve_magnitudes(&synd, &positions)?;
        Self::verify_syndromes(&synd, &positions, &magnitudes)?;

        for (&pos, &mag) in positions.iter().zip(&magnitudes) {
            cw[pos] ^= mag;
        }
        Ok(Self::payload_of(&cw))
    }

    fn payload_of(cw: &[u8; FEC_CAPACITY]) -> [u8; FEC_PAYLOAD] {
        let mut payload = [0u8; FEC_PAYLOAD];
        payload.copy_from_slice(&cw[FEC_PARITY..]);
        payload
    }

    /// Determines the error count from syndrome determinant tests and
    /// solves the error-locator coefficients by Cramer's rule.
    ///
    /// Returns `Λ(x) = 1 + λ1·x + … + λν·x^ν` (ascending), whose roots are
    /// the inverses of the error locations.
    fn locator_polynomial(synd: &[u8; FEC_PARITY]) -> Result<Vec<u8>> {
        let s = |j: usize| synd[j - 1];

        let m3 = [
            [s(3), s(2), s(1)],
            [s(4), s(3), s(2)],
            [s(5), s(4), s(3)],
        ];
        let det3 = det3x3(&m3);
        if det3 != 0 {
            let rhs = [s(4), s(5), s(6)];
            let lambda = cramer3(&m3, &rhs, det3);
            return Ok(vec![1, lambda[0], lambda[1], lambda[2]]);
        }

        let det2 = gf::add(gf::mul(s(2), s(2)), gf::mul(s(1), s(3)));
        if det2 != 0 {
            let l1 = gf::div(gf::add(gf::mul(s(3), s(2)), gf::mul(s(1), s(4))), det2);
            let l2 = gf::div(gf::add(gf::mul(s(2), s(4)), gf::mul(s(3), s(3))), det2);
            return Ok(vec![1, l1, l2]);
        }

        if s(1) != 0 {
            return Ok(vec![1, gf::div(s(2), s(1))]);
        }

        Err(Error::Unrecoverable)
    }

    /// Exhaustive root search over every field element.
    fn chien_search(locator: &[u8]) -> Result<Vec<usize>> {
        let expected = locator.len() - 1;
        let mut positions = Vec::with_capacity(expected);
        for k in 0..255 {
            let x = gf::alpha_pow(k);
            if gf::poly_eval(locator, x) == 0 {
                positions.push(gf::LOG[gf::inv(x) as usize] as usize);
            }
        }
        if positions.len() != expected {
            return Err(Error::Unrecoverable);
        }
        Ok(positions)
    }

    /// Solves `S_j = Σ_i Y_i · X_i^j` for the error magnitudes.
    fn solve_magnitudes(synd: &[u8; FEC_PARITY], positions: &[usize]) -> Result<Vec<u8>> {
        let x: Vec<u8> = positions.iter().map(|&p| gf::alpha_pow(p)).collect();
        let mags = match x.len() {
            1 => vec![gf::div(synd[0], x[0])],
            2 => {
                let m = [[x[0], x[1]], [gf::mul(x[0], x[0]), gf::mul(x[1], x[1])]];
                let det = gf::add(gf::mul(m[0][0], m[1][1]), gf::mul(m[0][1], m[1][0]));
                if det == 0 {
                    return Err(Error::Unrecoverable);
                }
                let y0 = gf::div(gf::add(gf::mul(synd[0], m[1][1]), gf::mul(m[0][1], synd[1])), det);
                let y1 = gf::div(gf::add(gf::mul(m[0][0], synd[1]), gf::mul(synd[0], m[1][0])), det);
                vec![y0, y1]
            }
            3 => {
                let m = [
                    [x[0], x[1], x[2]],
                    [gf::mul(x[0], x[0]), gf::mul(x[1], x[1]), gf::mul(x[2], x[2])],
                    [gf::pow(x[0], 3), gf::pow(x[1], 3), gf::pow(x[2], 3)],
                ];
                let det = det3x3(&m);
                if det == 0 {
                    return Err(Error::Unrecoverable);
                }
                let rhs = [synd[0], synd[1], synd[2]];
                cramer3(&m, &rhs, det).to_vec()
            }
            _ => return Err(Error::Unrecoverable),
        };
        if mags.iter().any(|&y| y == 0) {
            return Err(Error::Unrecoverable);
        }
        Ok(mags)
    }

    /// Rejects corrections that do not explain every syndrome; this is what
    /// turns a four-plus-error block into a hard failure instead of a
    /// silent miscorrection.
    fn verify_syndromes(synd: &[u8; FEC_PARITY], positions: &[usize], magnitudes: &[u8]) -> Result<()> {
        for (j, &s) in synd.iter().enumerate() {
            let mut acc = 0u8;
            for (&p, &y) in positions.iter().zip(magnitudes) {
                acc = gf::add(acc, gf::mul(y, gf::pow(gf::alpha_pow(p), j + 1)));
            }
            if acc != s {
                return Err(Error::Unrecoverable);
            }
        }
        Ok(())
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockTransform for Codec {
    fn data_len(&self) -> usize {
        FEC_PAYLOAD
    }

    fn raw_len(&self) -> usize {
        FEC_CAPACITY
    }

    fn forward(&mut self, data: &[u8], raw: &mut Vec<u8>) -> Result<()> {
        raw.extend_from_slice(&self.encode(data));
        Ok(())
    }

    fn inverse(&mut self, raw: &[u8], data: &mut Vec<u8>) -> Result<()> {
        data.extend_from_slice(&self.decode(raw)?);
        Ok(())
    }

    fn fill(&mut self, partial: &mut Vec<u8>) {
        partial.resize(FEC_PAYLOAD, 0);
    }
}

fn det3x3(m: &[[u8; 3]; 3]) -> u8 {
    let mut det = 0u8;
    det = gf::add(det, gf::mul(m[0][0], gf::mul(m[1][1], m[2][2])));
    det = gf::add(det, gf::mul(m[0][0], gf::mul(m[1][2], m[2][1])));
    det = gf::add(det, gf::mul(m[0][1], gf::mul(m[1][0], m[2][2])));
    det = gf::add(det, gf::mul(m[0][1], gf::mul(m[1][2], m[2][0])));
    det = gf::add(det, gf::mul(m[0][2], gf::mul(m[1][0], m[2][1])));
    det = gf::add(det, gf::mul(m[0][2], gf::mul(m[1][1], m[2][0])));
    det
}

fn cramer3(m: &[[u8; 3]; 3], rhs: &[u8; 3], det: u8) -> [u8; 3] {
    let mut out = [0u8; 3];
    for (col, slot) in out.iter_mut().enumerate() {
        let mut repl = *m;
        for row in 0..3 {
            repl[row][col] = rhs[row];
        }
        *slot = gf::div(det3x3(&repl), det);
    }
    out
}
