//! G-EQDSK equilibrium files.
//!
//! Layout: a header line (description, `idum`, `nw`, `nh`), twenty scalars,
//! the `fpol pres ffprim pprime` profiles (`nw` each), `psirz` (`nh` rows of
//! `nw`), `qpsi`, then `nbbbs limitr` followed by the boundary and limiter
//! `(r, z)` pairs. Numbers are fixed width and may run together, so they are
//! tokenized by pattern rather than by whitespace.

use std::fs;
use std::path::Path as FsPath;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[+-]?(?:\d+\.\d*|\.\d+)(?:[eEdD][+-]?\d+)?|[+-]?\d+")
            .expect("number pattern is valid")
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contour {
    pub r: Vec<f64>,
    pub z: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geqdsk {
    pub description: String,
    pub nw: usize,
    pub nh: usize,
    pub rdim: f64,
    pub zdim: f64,
    pub rcentr: f64,
    pub rleft: f64,
    pub zmid: f64,
    pub rmaxis: f64,
    pub zmaxis: f64,
    pub simag: f64,
    pub sibry: f64,
    pub bcentr: f64,
    pub current: f64,
    pub fpol: Vec<f64>,
    pub pres: Vec<f64>,
    pub ffprim: Vec<f64>,
    pub pprime: Vec<f64>,
    /// `nh` rows of `nw` values.
    pub psirz: Vec<Vec<f64>>,
    pub qpsi: Vec<f64>,
    pub boundary: Contour,
    pub limiter: Contour,
    /// Radial grid, `nw` points from `rleft` to `rleft + rdim`.
    pub r: Vec<f64>,
    /// Vertical grid, `nh` points centred on `zmid`.
    pub z: Vec<f64>,
}

struct Numbers<'a> {
    inner: regex::Matches<'static, 'a>,
}

impl Numbers<'_> {
    fn next_f64(&mut self, what: &str) -> Result<f64> {
        let token = self
            .inner
            .next()
            .ok_or_else(|| Error::Parse(format!("geqdsk: file ends before {what}")))?;
        token
            .as_str()
            .replace(['d', 'D'], "e")
            .parse()
            .map_err(|_| Error::Parse(format!("geqdsk: bad number `{}` in {what}", token.as_str())))
    }

    fn take(&mut self, n: usize, what: &str) -> Result<Vec<f64>> {
        (0..n).map(|_| self.next_f64(what)).collect()
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let v = self.next_f64(what)?;
        if v < 0.0 || v.fract() != 0.0 {
            return Err(Error::Parse(format!("geqdsk: bad count {v} for {what}")));
        }
        Ok(v as usize)
    }

    fn pairs(&mut self, n: usize, what: &str) -> Result<Contour> {
        let flat = self.take(2 * n, what)?;
        let (r, z) = flat.chunks(2).map(|p| (p[0], p[1])).unzip();
        Ok(Contour { r, z })
    }
}

impl Geqdsk {
    pub fn parse(src: &str) -> Result<Self> {
        let (header, body) = src.split_once('\n').unwrap_or((src, ""));
        let (description, nw, nh) = parse_header(header)?;
        let mut nums = Numbers {
            inner: number_regex().find_iter(body),
        };

        let s = nums.take(20, "scalars")?;
        let fpol = nums.take(nw, "fpol")?;
        let pres = nums.take(nw, "pres")?;
        let ffprim = nums.take(nw, "ffprim")?;
        let pprime = nums.take(nw, "pprime")?;
        let psirz = (0..nh)
            .map(|_| nums.take(nw, "psirz"))
            .collect::<Result<Vec<_>>>()?;
        let qpsi = nums.take(nw, "qpsi")?;
        // Some writers stop after qpsi.
        let (boundary, limiter) = match nums.count("nbbbs") {
            Ok(nbbbs) => {
                let limitr = nums.count("limitr")?;
                (nums.pairs(nbbbs, "boundary")?, nums.pairs(limitr, "limiter")?)
            }
            Err(_) => (Contour { r: vec![], z: vec![] }, Contour { r: vec![], z: vec![] }),
        };

        let (rdim, zdim, rleft, zmid) = (s[0], s[1], s[3], s[4]);
        Ok(Self {
            description,
            nw,
            nh,
            rdim,
            zdim,
            rcentr: s[2],
            rleft,
            zmid,
            rmaxis: s[5],
            zmaxis: s[6],
            simag: s[7],
            sibry: s[8],
            bcentr: s[9],
            current: s[10],
            fpol,
            pres,
            ffprim,
            pprime,
            psirz,
            qpsi,
            boundary,
            limiter,
            r: linspace(rleft, rleft + rdim, nw),
            z: linspace(zmid - zdim / 2.0, zmid + zdim / 2.0, nh),
        })
    }

    pub fn read(path: impl AsRef<FsPath>) -> Result<Self> {
        let path = path.as_ref();
        let src = fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
        let g = Self::parse(&src)?;
        debug!(path = %path.display(), nw = g.nw, nh = g.nh, "loaded geqdsk");
        Ok(g)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

fn parse_header(line: &str) -> Result<(String, usize, usize)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [.., _idum, nw, nh] = tokens.as_slice() else {
        return Err(Error::Parse("geqdsk: header needs idum, nw and nh".to_string()));
    };
    let dim = |t: &str| {
        t.parse::<usize>()
            .map_err(|_| Error::Parse(format!("geqdsk: bad grid size `{t}` in header")))
    };
    let (nw, nh) = (dim(nw)?, dim(nh)?);
    let mut rest = line;
    for _ in 0..3 {
        rest = rest.trim_end();
        rest = &rest[..rest.rfind(char::is_whitespace).map_or(0, |i| i + 1)];
    }
    Ok((rest.trim().to_string(), nw, nh))
}

fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 3x2 equilibrium with a 2-point boundary and 1-point limiter.
    fn sample() -> String {
        let mut s = String::from("  EFIT    01/01/2020  #000900  1000ms           3   3   2\n");
        let scalars = [
            2.0, 4.0, 1.7, 0.5, 0.0, // rdim zdim rcentr rleft zmid
            1.6, 0.1, -1.0, 0.0, 2.5, // rmaxis zmaxis simag sibry bcentr
            1.0e6, -1.0, 0.0, 1.6, 0.0, // current simag xdum rmaxis xdum
            0.1, 0.0, 0.0, 0.0, 0.0, // zmaxis xdum sibry xdum xdum
        ];
        let push = |s: &mut String, values: &[f64]| {
            for chunk in values.chunks(5) {
                for v in chunk {
                    s.push_str(&format!("{v:16.9E}"));
                }
                s.push('\n');
            }
        };
        push(&mut s, &scalars);
        push(&mut s, &[3.0, 3.1, 3.2]); // fpol
        push(&mut s, &[1e4, 5e3, 0.0]); // pres
        push(&mut s, &[0.1, 0.2, 0.3]); // ffprim
        push(&mut s, &[-1.0, -2.0, -3.0]); // pprime
        push(&mut s, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]); // psirz
        push(&mut s, &[1.0, 1.5, 3.0]); // qpsi
        s.push_str("    2    1\n");
        push(&mut s, &[1.0, -1.0, 2.0, 1.0]);
        push(&mut s, &[0.5, 0.0]);
        s
    }

    #[test]
    fn test_parse_sample() {
        let g = Geqdsk::parse(&sample()).unwrap();
        assert_eq!(g.description, "EFIT    01/01/2020  #000900  1000ms");
        assert_eq!((g.nw, g.nh), (3, 2));
        assert_eq!(g.rdim, 2.0);
        assert_eq!(g.bcentr, 2.5);
        assert_eq!(g.current, 1.0e6);
        assert_eq!(g.pres, vec![1e4, 5e3, 0.0]);
        assert_eq!(g.psirz, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(g.qpsi, vec![1.0, 1.5, 3.0]);
        assert_eq!(g.boundary.r, vec![1.0, 2.0]);
        assert_eq!(g.boundary.z, vec![-1.0, 1.0]);
        assert_eq!(g.limiter.r, vec![0.5]);
        assert_eq!(g.r, vec![0.5, 1.5, 2.5]);
        assert_eq!(g.z, vec![-2.0, 2.0]);
    }

    #[test]
    fn test_run_together_numbers() {
        let nums: Vec<&str> = number_regex()
            .find_iter(" 1.000000000E+00-2.500000000E-01 3")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(nums, vec!["1.000000000E+00", "-2.500000000E-01", "3"]);
    }

    #[test]
    fn test_truncated() {
        let src = sample();
        let cut = src.find("  2    1").unwrap();
        let g = Geqdsk::parse(&src[..cut]).unwrap();
        assert!(g.boundary.r.is_empty());

        let cut = src.len() / 3;
        assert!(matches!(Geqdsk::parse(&src[..cut]), Err(Error::Parse(_))));
        assert!(matches!(Geqdsk::parse("no numbers"), Err(Error::Parse(_))));
    }
}
