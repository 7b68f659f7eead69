// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Powell's derivative-free multidimensional minimiser, with Brent line
//! minimisations (after Numerical Recipes).

use log::trace;

/// The maximum number of Powell iterations (full sweeps of the direction
/// set).
const MAX_ITERATIONS: usize = 200;

/// The maximum number of Brent iterations per line minimisation.
const MAX_BRENT_ITERATIONS: usize = 100;

/// The maximum number of expansions when bracketing a line minimum.
const MAX_BRACKET_ITERATIONS: usize = 200;

/// Fractional tolerance of each line minimisation.
const LINE_TOLERANCE: f64 = 2.0e-4;

const GOLDEN: f64 = 1.618_034;
const CGOLD: f64 = 0.381_966_0;
const GLIMIT: f64 = 100.0;
const TINY: f64 = 1.0e-20;
const ZEPS: f64 = 1.0e-10;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PowellResult {
    /// The location of the minimum.
    pub(crate) x: Vec<f64>,

    /// The function value at the minimum.
    pub(crate) f: f64,

    /// The number of sweeps over the direction set.
    pub(crate) iterations: usize,

    /// The number of function evaluations.
    pub(crate) evaluations: usize,
}

/// Minimise `func` starting at `x0`. `steps` are the lengths of the initial
/// search directions (one per parameter, along each axis) and should be
/// comparable to the expected scale of each parameter; parameters without a
/// step get 1. Iteration stops when a
/// sweep decreases the function value by less than the fractional tolerance
/// `ftol`. There is no convergence flag; callers judge the returned value.
pub(crate) fn powell<F>(func: F, x0: &[f64], steps: &[f64], ftol: f64) -> PowellResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    let mut evaluations = 0;
    let mut eval = |x: &[f64]| {
        evaluations += 1;
        func(x)
    };

    let mut directions: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let mut d = vec![0.0; n];
            d[i] = steps.get(i).copied().unwrap_or(1.0);
            d
        })
        .collect();
    let mut p = x0.to_vec();
    let mut fret = eval(&p);
    let mut pt = p.clone();

    let mut iterations = 0;
    loop {
        iterations += 1;
        let fp = fret;
        let mut i_big = 0;
        let mut del = 0.0;

        for (i, dir) in directions.iter().enumerate() {
            let fptt = fret;
            fret = line_minimise(&mut eval, &mut p, dir);
            if fptt - fret > del {
                del = fptt - fret;
                i_big = i;
            }
        }

        if 2.0 * (fp - fret) <= ftol * (fp.abs() + fret.abs()) + TINY {
            break;
        }
        if iterations >= MAX_ITERATIONS {
            trace!("Powell minimiser reached {MAX_ITERATIONS} iterations");
            break;
        }

        // Extrapolated point and the average direction moved.
        let ptt: Vec<f64> = p.iter().zip(&pt).map(|(a, b)| 2.0 * a - b).collect();
        let xit: Vec<f64> = p.iter().zip(&pt).map(|(a, b)| a - b).collect();
        pt.clone_from(&p);

        let fptt = eval(&ptt);
        if fptt < fp {
            let t = 2.0 * (fp - 2.0 * fret + fptt) * (fp - fret - del).powi(2)
                - del * (fp - fptt).powi(2);
            if t < 0.0 {
                fret = line_minimise(&mut eval, &mut p, &xit);
                directions[i_big] = directions[n - 1].clone();
                directions[n - 1] = xit;
            }
        }
    }

    PowellResult {
        x: p,
        f: fret,
        iterations,
        evaluations,
    }
}

/// Move `p` to the minimum of the function along `dir`, returning the value
/// there.
fn line_minimise<F>(func: &mut F, p: &mut [f64], dir: &[f64]) -> f64
where
    F: FnMut(&[f64]) -> f64,
{
    if dir.iter().all(|&d| d == 0.0) {
        return func(p);
    }

    let origin = p.to_vec();
    let mut along = |alpha: f64| {
        let x: Vec<f64> = origin
            .iter()
            .zip(dir)
            .map(|(o, d)| o + alpha * d)
            .collect();
        func(&x)
    };

    let bracket = bracket_minimum(&mut along, 0.0, 1.0);
    let (alpha, f_min) = brent(&mut along, bracket, LINE_TOLERANCE);
    for ((pi, o), d) in p.iter_mut().zip(&origin).zip(dir) {
        *pi = o + alpha * d;
    }
    f_min
}

/// Three abscissae (a, b, c) with f(b) below f(a) and f(c), plus f at each.
#[derive(Debug, Clone, Copy)]
struct Bracket {
    a: f64,
    b: f64,
    c: f64,
    fb: f64,
}

fn bracket_minimum<F>(f: &mut F, mut a: f64, mut b: f64) -> Bracket
where
    F: FnMut(f64) -> f64,
{
    let mut fa = f(a);
    let mut fb = f(b);
    if fb > fa {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }
    let mut c = b + GOLDEN * (b - a);
    let mut fc = f(c);

    let mut count = 0;
    while fb > fc && count < MAX_BRACKET_ITERATIONS {
        count += 1;
        let r = (b - a) * (fb - fc);
        let q = (b - c) * (fb - fa);
        let denom = 2.0 * (q - r).abs().max(TINY).copysign(q - r);
        let mut u = b - ((b - c) * q - (b - a) * r) / denom;
        let ulim = b + GLIMIT * (c - b);
        let mut fu;

        if (b - u) * (u - c) > 0.0 {
            fu = f(u);
            if fu < fc {
                return Bracket {
                    a: b,
                    b: u,
                    c,
                    fb: fu,
                };
            } else if fu > fb {
                return Bracket { a, b, c: u, fb };
            }
            u = c + GOLDEN * (c - b);
            fu = f(u);
        } else if (c - u) * (u - ulim) > 0.0 {
            fu = f(u);
            if fu < fc {
                b = c;
                c = u;
                u = c + GOLDEN * (c - b);
                fb = fc;
                fc = fu;
                fu = f(u);
            }
        } else if (u - ulim) * (ulim - c) >= 0.0 {
            u = ulim;
            fu = f(u);
        } else {
            u = c + GOLDEN * (c - b);
            fu = f(u);
        }

        a = b;
        b = c;
        c = u;
        fa = fb;
        fb = fc;
        fc = fu;
    }

    Bracket { a, b, c, fb }
}

fn brent<F>(f: &mut F, bracket: Bracket, tol: f64) -> (f64, f64)
where
    F: FnMut(f64) -> f64,
{
    let mut a = bracket.a.min(bracket.c);
    let mut b = bracket.a.max(bracket.c);
    let mut x = bracket.b;
    let mut w = x;
    let mut v = x;
    let mut fx = bracket.fb;
    let mut fw = fx;
    let mut fv = fx;
    let mut d: f64 = 0.0;
    let mut e: f64 = 0.0;

    for _ in 0..MAX_BRENT_ITERATIONS {
        let xm = 0.5 * (a + b);
        let tol1 = tol * x.abs() + ZEPS;
        let tol2 = 2.0 * tol1;
        if (x - xm).abs() <= tol2 - 0.5 * (b - a) {
            return (x, fx);
        }

        if e.abs() > tol1 {
            // Try a parabolic step.
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let e_temp = e;
            e = d;
            if p.abs() >= (0.5 * q * e_temp).abs() || p <= q * (a - x) || p >= q * (b - x) {
                e = if x >= xm { a - x } else { b - x };
                d = CGOLD * e;
            } else {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = tol1.copysign(xm - x);
                }
            }
        } else {
            e = if x >= xm { a - x } else { b - x };
            d = CGOLD * e;
        }

        let u = if d.abs() >= tol1 {
            x + d
        } else {
            x + tol1.copysign(d)
        };
        let fu = f(u);

        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            w = x;
            x = u;
            fv = fw;
            fw = fx;
            fx = fu;
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                w = u;
                fv = fw;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }
    }

    (x, fx)
}
