//! Distribution of the studentized range, used by Tukey's HSD.
//!
//! `ptukey` integrates the range of `k` standard normals against the scaled
//! chi distribution of the variance estimate with Gauss-Legendre quadrature
//! (Copenhaver & Holland, 1988). `qtukey` inverts it by bisection.

use statrs::function::erf::erfc;
use statrs::function::gamma::ln_gamma;
use std::f64::consts::{LN_2, SQRT_2};

const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

// 12-point Gauss-Legendre nodes/weights (half set) for the range integral.
const XLEG: [f64; 6] = [
    0.981_560_634_246_719_3,
    0.904_117_256_370_474_9,
    0.769_902_674_194_304_7,
    0.587_317_954_286_617_4,
    0.367_831_498_998_180_2,
    0.125_233_408_511_468_9,
];
const ALEG: [f64; 6] = [
    0.047_175_336_386_511_83,
    0.106_939_325_995_318_4,
    0.160_078_328_543_346_2,
    0.203_167_426_723_065_9,
    0.233_492_536_538_354_8,
    0.249_147_045_813_402_8,
];

// 16-point Gauss-Legendre nodes/weights (half set) for the outer integral.
const XLEGQ: [f64; 8] = [
    0.989_400_934_991_649_9,
    0.944_575_023_073_232_6,
    0.865_631_202_387_831_7,
    0.755_404_408_355_003,
    0.617_876_244_402_643_7,
    0.458_016_777_657_227_4,
    0.281_603_550_779_258_9,
    0.095_012_509_837_637_44,
];
const ALEGQ: [f64; 8] = [
    0.027_152_459_411_754_09,
    0.062_253_523_938_647_89,
    0.095_158_511_682_492_78,
    0.124_628_971_255_533_9,
    0.149_595_988_816_576_7,
    0.169_156_519_395_002_5,
    0.182_603_415_044_923_6,
    0.189_450_610_455_068_5,
];

fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// P(range of `k` standard normals < `w`), i.e. infinite degrees of freedom.
fn range_cdf(w: f64, k: f64) -> f64 {
    const BOUND: f64 = 8.0;
    const MAX_EXPONENT: f64 = 60.0;
    const LOG_FLOOR: f64 = -30.0;

    let half = w * 0.5;
    if half >= BOUND {
        return 1.0;
    }

    // Probability that all k values fall within the centred interval.
    let mut pr = 2.0 * norm_cdf(half) - 1.0;
    pr = if pr >= 1.0 { 1.0 } else { pr.powf(k) };

    let intervals = if w > 3.0 { 2 } else { 3 };
    let step = (BOUND - half) / intervals as f64;
    let mut lower = half;
    let mut upper = lower + step;
    let k1 = k - 1.0;
    let threshold = (LOG_FLOOR / k1).exp();

    let mut outer = 0.0;
    for _ in 0..intervals {
        let mid = 0.5 * (upper + lower);
        let radius = 0.5 * (upper - lower);
        let mut inner = 0.0;
        for jj in 0..12 {
            let (j, x) = if jj < 6 {
                (jj, -XLEG[jj])
            } else {
                (11 - jj, XLEG[11 - jj])
            };
            let ac = mid + radius * x;
            let sq = ac * ac;
            if sq > MAX_EXPONENT {
                break;
            }
            let within = norm_cdf(ac) - norm_cdf(ac - w);
            if within >= threshold {
                inner += ALEG[j] * (-0.5 * sq).exp() * within.powf(k1);
            }
        }
        outer += inner * (2.0 * radius) * k * INV_SQRT_2PI;
        lower = upper;
        upper += step;
    }

    pr += outer;
    if pr <= LOG_FLOOR.exp() {
        return 0.0;
    }
    pr.min(1.0)
}

/// Cumulative distribution of the studentized range for `k` groups and `df`
/// error degrees of freedom.
pub fn ptukey(q: f64, k: usize, df: f64) -> f64 {
    const LOG_FLOOR: f64 = -30.0;
    const NEGLIGIBLE: f64 = 1e-14;

    if q.is_nan() || k < 2 || df < 2.0 {
        return f64::NAN;
    }
    if q <= 0.0 {
        return 0.0;
    }
    if q.is_infinite() {
        return 1.0;
    }
    let kf = k as f64;
    if df > 25_000.0 {
        return range_cdf(q, kf);
    }

    let f2 = df * 0.5;
    let width: f64 = if df <= 100.0 {
        1.0
    } else if df <= 800.0 {
        0.5
    } else if df <= 5000.0 {
        0.25
    } else {
        0.125
    };
    let log_norm = f2 * df.ln() - df * LN_2 - ln_gamma(f2) + width.ln();
    let f21 = f2 - 1.0;
    let ff4 = df * 0.25;

    let mut total = 0.0;
    for i in 1..=50 {
        let centre = (2 * i - 1) as f64 * width;
        let mut slice = 0.0;
        for jj in 0..16 {
            let (j, offset) = if jj < 8 {
                (jj, -XLEGQ[jj] * width)
            } else {
                (jj - 8, XLEGQ[jj - 8] * width)
            };
            let u = centre + offset;
            let log_weight = log_norm + f21 * u.ln() - u * ff4;
            if log_weight >= LOG_FLOOR {
                let scaled = q * (u * 0.5).sqrt();
                slice += range_cdf(scaled, kf) * ALEGQ[j] * log_weight.exp();
            }
        }
        if i as f64 * width >= 1.0 && slice <= NEGLIGIBLE {
            break;
        }
        total += slice;
    }
    total.min(1.0)
}

/// Quantile of the studentized range: the `q` with `ptukey(q, k, df) == p`.
pub fn qtukey(p: f64, k: usize, df: f64) -> f64 {
    if !(0.0..1.0).contains(&p) || k < 2 || df < 2.0 {
        return f64::NAN;
    }
    if p == 0.0 {
        return 0.0;
    }

    let mut lo = 0.0;
    let mut hi = 1.0;
    while ptukey(hi, k, df) < p {
        lo = hi;
        hi *= 2.0;
        if hi > 1e4 {
            return f64::INFINITY;
        }
    }
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        if ptukey(mid, k, df) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-10 {
            break;
        }
    }
    0.5 * (lo + hi)
}
