//! APR-equivalent: effective annual internal rate of return of the borrower's
//! cash flows
//!
//! The borrower receives the net proceeds at t0 (positive) and pays each
//! installment (negative). The periodic IRR is found with Newton-Raphson,
//! falling back to bisection, and annualized as `(1 + r)^periods_per_year - 1`.

const TOLERANCE: f64 = 1e-10;
const MAX_ITERATIONS: usize = 1000;

/// Periodic rate bounds searched (-99% .. 1000% per period)
const RATE_FLOOR: f64 = -0.99;
const RATE_CEILING: f64 = 10.0;

/// Periodic IRR of equally spaced cash flows, `None` when no root exists
///
/// `cashflows[0]` is at t0; positive values are inflows.
pub fn periodic_irr(cashflows: &[f64]) -> Option<f64> {
    if cashflows.is_empty() {
        return None;
    }
    if cashflows.iter().all(|cf| cf.abs() < TOLERANCE) {
        return Some(0.0);
    }

    // A root needs at least one sign change
    let has_inflow = cashflows.iter().any(|&cf| cf > TOLERANCE);
    let has_outflow = cashflows.iter().any(|&cf| cf < -TOLERANCE);
    if !has_inflow || !has_outflow {
        return None;
    }

    let mut rate = 0.01;
    for _ in 0..MAX_ITERATIONS {
        let (npv, slope) = npv_with_slope(cashflows, rate);
        if slope.abs() < 1e-20 {
            return bisect(cashflows);
        }

        let next = (rate - npv / slope).clamp(RATE_FLOOR, RATE_CEILING);
        if (next - rate).abs() < TOLERANCE {
            return Some(next);
        }
        rate = next;
    }

    bisect(cashflows)
}

/// NPV at a periodic rate and its derivative with respect to the rate
fn npv_with_slope(cashflows: &[f64], rate: f64) -> (f64, f64) {
    cashflows
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(npv, slope), (t, &cf)| {
            let growth = (1.0 + rate).powi(t as i32);
            (npv + cf / growth, slope - t as f64 * cf / (growth * (1.0 + rate)))
        })
}

fn npv(cashflows: &[f64], rate: f64) -> f64 {
    npv_with_slope(cashflows, rate).0
}

fn bisect(cashflows: &[f64]) -> Option<f64> {
    let (mut low, mut high) = (RATE_FLOOR, RATE_CEILING);
    let mut npv_low = npv(cashflows, low);

    if npv_low * npv(cashflows, high) > 0.0 {
        return None;
    }

    for _ in 0..MAX_ITERATIONS {
        let mid = (low + high) / 2.0;
        let npv_mid = npv(cashflows, mid);

        if npv_mid.abs() < TOLERANCE || (high - low) / 2.0 < TOLERANCE {
            return Some(mid);
        }

        if npv_mid * npv_low < 0.0 {
            high = mid;
        } else {
            low = mid;
            npv_low = npv_mid;
        }
    }

    None
}

/// Annualize a periodic rate; `periods_per_year` may be fractional (lump sums)
pub fn effective_annual_rate(periodic_rate: f64, periods_per_year: f64) -> f64 {
    (1.0 + periodic_rate).powf(periods_per_year) - 1.0
}

/// APR-equivalent as an annual percentage (12.5 means 12.5%)
pub fn apr_equivalent(net_proceeds: f64, payments: &[f64], periods_per_year: f64) -> Option<f64> {
    let cashflows: Vec<f64> = std::iter::once(net_proceeds)
        .chain(payments.iter().map(|p| -p))
        .collect();

    periodic_irr(&cashflows).map(|r| effective_annual_rate(r, periods_per_year) * 100.0)
}
