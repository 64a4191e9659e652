//! Totals engine: derive subtotal, VAT, and grand total from line items.
//!
//! The fallback rules exist because neither source schema guarantees an
//! explicit tax breakdown or per-line totals:
//!
//! 1. subtotal = Σ line subtotals (explicit, else quantity × unit price —
//!    the normalizer already resolved that per line).
//! 2. tax = Σ tax-entry totals where the entry is not a retention and the
//!    name is case-insensitively `IVA`. Retentions and non-VAT entries are
//!    excluded.
//! 3. When step 2 yields exactly zero and subtotal is positive, assume the
//!    flat VAT rate over the subtotal. This is a heuristic for payloads
//!    with no tax breakdown at all — not a tax-law computation.
//! 4. total = Σ explicit line totals; when that sum is zero, or disagrees
//!    with subtotal + tax beyond presentation tolerance (callers sometimes
//!    send stale per-line totals), the derived subtotal + tax wins so the
//!    `|total − (subtotal + tax)| < 0.01` invariant always holds.
//!
//! Accumulation happens at full `f64` precision; rounding to 2 decimals is
//! a presentation concern and happens once, here, on the way out.

use crate::invoice::model::{LineItem, Totals};

/// Tax name that participates in the additive VAT sum.
const VAT_NAME: &str = "IVA";

/// Round to 2 decimal places (presentation precision for MXN).
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Compute document totals from canonical line items.
///
/// `vat_rate` feeds only the step-3 fallback.
pub fn compute_totals(items: &[LineItem], vat_rate: f64) -> Totals {
    let subtotal = round2(items.iter().map(|it| it.line_subtotal).sum());

    let mut tax: f64 = items
        .iter()
        .flat_map(|it| it.taxes.iter())
        .filter(|t| !t.is_retention && t.name.eq_ignore_ascii_case(VAT_NAME))
        .map(|t| t.total)
        .sum();

    if tax == 0.0 && subtotal > 0.0 {
        tax = subtotal * vat_rate;
    }
    let tax = round2(tax);

    // Explicit line totals are honored only while they agree with the
    // derived parts; a zero or inconsistent sum is reconciled to
    // subtotal + tax, keeping the total invariant unconditional.
    let explicit = round2(items.iter().map(|it| it.line_total).sum());
    let derived = round2(subtotal + tax);
    let total = if (explicit - derived).abs() < 0.01 {
        explicit
    } else {
        derived
    };

    Totals {
        subtotal,
        tax,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::model::TaxEntry;
    use proptest::prelude::*;

    fn item(quantity: f64, unit_price: f64, taxes: Vec<TaxEntry>) -> LineItem {
        LineItem {
            product_code: "01010101".into(),
            quantity,
            unit_code: "H87".into(),
            description: "N/A".into(),
            unit_price,
            line_subtotal: quantity * unit_price,
            line_total: 0.0,
            taxes,
        }
    }

    fn iva(total: f64) -> TaxEntry {
        TaxEntry {
            name: "IVA".into(),
            rate: 0.16,
            is_retention: false,
            is_federal: true,
            total,
        }
    }

    #[test]
    fn explicit_iva_is_summed() {
        // Scenario: 1 × 100 with an explicit IVA entry of 16.
        let t = compute_totals(&[item(1.0, 100.0, vec![iva(16.0)])], 0.16);
        assert_eq!(t.subtotal, 100.0);
        assert_eq!(t.tax, 16.0);
        assert_eq!(t.total, 116.0);
    }

    #[test]
    fn missing_breakdown_falls_back_to_flat_rate() {
        // Scenario: 2 × 50 and no tax entries at all.
        let t = compute_totals(&[item(2.0, 50.0, vec![])], 0.16);
        assert_eq!(t.subtotal, 100.0);
        assert_eq!(t.tax, 16.0);
        assert_eq!(t.total, 116.0);
    }

    #[test]
    fn retentions_are_excluded_from_vat() {
        let retention = TaxEntry {
            name: "IVA".into(),
            rate: 0.106667,
            is_retention: true,
            is_federal: true,
            total: 10.67,
        };
        let t = compute_totals(&[item(1.0, 100.0, vec![iva(16.0), retention])], 0.16);
        assert_eq!(t.tax, 16.0);
    }

    #[test]
    fn non_vat_entries_are_excluded() {
        let ieps = TaxEntry {
            name: "IEPS".into(),
            rate: 0.08,
            is_retention: false,
            is_federal: true,
            total: 8.0,
        };
        // IEPS alone: excluded from the VAT sum, so the flat-rate fallback
        // still fires over the subtotal.
        let t = compute_totals(&[item(1.0, 100.0, vec![ieps])], 0.16);
        assert_eq!(t.tax, 16.0);
    }

    #[test]
    fn vat_name_match_is_case_insensitive() {
        let mut lower = iva(16.0);
        lower.name = "iva".into();
        let t = compute_totals(&[item(1.0, 100.0, vec![lower])], 0.16);
        assert_eq!(t.tax, 16.0);
    }

    #[test]
    fn explicit_line_totals_win_over_the_fallback() {
        let mut it = item(1.0, 100.0, vec![iva(16.0)]);
        it.line_total = 116.0;
        let t = compute_totals(&[it], 0.16);
        assert_eq!(t.total, 116.0);
    }

    #[test]
    fn inconsistent_explicit_totals_are_reconciled() {
        // Stale per-line totals that disagree with subtotal + tax must not
        // break the total invariant.
        let mut it = item(1.0, 100.0, vec![iva(16.0)]);
        it.line_total = 999.99;
        let t = compute_totals(&[it], 0.16);
        assert_eq!(t.subtotal, 100.0);
        assert_eq!(t.tax, 16.0);
        assert_eq!(t.total, 116.0);
    }

    #[test]
    fn empty_items_yield_zeros() {
        let t = compute_totals(&[], 0.16);
        assert_eq!(t.subtotal, 0.0);
        assert_eq!(t.tax, 0.0);
        assert_eq!(t.total, 0.0);
    }

    proptest! {
        /// For any generated invoice the invariant
        /// |total − (subtotal + tax)| < 0.01 holds after the fallbacks.
        #[test]
        fn totals_invariant_holds(
            lines in proptest::collection::vec(
                (
                    0.0f64..50.0,
                    0.0f64..5000.0,
                    proptest::option::of(0.0f64..800.0),
                    proptest::option::of(0.0f64..10_000.0),
                ),
                1..8,
            )
        ) {
            let items: Vec<LineItem> = lines
                .into_iter()
                .map(|(qty, price, explicit_iva, explicit_total)| {
                    let taxes = explicit_iva.map(|v| vec![iva(v)]).unwrap_or_default();
                    let mut it = item(qty, price, taxes);
                    // Explicit per-line totals, agreeing or not.
                    it.line_total = explicit_total.unwrap_or(0.0);
                    it
                })
                .collect();
            let t = compute_totals(&items, 0.16);
            prop_assert!((t.total - (t.subtotal + t.tax)).abs() < 0.01,
                "subtotal={} tax={} total={}", t.subtotal, t.tax, t.total);
        }
    }
}
