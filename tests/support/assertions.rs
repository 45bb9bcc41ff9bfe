use rust_decimal::Decimal;

use truthstake::domain::Money;

pub fn assert_decimal_near(actual: Decimal, expected: Decimal, tolerance: Decimal) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "expected {} ± {}, got {}",
        expected,
        tolerance,
        actual
    );
}

pub fn assert_money_eq(actual: Money, expected: Decimal) {
    let actual = actual.to_decimal().expect("amount fits a decimal");
    assert_eq!(actual.normalize(), expected.normalize(), "amount mismatch");
}
