//! Number rendering shared by the table and CSV output.

/// Fixed two-decimal rendering
pub fn precision(value: f64) -> String {
    format!("{:.2}", value)
}

/// Two decimals, scaled to millions (`M`) from 1,000,000 and to thousands
/// (`K`) from 10,000.
pub fn human_readable(value: f64) -> String {
    if value >= 1e6 {
        format!("{}M", precision(value / 1_000_000.0))
    } else if value >= 1e4 {
        format!("{}K", precision(value / 1_000.0))
    } else {
        precision(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, "0.00")]
    #[case(950.0, "950.00")]
    #[case(9_999.0, "9999.00")]
    #[case(10_000.0, "10.00K")]
    #[case(15_000.0, "15.00K")]
    #[case(999_999.0, "1000.00K")]
    #[case(1_000_000.0, "1.00M")]
    #[case(2_500_000.0, "2.50M")]
    #[case(1.005e9, "1005.00M")]
    fn test_human_readable(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(human_readable(value), expected);
    }

    #[rstest]
    #[case(1.0, "1.00")]
    #[case(2.0 / 3.0, "0.67")]
    #[case(1234.5, "1234.50")]
    fn test_precision(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(precision(value), expected);
    }
}
